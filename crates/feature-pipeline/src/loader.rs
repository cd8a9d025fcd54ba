use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use research_core::{parse_date, PipelineError, PipelineResult, PricePoint};

const REQUIRED_COLUMNS: &[&str] = &["instrument", "date", "adjusted_price"];

#[derive(Debug, Deserialize)]
struct PriceRecord {
    instrument: String,
    date: String,
    adjusted_price: String,
}

/// Load a price history CSV with columns `instrument,date,adjusted_price`.
pub fn load_prices_csv<P: AsRef<Path>>(path: P) -> PipelineResult<Vec<PricePoint>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        PipelineError::MissingInput(format!("price history {}: {}", path.display(), e))
    })?;
    let prices = read_prices(file)?;
    tracing::info!("Loaded {} prices from {}", prices.len(), path.display());
    Ok(prices)
}

/// Parse prices from any CSV reader. Extra columns are ignored.
pub fn read_prices<R: Read>(reader: R) -> PipelineResult<Vec<PricePoint>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Csv(e.to_string()))?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(PipelineError::MissingInput(format!(
                "price history is missing required column '{}'",
                column
            )));
        }
    }

    let mut prices = Vec::new();
    for (line, result) in reader.deserialize::<PriceRecord>().enumerate() {
        let record = result.map_err(|e| PipelineError::Csv(format!("row {}: {}", line + 1, e)))?;
        let adjusted_price = Decimal::from_str(&record.adjusted_price).map_err(|e| {
            PipelineError::InvalidData(format!(
                "row {}: bad price '{}': {}",
                line + 1,
                record.adjusted_price,
                e
            ))
        })?;
        if adjusted_price <= Decimal::ZERO {
            return Err(PipelineError::InvalidData(format!(
                "row {}: price must be positive for {}",
                line + 1,
                record.instrument
            )));
        }
        prices.push(PricePoint {
            instrument: record.instrument,
            date: parse_date(&record.date)?,
            adjusted_price,
        });
    }

    prices.sort_by(|a, b| a.instrument.cmp(&b.instrument).then(a.date.cmp(&b.date)));
    Ok(prices)
}
