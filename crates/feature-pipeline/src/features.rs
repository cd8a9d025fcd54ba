use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use research_core::{FeatureRow, FeatureVector, PipelineError, PipelineResult, PricePoint, RealizedReturn};

use crate::indicators;

/// Fixed feature order produced by [`build_feature_rows`].
pub const FEATURE_NAMES: &[&str] = &[
    "return_1",
    "momentum_5",
    "momentum_20",
    "volatility_20",
    "rsi_14",
    "macd_pct",
    "macd_signal_pct",
    "macd_hist_pct",
    "bollinger_pct_b",
    "price_to_sma_50",
];

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Build feature rows for every instrument with at least `min_history` prices.
///
/// Indicators at a row's date use prices up to and including that date; the
/// realized forward return uses the price `horizon` periods later. Rows whose
/// indicators are still warming up, or whose horizon runs past the end of the
/// history, are dropped.
pub fn build_feature_rows(
    prices: &[PricePoint],
    horizon: usize,
    min_history: usize,
) -> PipelineResult<Vec<FeatureRow>> {
    if horizon == 0 {
        return Err(PipelineError::InvalidParameter(
            "horizon must be at least 1".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (instrument, series) in group_by_instrument(prices, min_history)? {
        let closes: Vec<f64> = series.iter().map(|(_, p)| *p).collect();
        let features = instrument_features(&closes);
        for i in 0..closes.len().saturating_sub(horizon) {
            if let Some(features) = features[i].clone() {
                rows.push(FeatureRow {
                    instrument: instrument.to_string(),
                    date: series[i].0,
                    features,
                    realized_return_forward: closes[i + horizon] / closes[i] - 1.0,
                });
            }
        }
    }
    Ok(rows)
}

/// One row per instrument at its final price date, for live scoring.
///
/// The forward return is not observable yet, so `realized_return_forward`
/// is NaN. Instruments whose last date still falls in the warm-up are omitted.
pub fn build_live_rows(prices: &[PricePoint], min_history: usize) -> PipelineResult<Vec<FeatureRow>> {
    let mut rows = Vec::new();
    for (instrument, series) in group_by_instrument(prices, min_history)? {
        let closes: Vec<f64> = series.iter().map(|(_, p)| *p).collect();
        let last = closes.len() - 1;
        if let Some(features) = instrument_features(&closes).swap_remove(last) {
            rows.push(FeatureRow {
                instrument: instrument.to_string(),
                date: series[last].0,
                features,
                realized_return_forward: f64::NAN,
            });
        }
    }
    Ok(rows)
}

/// Date-sorted series per instrument, dropping short histories.
fn group_by_instrument(
    prices: &[PricePoint],
    min_history: usize,
) -> PipelineResult<Vec<(&str, Vec<(NaiveDate, f64)>)>> {
    let mut by_instrument: BTreeMap<&str, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for p in prices {
        let price = p.adjusted_price.to_f64().ok_or_else(|| {
            PipelineError::InvalidData(format!(
                "{} {}: price {} is not representable",
                p.instrument, p.date, p.adjusted_price
            ))
        })?;
        by_instrument
            .entry(p.instrument.as_str())
            .or_default()
            .push((p.date, price));
    }

    let mut groups = Vec::with_capacity(by_instrument.len());
    let mut skipped = 0usize;
    for (instrument, mut series) in by_instrument {
        series.sort_by_key(|(date, _)| *date);
        if let Some(w) = series.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(PipelineError::InvalidData(format!(
                "duplicate price for {} on {}",
                instrument, w[0].0
            )));
        }
        if series.len() < min_history.max(1) {
            tracing::debug!(
                "Skipping {}: {} prices (need >= {})",
                instrument,
                series.len(),
                min_history
            );
            skipped += 1;
            continue;
        }
        groups.push((instrument, series));
    }

    if skipped > 0 {
        tracing::info!("{} instruments skipped for insufficient history", skipped);
    }
    Ok(groups)
}

/// Feature vector at every index, `None` during warm-up.
fn instrument_features(closes: &[f64]) -> Vec<Option<FeatureVector>> {
    let return_1 = indicators::momentum(closes, 1);
    let momentum_5 = indicators::momentum(closes, 5);
    let momentum_20 = indicators::momentum(closes, 20);
    let volatility_20 = indicators::rolling_volatility(closes, 20);
    let rsi_14 = indicators::rsi(closes, 14);
    let macd = indicators::macd(closes, 12, 26, 9);
    let pct_b = indicators::bollinger_percent_b(closes, 20, 2.0);
    let sma_50 = indicators::sma(closes, 50);

    (0..closes.len())
        .map(|i| {
            let price = closes[i];
            if price <= 0.0 {
                return None;
            }
            let values = [
                return_1[i],
                momentum_5[i],
                momentum_20[i],
                volatility_20[i],
                rsi_14[i],
                macd.macd_line[i].map(|v| v / price),
                macd.signal_line[i].map(|v| v / price),
                macd.histogram[i].map(|v| v / price),
                pct_b[i],
                sma_50[i].filter(|s| *s > 0.0).map(|s| price / s),
            ];
            let mut features = FeatureVector::new();
            for (name, value) in FEATURE_NAMES.iter().zip(values) {
                features.insert(name.to_string(), value.filter(|v| v.is_finite())?);
            }
            Some(features)
        })
        .collect()
}

/// Fail fast if any row lacks one of the `required` features.
pub fn validate_schema(rows: &[FeatureRow], required: &[String]) -> PipelineResult<()> {
    for row in rows {
        if let Some(missing) = required.iter().find(|name| !row.features.contains_key(*name)) {
            return Err(PipelineError::MissingInput(format!(
                "feature '{}' missing for {} on {}",
                missing, row.instrument, row.date
            )));
        }
        if !row.realized_return_forward.is_finite() {
            return Err(PipelineError::InvalidData(format!(
                "non-finite realized return for {} on {}",
                row.instrument, row.date
            )));
        }
    }
    Ok(())
}

/// Realized forward returns keyed by (instrument, date), for the backtest join.
pub fn realized_returns(rows: &[FeatureRow]) -> Vec<RealizedReturn> {
    rows.iter()
        .map(|r| RealizedReturn {
            instrument: r.instrument.clone(),
            date: r.date,
            realized_return: r.realized_return_forward,
        })
        .collect()
}
