use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Indicator name -> value. Keyed by name so that consumers extract features
/// in their own fixed order and can detect missing columns.
pub type FeatureVector = BTreeMap<String, f64>;

/// A single adjusted close for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub instrument: String,
    pub date: NaiveDate,
    pub adjusted_price: Decimal,
}

/// Indicators for (instrument, date) plus the realized forward return over
/// the label horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub instrument: String,
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub realized_return_forward: f64,
}

/// A feature row with its binary training target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    #[serde(flatten)]
    pub row: FeatureRow,
    pub target: bool,
}

impl LabeledRow {
    pub fn date(&self) -> NaiveDate {
        self.row.date
    }
}

/// Model output for one (instrument, date).
///
/// `signal` is 1 iff `predicted_probability > threshold`; `weight` is the
/// equal-weight allocation across the signaled instruments of that date and
/// is 0 wherever `signal` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub instrument: String,
    pub date: NaiveDate,
    pub predicted_probability: f64,
    pub signal: u8,
    pub weight: f64,
}

impl SignalRow {
    pub fn is_signaled(&self) -> bool {
        self.signal == 1
    }
}

/// Realized horizon return keyed by (instrument, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedReturn {
    pub instrument: String,
    pub date: NaiveDate,
    pub realized_return: f64,
}

/// A signal row joined with its realized return. `None` marks rows without a
/// matching return; they contribute 0 to the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub instrument: String,
    pub date: NaiveDate,
    pub predicted_probability: f64,
    pub signal: u8,
    pub weight: f64,
    pub realized_return: Option<f64>,
}

impl BacktestRow {
    pub fn from_signal(row: &SignalRow, realized_return: Option<f64>) -> Self {
        Self {
            instrument: row.instrument.clone(),
            date: row.date,
            predicted_probability: row.predicted_probability,
            signal: row.signal,
            weight: row.weight,
            realized_return,
        }
    }
}

/// One date of the portfolio series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub strategy_return: f64,
    /// `None` when no instrument had a realized return on this date.
    pub benchmark_return: Option<f64>,
    pub strategy_cum: f64,
    pub benchmark_cum: f64,
}

/// Which equity curve a metrics row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesKind {
    Model,
    #[serde(rename = "Buy & Hold")]
    BuyAndHold,
}

impl SeriesKind {
    pub fn label(&self) -> &'static str {
        match self {
            SeriesKind::Model => "Model",
            SeriesKind::BuyAndHold => "Buy & Hold",
        }
    }
}

/// Annualized risk/return summary for one series. Undefined ratios are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub series: SeriesKind,
    pub cagr: Option<f64>,
    pub volatility: Option<f64>,
    pub sharpe: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub calmar: Option<f64>,
}

impl MetricsRow {
    /// Copy with every metric rounded to `decimals` places, for display.
    pub fn rounded(&self, decimals: u32) -> Self {
        let factor = 10f64.powi(decimals as i32);
        let round = |v: Option<f64>| v.map(|x| (x * factor).round() / factor);
        Self {
            series: self.series,
            cagr: round(self.cagr),
            volatility: round(self.volatility),
            sharpe: round(self.sharpe),
            max_drawdown: round(self.max_drawdown),
            calmar: round(self.calmar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_rounding_keeps_none() {
        let row = MetricsRow {
            series: SeriesKind::Model,
            cagr: Some(0.123456789),
            volatility: Some(0.2),
            sharpe: None,
            max_drawdown: Some(-0.100049),
            calmar: None,
        };
        let r = row.rounded(4);
        assert_eq!(r.cagr, Some(0.1235));
        assert_eq!(r.max_drawdown, Some(-0.1));
        assert_eq!(r.sharpe, None);
        assert_eq!(r.calmar, None);
        // full precision untouched
        assert_eq!(row.cagr, Some(0.123456789));
    }

    #[test]
    fn test_labeled_row_serializes_flat() {
        let mut features = FeatureVector::new();
        features.insert("rsi_14".to_string(), 55.0);
        let row = LabeledRow {
            row: FeatureRow {
                instrument: "AAPL".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                features,
                realized_return_forward: 0.03,
            },
            target: true,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["instrument"], "AAPL");
        assert_eq!(json["date"], "2024-01-02");
        assert_eq!(json["target"], true);
    }

    #[test]
    fn test_series_labels() {
        assert_eq!(SeriesKind::Model.label(), "Model");
        assert_eq!(SeriesKind::BuyAndHold.label(), "Buy & Hold");
        assert_eq!(serde_json::to_value(SeriesKind::BuyAndHold).unwrap(), "Buy & Hold");
    }
}
