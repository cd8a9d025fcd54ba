use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use research_core::{
    DailyReturn, MetricsRow, PipelineError, PipelineResult, METRIC_DISPLAY_DECIMALS, TRADING_DAYS_PER_YEAR,
};

/// Parameters of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluateParams {
    /// Upper cap on each weighted contribution, > 0.
    pub take_profit: f64,
    /// Lower cap on each weighted contribution, < 0.
    pub stop_loss: f64,
    /// Label horizon in trading periods; sets the annualization factor.
    pub horizon_days: usize,
}

impl EvaluateParams {
    pub fn new(take_profit: f64, stop_loss: f64, horizon_days: usize) -> Self {
        Self {
            take_profit,
            stop_loss,
            horizon_days,
        }
    }

    /// Infinite caps are accepted and disable the corresponding side.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.take_profit > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "take_profit must be > 0 (got {})",
                self.take_profit
            )));
        }
        if !(self.stop_loss < 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "stop_loss must be < 0 (got {})",
                self.stop_loss
            )));
        }
        if self.horizon_days == 0 {
            return Err(PipelineError::InvalidParameter(
                "horizon_days must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn periods_per_year(&self) -> f64 {
        TRADING_DAYS_PER_YEAR / self.horizon_days as f64
    }
}

/// Output of [`crate::evaluate`]. Metrics keep full precision; use
/// [`EvaluationResult::display_metrics`] for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub daily: Vec<DailyReturn>,
    /// `[Model, Buy & Hold]`, or empty when there was no data.
    pub metrics: Vec<MetricsRow>,
    pub row_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EvaluationResult {
    pub fn empty() -> Self {
        Self {
            daily: Vec::new(),
            metrics: Vec::new(),
            row_count: 0,
            start_date: None,
            end_date: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    pub fn display_metrics(&self) -> Vec<MetricsRow> {
        self.metrics
            .iter()
            .map(|m| m.rounded(METRIC_DISPLAY_DECIMALS))
            .collect()
    }
}
