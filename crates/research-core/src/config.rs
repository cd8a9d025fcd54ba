use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{PipelineError, PipelineResult};

/// Trading periods per year used to annualize metrics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Decimal places for displayed metrics.
pub const METRIC_DISPLAY_DECIMALS: u32 = 4;

pub const THRESHOLD_RANGE: (f64, f64) = (0.5, 0.9);
pub const TAKE_PROFIT_RANGE: (f64, f64) = (0.01, 0.2);
pub const STOP_LOSS_RANGE: (f64, f64) = (-0.2, -0.01);

/// Seeded selection of a subset of the instrument universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSampling {
    pub seed: u64,
    pub sample_size: usize,
}

/// Pipeline-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Label horizon in trading periods.
    pub horizon_days: usize,
    /// Forward return above which a row is labeled positive.
    pub label_threshold: f64,
    /// Instruments with fewer prices are dropped.
    pub min_history: usize,
    /// Seed threaded through every random step (rebalancing, sampling).
    pub seed: u64,
    #[serde(default)]
    pub universe_size: Option<usize>,
    /// Rows dated before the cutoff train; rows on/after it are held out.
    #[serde(default)]
    pub cutoff_date: Option<NaiveDate>,
    pub artifact_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            horizon_days: 5,
            label_threshold: 0.02,
            min_history: 60,
            seed: 42,
            universe_size: None,
            cutoff_date: None,
            artifact_dir: PathBuf::from("./artifacts"),
        }
    }
}

impl PipelineConfig {
    /// Build from `PIPELINE_*` environment variables, falling back to defaults.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();
        let cutoff_date = match std::env::var("PIPELINE_CUTOFF_DATE") {
            Ok(raw) => Some(parse_date(&raw)?),
            Err(_) => None,
        };
        let config = Self {
            horizon_days: env_or("PIPELINE_HORIZON_DAYS", defaults.horizon_days)?,
            label_threshold: env_or("PIPELINE_LABEL_THRESHOLD", defaults.label_threshold)?,
            min_history: env_or("PIPELINE_MIN_HISTORY", defaults.min_history)?,
            seed: env_or("PIPELINE_SEED", defaults.seed)?,
            universe_size: match std::env::var("PIPELINE_UNIVERSE_SIZE") {
                Ok(raw) => Some(parse_value("PIPELINE_UNIVERSE_SIZE", &raw)?),
                Err(_) => None,
            },
            cutoff_date,
            artifact_dir: std::env::var("PIPELINE_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.horizon_days == 0 {
            return Err(PipelineError::InvalidParameter(
                "horizon_days must be at least 1".to_string(),
            ));
        }
        if !self.label_threshold.is_finite() {
            return Err(PipelineError::InvalidParameter(
                "label_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Periods per year at the label horizon (252 / horizon).
    pub fn periods_per_year(&self) -> f64 {
        TRADING_DAYS_PER_YEAR / self.horizon_days as f64
    }

    pub fn universe_sampling(&self) -> Option<UniverseSampling> {
        self.universe_size.map(|sample_size| UniverseSampling {
            seed: self.seed,
            sample_size,
        })
    }
}

/// Live-adjustable dashboard inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardParams {
    pub threshold: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
}

impl Default for DashboardParams {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            take_profit: 0.05,
            stop_loss: -0.05,
        }
    }
}

impl DashboardParams {
    /// Reject values outside the ranges the dashboard exposes.
    pub fn validate(&self) -> PipelineResult<()> {
        check_range("threshold", self.threshold, THRESHOLD_RANGE)?;
        check_range("take_profit", self.take_profit, TAKE_PROFIT_RANGE)?;
        check_range("stop_loss", self.stop_loss, STOP_LOSS_RANGE)?;
        Ok(())
    }
}

fn check_range(name: &str, value: f64, (lo, hi): (f64, f64)) -> PipelineResult<()> {
    if !value.is_finite() || value < lo || value > hi {
        return Err(PipelineError::InvalidParameter(format!(
            "{} must be between {} and {} (got {})",
            name, lo, hi, value
        )));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> PipelineResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        PipelineError::InvalidParameter(format!("invalid date '{}' (use YYYY-MM-DD): {}", raw, e))
    })
}

fn env_or<T: FromStr>(key: &str, default: T) -> PipelineResult<T> {
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> PipelineResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::InvalidParameter(format!("{} has invalid value '{}'", key, raw)))
}
