//! Annualized risk/return metrics over a compounded series.
//!
//! `cum` is the equity curve (running product of `1 + r`) and `returns` the
//! periodic returns that produced it; both have one element per period.
//! Ratios that are undefined for the input are `None`.

use statrs::statistics::Statistics;

use research_core::stats::finite;
use research_core::{DailyReturn, MetricsRow, SeriesKind};

/// Standard deviations below this are treated as zero.
const MIN_STD_DEV: f64 = 1e-12;

/// `(x[last] / x[first])^(periods_per_year / n) - 1`
pub fn cagr(cum: &[f64], periods_per_year: f64) -> Option<f64> {
    let (first, last) = (*cum.first()?, *cum.last()?);
    if first <= 0.0 {
        return None;
    }
    let n = cum.len() as f64;
    finite((last / first).powf(periods_per_year / n) - 1.0)
}

/// Sample standard deviation, annualized.
pub fn volatility(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    finite(returns.std_dev() * periods_per_year.sqrt())
}

/// `None` when the periodic returns have zero standard deviation.
pub fn sharpe(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let sd = returns.std_dev();
    if !(sd > MIN_STD_DEV) {
        return None;
    }
    finite(returns.mean() / sd * periods_per_year.sqrt())
}

/// Worst decline from the running maximum, which starts at `x[0]`. Always <= 0.
pub fn max_drawdown(cum: &[f64]) -> Option<f64> {
    let mut peak = *cum.first()?;
    let mut worst = 0.0_f64;
    for &x in cum {
        if x > peak {
            peak = x;
        }
        if peak > 0.0 {
            worst = worst.min((x - peak) / peak);
        }
    }
    finite(worst)
}

/// `None` when there was no drawdown.
pub fn calmar(cagr: Option<f64>, max_drawdown: Option<f64>) -> Option<f64> {
    match (cagr, max_drawdown) {
        (Some(c), Some(dd)) if dd != 0.0 => finite(c / dd.abs()),
        _ => None,
    }
}

pub fn series_metrics(series: SeriesKind, cum: &[f64], returns: &[f64], periods_per_year: f64) -> MetricsRow {
    let cagr_value = cagr(cum, periods_per_year);
    let dd = max_drawdown(cum);
    MetricsRow {
        series,
        cagr: cagr_value,
        volatility: volatility(returns, periods_per_year),
        sharpe: sharpe(returns, periods_per_year),
        max_drawdown: dd,
        calmar: calmar(cagr_value, dd),
    }
}

/// Metrics for the strategy and the benchmark, in that order. Empty for an
/// empty series.
pub fn metrics_table(daily: &[DailyReturn], periods_per_year: f64) -> Vec<MetricsRow> {
    if daily.is_empty() {
        return Vec::new();
    }

    let strategy_returns: Vec<f64> = daily.iter().map(|d| d.strategy_return).collect();
    let strategy_cum: Vec<f64> = daily.iter().map(|d| d.strategy_cum).collect();
    let benchmark_returns: Vec<f64> = daily
        .iter()
        .map(|d| d.benchmark_return.unwrap_or(0.0))
        .collect();
    let benchmark_cum: Vec<f64> = daily.iter().map(|d| d.benchmark_cum).collect();

    vec![
        series_metrics(SeriesKind::Model, &strategy_cum, &strategy_returns, periods_per_year),
        series_metrics(
            SeriesKind::BuyAndHold,
            &benchmark_cum,
            &benchmark_returns,
            periods_per_year,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn compound(returns: &[f64]) -> Vec<f64> {
        let mut acc = 1.0;
        returns
            .iter()
            .map(|r| {
                acc *= 1.0 + r;
                acc
            })
            .collect()
    }

    #[test]
    fn test_drawdown_uses_running_max() {
        let cum = compound(&[0.05, -0.10, 0.05]);
        assert_relative_eq!(cum[2], 0.99225, epsilon = 1e-12);
        assert_relative_eq!(max_drawdown(&cum).unwrap(), -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_zero_for_non_decreasing() {
        let cum = compound(&[0.01, 0.0, 0.02]);
        assert_eq!(max_drawdown(&cum), Some(0.0));
        assert_eq!(calmar(cagr(&cum, 50.4), Some(0.0)), None);
    }

    #[test]
    fn test_cagr_formula() {
        let cum = vec![1.0, 1.1, 1.21];
        // (1.21 / 1.0)^(252 / 3) - 1
        let expected = 1.21_f64.powf(84.0) - 1.0;
        assert_relative_eq!(cagr(&cum, 252.0).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_sharpe_undefined_for_constant_returns() {
        let returns = [0.01, 0.01, 0.01];
        assert_eq!(sharpe(&returns, 50.4), None);
        assert_relative_eq!(volatility(&returns, 50.4).unwrap(), 0.0);
    }

    #[test]
    fn test_sharpe_and_volatility_sample_std() {
        let returns = [0.02, -0.01, 0.03, 0.0];
        let mean = 0.01;
        let sd = ((0.01f64.powi(2) + 0.02f64.powi(2) + 0.02f64.powi(2) + 0.01f64.powi(2)) / 3.0).sqrt();
        let ann = 50.4_f64.sqrt();
        assert_relative_eq!(volatility(&returns, 50.4).unwrap(), sd * ann, max_relative = 1e-12);
        assert_relative_eq!(sharpe(&returns, 50.4).unwrap(), mean / sd * ann, max_relative = 1e-9);
    }

    #[test]
    fn test_single_period_series() {
        let row = series_metrics(SeriesKind::Model, &[1.05], &[0.05], 50.4);
        assert!(row.cagr.is_some());
        assert_eq!(row.volatility, None);
        assert_eq!(row.sharpe, None);
        assert_eq!(row.max_drawdown, Some(0.0));
        assert_eq!(row.calmar, None);
    }
}
