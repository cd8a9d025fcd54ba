use std::collections::BTreeMap;

use chrono::NaiveDate;

use research_core::{BacktestRow, DailyReturn, PipelineResult, RealizedReturn, SignalRow};

use crate::join::join_realized;
use crate::metrics::metrics_table;
use crate::models::{EvaluateParams, EvaluationResult};

/// Per-row contribution clamped to `[stop_loss, take_profit]`.
///
/// The cap applies to `weight * realized_return`, i.e. to the position's
/// contribution to the portfolio. A missing or non-finite return contributes 0.
pub fn capped_contribution(row: &BacktestRow, params: &EvaluateParams) -> f64 {
    let realized = match row.realized_return {
        Some(r) if r.is_finite() => r,
        _ => return 0.0,
    };
    (row.weight * realized).clamp(params.stop_loss, params.take_profit)
}

#[derive(Default)]
struct DayAccumulator {
    strategy: f64,
    benchmark_sum: f64,
    benchmark_count: usize,
}

/// Group by date, sum capped contributions, average raw returns, and compound
/// both series in ascending date order.
pub fn aggregate_daily(rows: &[BacktestRow], params: &EvaluateParams) -> Vec<DailyReturn> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for row in rows {
        let day = days.entry(row.date).or_default();
        day.strategy += capped_contribution(row, params);
        // benchmark covers every instrument with data, signaled or not
        if let Some(r) = row.realized_return.filter(|r| r.is_finite()) {
            day.benchmark_sum += r;
            day.benchmark_count += 1;
        }
    }

    let mut strategy_cum = 1.0;
    let mut benchmark_cum = 1.0;
    days.into_iter()
        .map(|(date, day)| {
            let benchmark_return = if day.benchmark_count > 0 {
                Some(day.benchmark_sum / day.benchmark_count as f64)
            } else {
                None
            };
            strategy_cum *= 1.0 + day.strategy;
            benchmark_cum *= 1.0 + benchmark_return.unwrap_or(0.0);
            DailyReturn {
                date,
                strategy_return: day.strategy,
                benchmark_return,
                strategy_cum,
                benchmark_cum,
            }
        })
        .collect()
}

/// Evaluate a threshold strategy over joined backtest rows.
///
/// Pure: identical inputs give identical outputs. An empty row set yields
/// [`EvaluationResult::empty`] rather than an error.
pub fn evaluate(rows: &[BacktestRow], params: &EvaluateParams) -> PipelineResult<EvaluationResult> {
    params.validate()?;

    if rows.is_empty() {
        tracing::info!("No backtest rows; returning empty evaluation");
        return Ok(EvaluationResult::empty());
    }

    let daily = aggregate_daily(rows, params);
    let metrics = metrics_table(&daily, params.periods_per_year());
    let start_date = daily.first().map(|d| d.date);
    let end_date = daily.last().map(|d| d.date);

    tracing::debug!(
        "Evaluated {} rows over {} dates ({:?} to {:?})",
        rows.len(),
        daily.len(),
        start_date,
        end_date
    );

    Ok(EvaluationResult {
        daily,
        metrics,
        row_count: rows.len(),
        start_date,
        end_date,
    })
}

/// Re-threshold stored probabilities, join realized returns and evaluate.
/// This is the full recomputation behind a dashboard parameter change.
pub fn evaluate_signals(
    signals: &[SignalRow],
    realized: &[RealizedReturn],
    threshold: f64,
    params: &EvaluateParams,
) -> PipelineResult<EvaluationResult> {
    let signals = signal_generator::rethreshold(signals, threshold)?;
    let rows = join_realized(&signals, realized)?;
    evaluate(&rows, params)
}
