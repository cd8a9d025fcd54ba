use std::collections::HashMap;

use chrono::NaiveDate;

use research_core::{BacktestRow, PipelineError, PipelineResult, RealizedReturn, SignalRow};

/// Left join of signals with realized returns on (instrument, date).
///
/// Every signal row survives; rows without a match carry `None`. Duplicate
/// realized keys are rejected.
pub fn join_realized(signals: &[SignalRow], realized: &[RealizedReturn]) -> PipelineResult<Vec<BacktestRow>> {
    let mut lookup: HashMap<(&str, NaiveDate), f64> = HashMap::with_capacity(realized.len());
    for r in realized {
        if lookup
            .insert((r.instrument.as_str(), r.date), r.realized_return)
            .is_some()
        {
            return Err(PipelineError::InvalidData(format!(
                "duplicate realized return for {} on {}",
                r.instrument, r.date
            )));
        }
    }

    let rows: Vec<BacktestRow> = signals
        .iter()
        .map(|s| {
            let realized = lookup.get(&(s.instrument.as_str(), s.date)).copied();
            BacktestRow::from_signal(s, realized)
        })
        .collect();

    let unmatched = rows.iter().filter(|r| r.realized_return.is_none()).count();
    if unmatched > 0 {
        tracing::debug!("{} of {} signal rows have no realized return", unmatched, rows.len());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn signal(instrument: &str, day: u32) -> SignalRow {
        SignalRow {
            instrument: instrument.to_string(),
            date: date(day),
            predicted_probability: 0.7,
            signal: 1,
            weight: 1.0,
        }
    }

    fn realized(instrument: &str, day: u32, r: f64) -> RealizedReturn {
        RealizedReturn {
            instrument: instrument.to_string(),
            date: date(day),
            realized_return: r,
        }
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let signals = vec![signal("A", 1), signal("B", 1), signal("A", 2)];
        let returns = vec![realized("A", 1, 0.03), realized("A", 2, -0.01), realized("C", 1, 0.5)];
        let rows = join_realized(&signals, &returns).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].realized_return, Some(0.03));
        assert_eq!(rows[1].realized_return, None);
        assert_eq!(rows[2].realized_return, Some(-0.01));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let returns = vec![realized("A", 1, 0.03), realized("A", 1, 0.04)];
        assert!(join_realized(&[signal("A", 1)], &returns).is_err());
    }
}
