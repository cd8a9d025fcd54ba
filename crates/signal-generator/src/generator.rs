use std::collections::BTreeMap;

use chrono::NaiveDate;

use research_core::{FeatureRow, PipelineError, PipelineResult, ProbabilityModel, SignalRow};

/// Score every row with `model` and allocate equal weights per date across
/// the rows whose probability exceeds `threshold`.
///
/// A single-date snapshot is just the one-group case. Output order follows
/// the input order.
pub fn generate_signals(
    model: &dyn ProbabilityModel,
    rows: &[FeatureRow],
    threshold: f64,
) -> PipelineResult<Vec<SignalRow>> {
    validate_threshold(threshold)?;

    let mut signals = Vec::with_capacity(rows.len());
    for row in rows {
        let p = model.predict_proba(&row.features)?;
        signals.push(SignalRow {
            instrument: row.instrument.clone(),
            date: row.date,
            predicted_probability: p,
            signal: 0,
            weight: 0.0,
        });
    }

    apply_threshold(&mut signals, threshold);
    tracing::debug!(
        "{} ({}) scored {} rows at threshold {}",
        model.name(),
        model.feature_names().len(),
        signals.len(),
        threshold
    );
    Ok(signals)
}

/// Recompute signal and weight from stored probabilities, without the model.
pub fn rethreshold(rows: &[SignalRow], threshold: f64) -> PipelineResult<Vec<SignalRow>> {
    validate_threshold(threshold)?;
    let mut out = rows.to_vec();
    apply_threshold(&mut out, threshold);
    Ok(out)
}

/// Rows dated `date`, in input order.
pub fn signals_for_date(rows: &[SignalRow], date: NaiveDate) -> Vec<SignalRow> {
    rows.iter().filter(|r| r.date == date).cloned().collect()
}

fn validate_threshold(threshold: f64) -> PipelineResult<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PipelineError::InvalidParameter(format!(
            "threshold must be within [0, 1] (got {})",
            threshold
        )));
    }
    Ok(())
}

fn apply_threshold(rows: &mut [SignalRow], threshold: f64) {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows.iter_mut() {
        row.signal = u8::from(row.predicted_probability > threshold);
        if row.signal == 1 {
            *counts.entry(row.date).or_default() += 1;
        }
    }

    for row in rows.iter_mut() {
        let n = counts.get(&row.date).copied().unwrap_or(0);
        // n == 0 leaves every weight on that date at zero
        row.weight = if row.signal == 1 && n > 0 {
            1.0 / n as f64
        } else {
            0.0
        };
    }
}
