//! Chronological fold generation (rolling origin).

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use research_core::LabeledRow;

use crate::error::{MLError, MLResult};

/// Window sizes are counted in distinct dates, so a fold always holds every
/// instrument observed on its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPolicy {
    /// Dates in each training window.
    pub initial: usize,
    /// Dates in each assessment window.
    pub assess: usize,
    /// Extra dates skipped between consecutive fold origins (0 = step by one date).
    pub skip: usize,
    /// Expanding training windows when true; fixed-size rolling windows otherwise.
    pub cumulative: bool,
}

impl FoldPolicy {
    pub fn rolling(initial: usize, assess: usize, skip: usize) -> Self {
        Self {
            initial,
            assess,
            skip,
            cumulative: false,
        }
    }
}

impl Default for FoldPolicy {
    /// About a year of training dates; assessment windows do not overlap.
    fn default() -> Self {
        FoldPolicy::rolling(250, 20, 19)
    }
}

/// Row indices of one fold. Every training date precedes every assessment date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub assess_start: NaiveDate,
    pub assess_end: NaiveDate,
    pub train: Vec<usize>,
    pub assess: Vec<usize>,
}

/// Split `rows` into rolling-origin folds over their distinct sorted dates.
pub fn rolling_origin(rows: &[LabeledRow], policy: &FoldPolicy) -> MLResult<Vec<Fold>> {
    if policy.initial == 0 || policy.assess == 0 {
        return Err(MLError::NoFolds(
            "initial and assess windows must be non-empty".to_string(),
        ));
    }

    let dates: Vec<NaiveDate> = rows
        .iter()
        .map(|r| r.date())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let window = policy.initial + policy.assess;
    if dates.len() < window {
        return Err(MLError::NoFolds(format!(
            "{} distinct dates, need at least {}",
            dates.len(),
            window
        )));
    }

    let step = policy.skip + 1;
    let mut folds = Vec::new();
    let mut start = 0;
    while start + window <= dates.len() {
        let train_from = if policy.cumulative { 0 } else { start };
        let train_start = dates[train_from];
        let train_end = dates[start + policy.initial - 1];
        let assess_start = dates[start + policy.initial];
        let assess_end = dates[start + window - 1];

        let mut train = Vec::new();
        let mut assess = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let d = row.date();
            if d >= train_start && d <= train_end {
                train.push(i);
            } else if d >= assess_start && d <= assess_end {
                assess.push(i);
            }
        }

        folds.push(Fold {
            index: folds.len(),
            train_start,
            train_end,
            assess_start,
            assess_end,
            train,
            assess,
        });
        start += step;
    }

    Ok(folds)
}
