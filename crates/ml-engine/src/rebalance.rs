use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use research_core::LabeledRow;

use crate::error::{MLError, MLResult};

/// Downsample the majority class to the minority count.
///
/// Only ever called on a single fold's training window. Surviving rows keep
/// their original order.
pub fn downsample_majority<'a>(rows: &[&'a LabeledRow], rng: &mut StdRng) -> MLResult<Vec<&'a LabeledRow>> {
    let (positives, negatives): (Vec<usize>, Vec<usize>) =
        (0..rows.len()).partition(|&i| rows[i].target);

    if positives.is_empty() || negatives.is_empty() {
        return Err(MLError::SingleClass);
    }

    let (minority, mut majority) = if positives.len() <= negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };

    majority.shuffle(rng);
    majority.truncate(minority.len());

    let mut keep: Vec<usize> = minority.into_iter().chain(majority).collect();
    keep.sort_unstable();
    Ok(keep.into_iter().map(|i| rows[i]).collect())
}
