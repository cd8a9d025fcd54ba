use serde::{Deserialize, Serialize};

/// Out-of-sample metric used to rank hyperparameter configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    #[default]
    RocAuc,
    Accuracy,
    LogLoss,
}

impl ScoringMetric {
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, ScoringMetric::LogLoss)
    }

    /// Score `probs` against `labels`. `None` when the metric is undefined
    /// for this sample (empty, or single-class for AUC).
    pub fn score(&self, labels: &[bool], probs: &[f64]) -> Option<f64> {
        if labels.is_empty() || labels.len() != probs.len() {
            return None;
        }
        match self {
            ScoringMetric::RocAuc => roc_auc(labels, probs),
            ScoringMetric::Accuracy => Some(accuracy(labels, probs)),
            ScoringMetric::LogLoss => Some(log_loss(labels, probs)),
        }
    }

    /// True if `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if self.higher_is_better() {
            a > b
        } else {
            a < b
        }
    }
}

/// Mann-Whitney formulation with average ranks for tied scores.
fn roc_auc(labels: &[bool], probs: &[f64]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut ranks = vec![0.0; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|(&l, _)| l)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

fn accuracy(labels: &[bool], probs: &[f64]) -> f64 {
    let correct = labels
        .iter()
        .zip(probs.iter())
        .filter(|(&l, &p)| (p > 0.5) == l)
        .count();
    correct as f64 / labels.len() as f64
}

fn log_loss(labels: &[bool], probs: &[f64]) -> f64 {
    let eps = 1e-15;
    let total: f64 = labels
        .iter()
        .zip(probs.iter())
        .map(|(&l, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if l {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_auc_perfect_and_inverted() {
        let labels = [false, false, true, true];
        let probs = [0.1, 0.2, 0.8, 0.9];
        assert_abs_diff_eq!(ScoringMetric::RocAuc.score(&labels, &probs).unwrap(), 1.0);
        let inverted = [0.9, 0.8, 0.2, 0.1];
        assert_abs_diff_eq!(ScoringMetric::RocAuc.score(&labels, &inverted).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_ties_count_half() {
        let labels = [false, true];
        let probs = [0.5, 0.5];
        assert_abs_diff_eq!(ScoringMetric::RocAuc.score(&labels, &probs).unwrap(), 0.5);
    }

    #[test]
    fn test_auc_undefined_for_single_class() {
        assert!(ScoringMetric::RocAuc.score(&[true, true], &[0.2, 0.7]).is_none());
        assert!(ScoringMetric::Accuracy.score(&[], &[]).is_none());
    }

    #[test]
    fn test_accuracy_and_log_loss() {
        let labels = [true, false, true, false];
        let probs = [0.9, 0.4, 0.3, 0.2];
        assert_abs_diff_eq!(ScoringMetric::Accuracy.score(&labels, &probs).unwrap(), 0.75);

        let ll = ScoringMetric::LogLoss.score(&[true], &[0.5]).unwrap();
        assert_abs_diff_eq!(ll, std::f64::consts::LN_2, epsilon = 1e-12);
        assert!(ScoringMetric::LogLoss.is_better(0.3, 0.6));
        assert!(ScoringMetric::RocAuc.is_better(0.7, 0.6));
    }
}
