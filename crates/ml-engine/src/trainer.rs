//! Walk-forward hyperparameter search.
//!
//! Every (configuration, fold) pair is an independent unit of work. Results
//! are keyed by their indices and sorted before aggregation, so the selected
//! configuration does not depend on how rayon schedules the grid.

use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use research_core::{LabeledRow, PipelineError, ProbabilityModel};

use crate::error::{MLError, MLResult};
use crate::folds::{rolling_origin, Fold, FoldPolicy};
use crate::logistic::{default_grid, LogisticParams, LogisticRegression};
use crate::rebalance::downsample_majority;
use crate::scoring::ScoringMetric;

/// A model family the trainer can fit.
pub trait Classifier: Sync {
    type Params: Clone + Debug + Send + Sync + Serialize;
    type Model: ProbabilityModel;

    /// Feature columns every input row must carry.
    fn feature_names(&self) -> &[String];

    fn fit(&self, rows: &[&LabeledRow], params: &Self::Params) -> MLResult<Self::Model>;
}

#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    pub feature_names: Vec<String>,
}

impl LogisticClassifier {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self { feature_names }
    }
}

impl Classifier for LogisticClassifier {
    type Params = LogisticParams;
    type Model = LogisticRegression;

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn fit(&self, rows: &[&LabeledRow], params: &LogisticParams) -> MLResult<LogisticRegression> {
        LogisticRegression::fit(rows, &self.feature_names, params)
    }
}

#[derive(Debug, Clone)]
pub struct TrainerConfig<P> {
    pub fold_policy: FoldPolicy,
    pub grid: Vec<P>,
    pub metric: ScoringMetric,
    pub seed: u64,
    /// Downsample the majority class inside each training window.
    pub rebalance: bool,
}

impl TrainerConfig<LogisticParams> {
    pub fn logistic(seed: u64) -> Self {
        Self {
            fold_policy: FoldPolicy::default(),
            grid: default_grid(),
            metric: ScoringMetric::default(),
            seed,
            rebalance: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub config_index: usize,
    pub fold_index: usize,
    pub score: Option<f64>,
    /// Set when the fold could not be scored for this configuration.
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary<P> {
    pub config_index: usize,
    pub params: P,
    pub mean_score: Option<f64>,
    pub folds_scored: usize,
    pub folds_skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport<P> {
    pub metric: ScoringMetric,
    pub fold_count: usize,
    pub training_rows: usize,
    pub selected_index: usize,
    pub selected_params: P,
    pub selected_score: f64,
    pub configs: Vec<ConfigSummary<P>>,
    pub fold_scores: Vec<FoldScore>,
}

pub struct WalkForwardTrainer<C: Classifier> {
    classifier: C,
    config: TrainerConfig<C::Params>,
}

impl<C: Classifier> WalkForwardTrainer<C> {
    pub fn new(classifier: C, config: TrainerConfig<C::Params>) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &TrainerConfig<C::Params> {
        &self.config
    }

    /// Search the grid over rolling-origin folds of `rows`, then refit the
    /// best configuration on all of `rows`.
    ///
    /// The caller is responsible for passing only rows dated before the
    /// train/test cutoff.
    pub fn train(&self, rows: &[LabeledRow]) -> MLResult<(C::Model, TrainingReport<C::Params>)> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyData("no labeled rows to train on".to_string()).into());
        }
        if self.config.grid.is_empty() {
            return Err(MLError::InvalidParams("hyperparameter grid is empty".to_string()));
        }
        self.check_features(rows)?;

        let folds = rolling_origin(rows, &self.config.fold_policy)?;
        let jobs: Vec<(usize, usize)> = (0..self.config.grid.len())
            .flat_map(|ci| (0..folds.len()).map(move |fi| (ci, fi)))
            .collect();

        tracing::info!(
            "Walk-forward search: {} configurations x {} folds ({} fits)",
            self.config.grid.len(),
            folds.len(),
            jobs.len()
        );

        let mut fold_scores: Vec<FoldScore> = jobs
            .par_iter()
            .map(|&(ci, fi)| self.score_fold(rows, &folds[fi], ci))
            .collect();
        fold_scores.sort_by_key(|s| (s.config_index, s.fold_index));

        for s in &fold_scores {
            if let Some(reason) = &s.skipped {
                tracing::warn!(
                    "Skipped fold {} for config {}: {}",
                    s.fold_index,
                    s.config_index,
                    reason
                );
            }
        }

        let configs = self.summarize(&fold_scores);
        let (selected_index, selected_score) = self.select(&configs)?;
        let selected_params = self.config.grid[selected_index].clone();

        tracing::info!(
            "Selected config {} ({:?}) with mean {:?} = {:.4}",
            selected_index,
            selected_params,
            self.config.metric,
            selected_score
        );

        let all: Vec<&LabeledRow> = rows.iter().collect();
        let train_rows = if self.config.rebalance {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            downsample_majority(&all, &mut rng)?
        } else {
            all
        };
        let model = self.classifier.fit(&train_rows, &selected_params)?;

        let report = TrainingReport {
            metric: self.config.metric,
            fold_count: folds.len(),
            training_rows: train_rows.len(),
            selected_index,
            selected_params,
            selected_score,
            configs,
            fold_scores,
        };
        Ok((model, report))
    }

    fn check_features(&self, rows: &[LabeledRow]) -> MLResult<()> {
        for r in rows {
            if let Some(missing) = self
                .classifier
                .feature_names()
                .iter()
                .find(|name| !r.row.features.contains_key(*name))
            {
                return Err(PipelineError::MissingInput(format!(
                    "feature '{}' missing for {} on {}",
                    missing, r.row.instrument, r.row.date
                ))
                .into());
            }
        }
        Ok(())
    }

    fn score_fold(&self, rows: &[LabeledRow], fold: &Fold, config_index: usize) -> FoldScore {
        let outcome = self.fit_and_score(rows, fold, config_index);
        let (score, skipped) = match outcome {
            Ok(Some(score)) => (Some(score), None),
            Ok(None) => (None, Some("metric undefined on assessment window".to_string())),
            Err(e) => (None, Some(e.to_string())),
        };
        FoldScore {
            config_index,
            fold_index: fold.index,
            score,
            skipped,
        }
    }

    fn fit_and_score(&self, rows: &[LabeledRow], fold: &Fold, config_index: usize) -> MLResult<Option<f64>> {
        let train: Vec<&LabeledRow> = fold.train.iter().map(|&i| &rows[i]).collect();
        let train = if self.config.rebalance {
            // Same seed per fold for every configuration, so configurations
            // compete on identical samples.
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(fold.index as u64));
            downsample_majority(&train, &mut rng)?
        } else {
            train
        };

        let model = self.classifier.fit(&train, &self.config.grid[config_index])?;

        let mut labels = Vec::with_capacity(fold.assess.len());
        let mut probs = Vec::with_capacity(fold.assess.len());
        for &i in &fold.assess {
            labels.push(rows[i].target);
            probs.push(model.predict_proba(&rows[i].row.features)?);
        }
        Ok(self.config.metric.score(&labels, &probs))
    }

    fn summarize(&self, fold_scores: &[FoldScore]) -> Vec<ConfigSummary<C::Params>> {
        self.config
            .grid
            .iter()
            .enumerate()
            .map(|(ci, params)| {
                let scores: Vec<f64> = fold_scores
                    .iter()
                    .filter(|s| s.config_index == ci)
                    .filter_map(|s| s.score)
                    .collect();
                let skipped = fold_scores
                    .iter()
                    .filter(|s| s.config_index == ci && s.score.is_none())
                    .count();
                let mean_score = if scores.is_empty() {
                    None
                } else {
                    Some(research_core::stats::mean(&scores))
                };
                ConfigSummary {
                    config_index: ci,
                    params: params.clone(),
                    mean_score,
                    folds_scored: scores.len(),
                    folds_skipped: skipped,
                }
            })
            .collect()
    }

    /// Best mean score in metric direction; ties keep the lowest index.
    fn select(&self, configs: &[ConfigSummary<C::Params>]) -> MLResult<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for c in configs {
            let Some(score) = c.mean_score else { continue };
            match best {
                Some((_, b)) if !self.config.metric.is_better(score, b) => {}
                _ => best = Some((c.config_index, score)),
            }
        }
        best.ok_or(MLError::NoViableConfiguration)
    }
}
