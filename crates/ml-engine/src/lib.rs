//! Model training for the research pipeline: a logistic classifier, chronological
//! folds, and the walk-forward hyperparameter search.

pub mod error;
pub mod folds;
pub mod logistic;
pub mod persistence;
pub mod rebalance;
pub mod scoring;
pub mod trainer;

pub use error::{MLError, MLResult};
pub use folds::{rolling_origin, Fold, FoldPolicy};
pub use logistic::{default_grid, LogisticParams, LogisticRegression};
pub use persistence::{ModelArtifact, MODEL_FILE_NAME};
pub use rebalance::downsample_majority;
pub use scoring::ScoringMetric;
pub use trainer::{
    Classifier, ConfigSummary, FoldScore, LogisticClassifier, TrainerConfig, TrainingReport,
    WalkForwardTrainer,
};
