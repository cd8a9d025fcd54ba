use research_core::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MLError {
    #[error("Model not fitted")]
    NotFitted,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Training rows contain a single class")]
    SingleClass,

    #[error("No folds: {0}")]
    NoFolds(String),

    #[error("No configuration could be scored on any fold")]
    NoViableConfiguration,

    #[error("Invalid hyperparameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MLResult<T> = Result<T, MLError>;
