use thiserror::Error;

/// Failures shared by every stage of the research pipeline.
///
/// Numeric degeneracies (zero volatility, zero drawdown) are not errors: they
/// surface as `None` metric values instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("No data: {0}")]
    EmptyData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for errors caused by caller-supplied input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingInput(_)
                | PipelineError::InvalidData(_)
                | PipelineError::InvalidParameter(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
