use crate::{FeatureVector, PipelineResult};

/// A fitted classifier that maps a feature vector to P(label = positive).
///
/// Implementations are immutable after fitting and shared read-only between
/// the signal generator and any concurrent evaluation.
pub trait ProbabilityModel: Send + Sync {
    /// Probability in [0, 1]. Fails if a required feature is absent.
    fn predict_proba(&self, features: &FeatureVector) -> PipelineResult<f64>;

    /// Features the model reads, in the order it reads them.
    fn feature_names(&self) -> &[String];

    fn name(&self) -> &str;
}
