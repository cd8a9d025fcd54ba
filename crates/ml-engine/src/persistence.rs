use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use research_core::PipelineError;

use crate::error::{MLError, MLResult};
use crate::logistic::LogisticRegression;

pub const MODEL_SCHEMA_VERSION: u32 = 1;
pub const MODEL_FILE_NAME: &str = "model.json";

/// A fitted model on disk. Loaded models predict without retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    /// Last date included in training.
    pub trained_through: Option<chrono::NaiveDate>,
    pub model: LogisticRegression,
}

impl ModelArtifact {
    pub fn new(model: LogisticRegression, trained_through: Option<chrono::NaiveDate>) -> Self {
        Self {
            schema_version: MODEL_SCHEMA_VERSION,
            created_at: Utc::now(),
            trained_through,
            model,
        }
    }

    pub fn save(&self, path: &Path) -> MLResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(PipelineError::from)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(PipelineError::from)?;
        tracing::info!("Saved model artifact to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> MLResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!("model artifact {}", path.display())).into());
        }
        let json = fs::read_to_string(path).map_err(PipelineError::from)?;
        let artifact: ModelArtifact = serde_json::from_str(&json)?;
        if artifact.schema_version != MODEL_SCHEMA_VERSION {
            return Err(MLError::Pipeline(PipelineError::InvalidData(format!(
                "model schema version {} (expected {})",
                artifact.schema_version, MODEL_SCHEMA_VERSION
            ))));
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistic::tests::{names, separable_rows};
    use crate::logistic::LogisticParams;
    use research_core::{LabeledRow, ProbabilityModel};

    #[test]
    fn test_load_predicts_like_saved_model() {
        let rows = separable_rows(60);
        let refs: Vec<&LabeledRow> = rows.iter().collect();
        let model = LogisticRegression::fit(&refs, &names(), &LogisticParams::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(MODEL_FILE_NAME);
        ModelArtifact::new(model.clone(), Some(rows[59].date())).save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.trained_through, Some(rows[59].date()));
        for row in rows.iter().take(10) {
            let a = model.predict_proba(&row.row.features).unwrap();
            let b = loaded.model.predict_proba(&row.row.features).unwrap();
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(&dir.path().join(MODEL_FILE_NAME)).unwrap_err();
        assert!(matches!(err, MLError::Pipeline(PipelineError::MissingInput(_))));
    }
}
