use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use research_core::{PipelineError, PipelineResult, RealizedReturn, SignalRow};

use crate::generator::signals_for_date;

pub const SIGNAL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Latest available date only.
    Live,
    /// Full held-out span, used for backtesting.
    Historical,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Live => "signals_live.json",
            ArtifactKind::Historical => "signals_historical.json",
        }
    }
}

/// One signal-generation run. Live and historical artifacts share the row schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalArtifact {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub kind: ArtifactKind,
    pub threshold: f64,
    pub rows: Vec<SignalRow>,
    /// Realized returns for the same (instrument, date) keys. Empty for live runs.
    #[serde(default)]
    pub realized: Vec<RealizedReturn>,
}

impl SignalArtifact {
    pub fn new(kind: ArtifactKind, threshold: f64, rows: Vec<SignalRow>, realized: Vec<RealizedReturn>) -> Self {
        Self {
            schema_version: SIGNAL_SCHEMA_VERSION,
            created_at: Utc::now(),
            kind,
            threshold,
            rows,
            realized,
        }
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }

    pub fn latest_rows(&self) -> Vec<SignalRow> {
        match self.latest_date() {
            Some(date) => signals_for_date(&self.rows, date),
            None => Vec::new(),
        }
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(
            "Saved {:?} signal artifact ({} rows) to {}",
            self.kind,
            self.rows.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!("signal artifact {}", path.display())));
        }
        let artifact: SignalArtifact = serde_json::from_str(&fs::read_to_string(path)?)?;
        if artifact.schema_version != SIGNAL_SCHEMA_VERSION {
            return Err(PipelineError::InvalidData(format!(
                "signal schema version {} (expected {})",
                artifact.schema_version, SIGNAL_SCHEMA_VERSION
            )));
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(instrument: &str, day: u32, p: f64) -> SignalRow {
        SignalRow {
            instrument: instrument.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            predicted_probability: p,
            signal: u8::from(p > 0.6),
            weight: if p > 0.6 { 1.0 } else { 0.0 },
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ArtifactKind::Historical.file_name());
        let artifact = SignalArtifact::new(
            ArtifactKind::Historical,
            0.6,
            vec![signal("A", 1, 0.7), signal("A", 2, 0.4)],
            vec![RealizedReturn {
                instrument: "A".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                realized_return: 0.01,
            }],
        );
        artifact.save(&path).unwrap();
        assert_eq!(SignalArtifact::load(&path).unwrap(), artifact);
    }

    #[test]
    fn test_latest_rows() {
        let artifact = SignalArtifact::new(
            ArtifactKind::Live,
            0.6,
            vec![signal("A", 1, 0.7), signal("B", 3, 0.9), signal("C", 3, 0.2)],
            Vec::new(),
        );
        assert_eq!(artifact.latest_date(), NaiveDate::from_ymd_opt(2024, 5, 3));
        let latest = artifact.latest_rows();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].instrument, "B");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SignalArtifact::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }
}
