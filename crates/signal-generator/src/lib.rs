//! Probability -> threshold signal -> equal-weight allocation.

pub mod artifact;
pub mod generator;

pub use artifact::{ArtifactKind, SignalArtifact, SIGNAL_SCHEMA_VERSION};
pub use generator::{generate_signals, rethreshold, signals_for_date};
