//! Price history -> labeled feature rows.
//!
//! Reference implementation of the feature contract consumed by the trainer
//! and the signal generator.

pub mod features;
pub mod indicators;
pub mod labeling;
pub mod loader;
pub mod universe;

pub use features::{build_feature_rows, build_live_rows, feature_names, realized_returns, validate_schema, FEATURE_NAMES};
pub use labeling::{label_end_date, label_rows, latest_snapshot, price_dates, purge_label_overlap, split_at_cutoff};
pub use loader::{load_prices_csv, read_prices};
pub use universe::{filter_universe, sample_universe};
