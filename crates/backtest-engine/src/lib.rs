pub mod engine;
pub mod join;
pub mod metrics;
pub mod models;
pub mod recompute;

pub use engine::{aggregate_daily, capped_contribution, evaluate, evaluate_signals};
pub use join::join_realized;
pub use metrics::metrics_table;
pub use models::*;
pub use recompute::{LatestResultCell, Published, RecomputeOutcome};
