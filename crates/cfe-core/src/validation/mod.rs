//! Accuracy validation against ground truth and corpus metrics.

pub mod engine;
pub mod metrics;

pub use engine::{ValidationEngine, edit_distance};
pub use metrics::MetricsAggregator;
