//! Per-response measurements and the concurrent store that aggregates them.

mod record;
mod store;

pub use record::{Aggregate, Metric, ResponseMetrics};
pub use store::{MetricsSnapshot, MetricsStore, RecordError};
