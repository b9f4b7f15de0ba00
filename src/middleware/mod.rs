//! The per-response measuring middleware that sits between the HTTP adapter
//! and the application handler.

mod metrics;

pub use metrics::{MetricsMiddleware, RESPONSE_METRICS_ATTR};
