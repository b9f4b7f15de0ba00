use std::time::Duration;

/// Final measurements for one completed response. Written once, never
/// mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMetrics {
    size_bytes: u64,
    time_nanos: u64,
}

impl ResponseMetrics {
    pub fn new(size_bytes: u64, elapsed: Duration) -> Self {
        Self {
            size_bytes,
            time_nanos: elapsed.as_nanos() as u64,
        }
    }

    /// Response body size in bytes. 0 is a valid measurement.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Handler latency in nanoseconds.
    pub fn time_nanos(&self) -> u64 {
        self.time_nanos
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.time_nanos)
    }
}

/// The two measured dimensions, each carrying the attribute keys the report
/// page reads its aggregate cells from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ResponseSize,
    ResponseTime,
}

impl Metric {
    pub fn min_key(self) -> &'static str {
        match self {
            Metric::ResponseSize => "minimumResponseSize",
            Metric::ResponseTime => "minimumResponseTime",
        }
    }

    pub fn max_key(self) -> &'static str {
        match self {
            Metric::ResponseSize => "maximumResponseSize",
            Metric::ResponseTime => "maximumResponseTime",
        }
    }

    pub fn average_key(self) -> &'static str {
        match self {
            Metric::ResponseSize => "averageResponseSize",
            Metric::ResponseTime => "averageResponseTime",
        }
    }

    /// Extract this dimension from a record.
    pub fn value(self, metrics: &ResponseMetrics) -> u64 {
        match self {
            Metric::ResponseSize => metrics.size_bytes(),
            Metric::ResponseTime => metrics.time_nanos(),
        }
    }
}

/// Minimum, maximum and arithmetic mean of one metric dimension over a
/// snapshot. All zero when the snapshot holds no finalized entries.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregate {
    pub min: u64,
    pub max: u64,
    pub average: f64,
}
