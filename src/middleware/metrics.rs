use std::io;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use crate::body::{BodySink, MeteredBody};
use crate::config::MetricsConfig;
use crate::ids::ResponseIdAllocator;
use crate::metrics::{Metric, MetricsStore, ResponseMetrics};
use crate::server::{RequestContext, ResponseHead};

/// Request attribute holding the finalized per-response table when the
/// report page is requested. The six aggregate scalars live under the keys
/// exposed by [`Metric`].
pub const RESPONSE_METRICS_ATTR: &str = "responseMetrics";

/// Measures every response that passes through it.
///
/// For a normal request the middleware allocates a unique response id, wraps
/// the body sink so all output is counted, times the handler, attaches the id
/// to the configured response header, and records size and latency exactly
/// once. For a request to the configured report path it instead publishes the
/// current aggregates and the finalized per-response table as request
/// attributes for the report renderer, without measuring that response.
///
/// One instance owns one allocator and one store; construction is the whole
/// lifecycle start and dropping it releases all recorded state. Server
/// coroutines share the instance behind an `Arc` and call
/// [`handle`](Self::handle) concurrently.
pub struct MetricsMiddleware {
    config: MetricsConfig,
    allocator: ResponseIdAllocator,
    store: Arc<MetricsStore>,
}

impl MetricsMiddleware {
    pub fn new(config: MetricsConfig) -> Self {
        let allocator = ResponseIdAllocator::new(config.id_strategy);
        Self {
            config,
            allocator,
            store: Arc::new(MetricsStore::new()),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Shared handle to the underlying store, for inspection outside the
    /// request path.
    pub fn store(&self) -> Arc<MetricsStore> {
        Arc::clone(&self.store)
    }

    /// Drop every recorded metric and rewind the sequential allocator, as if
    /// the middleware were freshly constructed.
    pub fn reset(&self) {
        self.store.clear();
        self.allocator.reset();
    }

    /// Run one request through the middleware.
    ///
    /// `next` receives the request context and the metered body and returns
    /// the response head; the sink comes back to the caller with the head
    /// once measuring is done. Handler errors propagate unchanged and nothing
    /// is recorded for them; the reserved id stays visible as an
    /// observed-but-unfinalized entry.
    pub fn handle<S, F>(
        &self,
        ctx: &mut RequestContext,
        sink: S,
        next: F,
    ) -> io::Result<(S, ResponseHead)>
    where
        S: BodySink,
        F: FnOnce(&RequestContext, &mut MeteredBody<S>) -> io::Result<ResponseHead>,
    {
        if ctx.path == self.config.report_path {
            return self.handle_report(ctx, sink, next);
        }

        // Claim a fresh id; a random id that collides with one already in
        // the store is discarded and reallocated.
        let mut id = self.allocator.next();
        while !self.store.reserve(id.clone()) {
            id = self.allocator.next();
        }

        let mut body = MeteredBody::new(sink);
        let started = Instant::now();
        let result = next(ctx, &mut body);
        let elapsed = started.elapsed();

        let mut head = result?;
        let size = body.response_size();
        self.store
            .record(&id, ResponseMetrics::new(size, elapsed))
            .map_err(io::Error::other)?;
        head.set_header(self.config.id_header.clone(), id.to_string());
        debug!(
            response_id = %id,
            size_bytes = size,
            latency_ns = elapsed.as_nanos() as u64,
            "response measured"
        );
        Ok((body.into_inner(), head))
    }

    /// Report branch: publish aggregates and the finalized table as request
    /// attributes, then let the handler render them. The report response
    /// itself is never measured and carries no id header.
    fn handle_report<S, F>(
        &self,
        ctx: &mut RequestContext,
        sink: S,
        next: F,
    ) -> io::Result<(S, ResponseHead)>
    where
        S: BodySink,
        F: FnOnce(&RequestContext, &mut MeteredBody<S>) -> io::Result<ResponseHead>,
    {
        let snapshot = self.store.snapshot();
        for metric in [Metric::ResponseSize, Metric::ResponseTime] {
            let agg = snapshot.aggregate(metric);
            ctx.set_attribute(metric.min_key(), json!(agg.min));
            ctx.set_attribute(metric.max_key(), json!(agg.max));
            ctx.set_attribute(metric.average_key(), json!(agg.average));
        }

        let mut table = serde_json::Map::new();
        for (id, m) in snapshot.finalized() {
            table.insert(
                id.to_string(),
                json!({ "size_bytes": m.size_bytes(), "time_nanos": m.time_nanos() }),
            );
        }
        debug!(
            observed = snapshot.len(),
            finalized = table.len(),
            "metrics report prepared"
        );
        ctx.set_attribute(RESPONSE_METRICS_ATTR, serde_json::Value::Object(table));

        let mut body = MeteredBody::new(sink);
        let head = next(ctx, &mut body)?;
        Ok((body.into_inner(), head))
    }
}
