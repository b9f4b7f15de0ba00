//! # tallyware
//!
//! **tallyware** is a response-metrics middleware for HTTP services built on
//! the `may` coroutine runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! Every request that passes through the middleware gets a unique response
//! id, its body bytes counted, and its handler latency timed. Completed
//! measurements accumulate in a concurrent store; a configurable report page
//! exposes per-response rows plus min/max/average aggregates, live, while
//! traffic keeps flowing.
//!
//! ## Architecture
//!
//! - **[`body`]** - byte-counting sink and the mode-guarded body wrapper
//!   (binary stream vs. auto-flushing text writer, never both)
//! - **[`ids`]** - response id newtype and the sequential/random allocator
//! - **[`metrics`]** - write-once per-response records, the concurrent store,
//!   snapshots and aggregates
//! - **[`middleware`]** - the measuring middleware tying the above together
//! - **[`server`]** - `may_minihttp` adapter: request parsing, response
//!   writing, service and server handles
//! - **[`report`]** - HTML report page rendered from request attributes
//! - **[`static_files`]** - static/template file serving for the demo site
//! - **[`config`]** - middleware and runtime configuration
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may_minihttp)
//!     participant MW as MetricsMiddleware
//!     participant Store as MetricsStore
//!     participant Handler
//!
//!     Client->>Server: HTTP request
//!     Server->>MW: handle(ctx, sink, next)
//!     alt report path
//!         MW->>Store: snapshot + aggregates
//!         MW->>MW: publish request attributes
//!         MW->>Handler: next(ctx, body)
//!         Handler-->>MW: report page head
//!     else any other path
//!         MW->>Store: reserve(id) (retry on collision)
//!         MW->>Handler: next(ctx, metered body)
//!         Handler->>Handler: write through stream or writer
//!         Handler-->>MW: head
//!         MW->>Store: record(id, size, latency) once
//!         MW->>MW: attach id response header
//!     end
//!     MW-->>Server: (body bytes, head)
//!     Server-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io;
//! use std::sync::Arc;
//!
//! use tallyware::body::MeteredBody;
//! use tallyware::config::MetricsConfig;
//! use tallyware::middleware::MetricsMiddleware;
//! use tallyware::server::{AppService, HttpServer, RequestContext, RequestHandler, ResponseHead};
//!
//! fn page(_ctx: &RequestContext, body: &mut MeteredBody<Vec<u8>>) -> io::Result<ResponseHead> {
//!     let mut w = body.writer()?;
//!     w.write_str("<h1>Hello World!</h1>")?;
//!     Ok(ResponseHead::html())
//! }
//!
//! let metrics = Arc::new(MetricsMiddleware::new(MetricsConfig::default()));
//! let handler: Arc<dyn RequestHandler> = Arc::new(page);
//! let service = AppService::new(metrics, handler);
//! let server = HttpServer(service).start("0.0.0.0:8080").unwrap();
//! server.join().unwrap();
//! ```
//!
//! ## Runtime Considerations
//!
//! tallyware runs on the `may` coroutine runtime, not tokio. Handlers execute
//! inside server coroutines; the stack size is configurable via the
//! `TALLY_STACK_SIZE` environment variable (see [`config::RuntimeConfig`]).
//! The middleware itself spawns nothing and holds no locks across handler
//! calls, so concurrency is bounded by the server, not by the measuring.

pub mod body;
pub mod config;
pub mod ids;
pub mod metrics;
pub mod middleware;
pub mod report;
pub mod server;
pub mod static_files;

pub use body::{BodySink, CountingStream, MeteredBody, OutputModeError, TextWriter};
pub use config::{ConfigError, MetricsConfig, RuntimeConfig};
pub use ids::{IdStrategy, ResponseId, ResponseIdAllocator};
pub use metrics::{Aggregate, Metric, MetricsSnapshot, MetricsStore, RecordError, ResponseMetrics};
pub use middleware::{MetricsMiddleware, RESPONSE_METRICS_ATTR};
