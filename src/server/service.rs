use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use tracing::error;

use super::request::{parse_request, RequestContext};
use super::response::{write_json_error, write_response, ResponseHead};
use crate::body::MeteredBody;
use crate::middleware::MetricsMiddleware;

/// Application side of the service: everything below the middleware.
///
/// Handlers write their body through the metered sink and return the head.
/// Closures with the right signature implement this, which is how the demo
/// binary and the integration tests register routes.
pub trait RequestHandler: Send + Sync {
    fn handle(
        &self,
        ctx: &RequestContext,
        body: &mut MeteredBody<Vec<u8>>,
    ) -> io::Result<ResponseHead>;
}

impl<F> RequestHandler for F
where
    F: Fn(&RequestContext, &mut MeteredBody<Vec<u8>>) -> io::Result<ResponseHead> + Send + Sync,
{
    fn handle(
        &self,
        ctx: &RequestContext,
        body: &mut MeteredBody<Vec<u8>>,
    ) -> io::Result<ResponseHead> {
        self(ctx, body)
    }
}

/// `may_minihttp` service: parse the request, run it through the measuring
/// middleware into the handler, write the result.
///
/// Every path goes through the middleware, so every page (static ones
/// included) is measured; only the report path is exempt, and that branch is
/// the middleware's decision, not a routing rule here.
pub struct AppService {
    metrics: Arc<MetricsMiddleware>,
    handler: Arc<dyn RequestHandler>,
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self {
            metrics: Arc::clone(&self.metrics),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl AppService {
    pub fn new(metrics: Arc<MetricsMiddleware>, handler: Arc<dyn RequestHandler>) -> Self {
        Self { metrics, handler }
    }

    pub fn metrics(&self) -> Arc<MetricsMiddleware> {
        Arc::clone(&self.metrics)
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut ctx = parse_request(req);
        let outcome = self
            .metrics
            .handle(&mut ctx, Vec::new(), |ctx, body| self.handler.handle(ctx, body));
        match outcome {
            Ok((bytes, head)) => write_response(res, &head, bytes),
            Err(err) => {
                error!(method = %ctx.method, path = %ctx.path, error = %err, "handler failed");
                write_json_error(res, 500, json!({ "error": "Internal Server Error" }));
            }
        }
        Ok(())
    }
}
