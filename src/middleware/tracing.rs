use std::time::Duration;

use tracing::{debug, info, info_span};

use super::Middleware;
use crate::dispatcher::HandlerRequest;
use crate::response::HttpResponse;

/// Logs each request start and completion inside a `request` span.
///
/// Handlers run on coroutines that may resume on another thread, so the span
/// is only entered for the duration of each event rather than held open.
pub struct TracingMiddleware;

fn request_span(req: &HandlerRequest) -> tracing::Span {
    info_span!(
        "request",
        request_id = %req.request_id,
        method = %req.method,
        path = %req.path,
        handler = %req.handler_name
    )
}

impl Middleware for TracingMiddleware {
    fn before(&self, req: &HandlerRequest) -> Option<HttpResponse> {
        request_span(req).in_scope(|| debug!("Request started"));
        None
    }

    fn after(&self, req: &HandlerRequest, res: &mut HttpResponse, latency: Duration) {
        request_span(req).in_scope(|| {
            info!(
                status = res.status,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            )
        });
    }
}
