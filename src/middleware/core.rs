use std::time::Duration;

use crate::dispatcher::HandlerRequest;
use crate::response::HttpResponse;

pub trait Middleware: Send + Sync {
    /// Return a response to answer the request without binding or running
    /// the handler.
    fn before(&self, _req: &HandlerRequest) -> Option<HttpResponse> {
        None
    }
    fn after(&self, _req: &HandlerRequest, _res: &mut HttpResponse, _latency: Duration) {}
}
