//! Request middleware.
//!
//! Middleware sees every request that resolved to an action: `before` runs
//! ahead of binding and may answer the request itself, `after` runs on the
//! final response, early answers included.

mod core;
mod metrics;
mod tracing;

pub use core::Middleware;
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;
