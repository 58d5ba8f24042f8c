//! # Dispatcher
//!
//! Takes an [`IncomingRequest`] from whatever transport embeds the framework
//! and returns an [`HttpResponse`](crate::response::HttpResponse):
//!
//! 1. the [`Router`](crate::router::Router) resolves method and path to one
//!    action, or answers `404` / `405` with `Allow`
//! 2. `before` middleware runs and may answer early
//! 3. path captures, query values and the body are coerced and validated;
//!    every problem is aggregated into a single `400`
//! 4. the registered handler runs on its own `may` coroutine, so a panic
//!    becomes a `500` and an elapsed timeout a `504`
//! 5. the response builder renders the outcome, then `after` middleware runs
//!
//! Handlers are closures registered under `resource.action` names. They
//! capture whatever application state they need; the framework holds none.
//!
//! ```rust
//! use mediaroute::design::{Action, ApiDefinition, Resource, ResponseSpec};
//! use mediaroute::dispatcher::{Dispatcher, HandlerOutcome, IncomingRequest};
//! use mediaroute::runtime_config::RuntimeConfig;
//! use http::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let ping = Resource::builder("ping")
//!     .prefix("/ping")
//!     .action(Action::builder("show").get("").response("ok", ResponseSpec::ok()))
//!     .build()
//!     .unwrap();
//! let api = ApiDefinition::builder("demo").resource(ping).build().unwrap();
//!
//! let mut dispatcher = Dispatcher::with_config(Arc::new(api), RuntimeConfig::default());
//! dispatcher
//!     .register("ping.show", |_req| {
//!         Ok(HandlerOutcome::new("ok").with_body(json!({"pong": true})))
//!     })
//!     .unwrap();
//!
//! let resp = dispatcher.dispatch(IncomingRequest::new(Method::GET, "/ping"));
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.body, Some(json!({"pong": true})));
//! ```

mod bind;
mod core;
mod invoke;
mod request;

pub use bind::{coerce_scalar, parse_query, VIEW_QUERY_KEY};
pub use core::{DispatchState, Dispatcher};
pub use request::{
    HandlerOutcome, HandlerRequest, HandlerResult, HeaderVec, IncomingRequest,
    MAX_INLINE_HEADERS,
};
