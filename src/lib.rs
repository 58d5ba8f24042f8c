//! # mediaroute
//!
//! **mediaroute** is a declarative API framework: an application describes
//! its media types, their views and its resources with their actions, and
//! the framework derives routing, parameter binding, validation, rendering
//! and response construction from those declarations. Handlers run on `may`
//! coroutines.
//!
//! ## Overview
//!
//! The library is organized into these modules:
//!
//! - **[`design`]** - Attributes, media types and views, resources and actions; the
//!   builder API and the YAML/JSON definition loader
//! - **[`validator`]** - Attribute validation with aggregated failures
//! - **[`blueprint`]** - Explicit field accessor tables for native data
//! - **[`render`]** - View rendering of blueprints into JSON
//! - **[`router`]** - Radix-tree route matching with 404/405 handling
//! - **[`dispatcher`]** - Binding, validation and coroutine dispatch of handlers
//! - **[`response`]** - Single and multipart response construction
//! - **[`middleware`]** - Tracing and metrics middleware
//! - **[`generator`]** / **[`cli`]** - The `mediaroute-gen` definition compiler
//! - **[`logging`]**, **[`runtime_config`]**, **[`ids`]** - Logging setup, environment
//!   configuration and request identifiers
//!
//! ## Request Flow
//!
//! ```text
//! IncomingRequest
//!   → Router (404 / 405 + Allow)
//!   → middleware before
//!   → bind + validate (one 400 listing every failure)
//!   → handler on a coroutine (panic → 500, timeout → 504)
//!   → response builder (status, view, Location)
//!   → middleware after
//!   → HttpResponse
//! ```
//!
//! Binding a socket is left to the embedding HTTP server, which converts its
//! requests into [`dispatcher::IncomingRequest`] and writes back the
//! [`response::HttpResponse`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mediaroute::design::{Action, ApiDefinition, Attribute, MediaType, Resource, ResponseSpec};
//! use mediaroute::dispatcher::{Dispatcher, HandlerOutcome, IncomingRequest};
//! use mediaroute::runtime_config::RuntimeConfig;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), mediaroute::error::DefinitionError> {
//! let greeting = MediaType::builder("application/vnd.hello")
//!     .attribute(Attribute::integer("id").required())
//!     .attribute(Attribute::string("text"))
//!     .view("default", ["id", "text"])
//!     .build()?;
//! let hello = Resource::builder("hello")
//!     .prefix("/hello")
//!     .media_type("application/vnd.hello")
//!     .action(
//!         Action::builder("show")
//!             .get("/{id}")
//!             .param(Attribute::integer("id").required())
//!             .response("ok", ResponseSpec::ok()),
//!     )
//!     .build()?;
//! let api = ApiDefinition::builder("hello")
//!     .media_type(greeting)
//!     .resource(hello)
//!     .build()?;
//!
//! let mut dispatcher = Dispatcher::with_config(Arc::new(api), RuntimeConfig::default());
//! dispatcher.register("hello.show", |req| {
//!     let id = req.param_i64("id").unwrap_or_default();
//!     Ok(HandlerOutcome::new("ok").with_body(json!({ "id": id, "text": "Hello world!" })))
//! })?;
//!
//! let resp = dispatcher.dispatch(IncomingRequest::new(http::Method::GET, "/hello/1"));
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.body, Some(json!({ "id": 1, "text": "Hello world!" })));
//! # Ok(())
//! # }
//! ```

pub mod blueprint;
pub mod cli;
pub mod design;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod validator;

pub use design::{load_dir, ApiDefinition};
pub use dispatcher::{Dispatcher, HandlerOutcome, HandlerRequest, IncomingRequest};
pub use response::HttpResponse;
