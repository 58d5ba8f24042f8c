use http::Method;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::blueprint::{Blueprint, Body};
use crate::design::{Action, RouteEntry};
use crate::error::HandlerError;
use crate::ids::RequestId;
use crate::router::ParamVec;

/// Maximum inline headers before heap allocation. Most requests carry fewer
/// than sixteen.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage; names are shared, values are per request.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A request as handed over by the transport.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderVec,
    pub body: Option<Vec<u8>>,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Split a request target such as `/posts?view=tiny` into path and query.
    pub fn from_target(method: Method, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::new(method, path).with_query(query),
            None => Self::new(method, target),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
    }

    /// Header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A routed request as seen by handlers and middleware.
///
/// `params` is empty while `before` middleware runs and holds the bound,
/// validated parameters (path first, then query) once the handler runs.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_name: Arc<str>,
    pub route: RouteEntry,
    /// Raw, percent-decoded path captures
    pub path_params: ParamVec,
    /// Raw, percent-decoded query pairs in request order
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub params: Map<String, Value>,
    /// Validated payload for actions that declare one
    pub payload: Option<Value>,
    /// View requested with `?view=`
    pub view: Option<String>,
}

impl HandlerRequest {
    pub fn action(&self) -> &Action {
        &self.route.action
    }

    /// Bound parameter value.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn param_i64(&self, name: &str) -> Option<i64> {
        self.param(name).and_then(Value::as_i64)
    }

    /// Payload member by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(name))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a handler hands back on success: the response key to use, an
/// optional body and the identifiers header templates refer to.
#[derive(Debug)]
pub struct HandlerOutcome {
    pub key: String,
    pub body: Option<Body>,
    /// Values for `{name}` placeholders in header templates such as `Location`
    pub location_ids: Vec<(String, String)>,
    /// Extra headers set verbatim
    pub headers: Vec<(String, String)>,
}

impl HandlerOutcome {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: None,
            location_ids: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Body rendered from a native blueprint.
    pub fn with_model<B: Blueprint + 'static>(mut self, model: B) -> Self {
        self.body = Some(Body::model(model));
        self
    }

    pub fn with_id(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.location_ids.push((name.into(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub type HandlerResult = Result<HandlerOutcome, HandlerError>;
