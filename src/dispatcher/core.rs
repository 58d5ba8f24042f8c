//! Dispatcher core: the request path from routing to the built response.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::bind;
use super::invoke::{spawn_call, Call};
use super::request::{HandlerRequest, HandlerResult, IncomingRequest};
use crate::blueprint::FieldTable;
use crate::design::ApiDefinition;
use crate::error::{DefinitionError, DefinitionIssue};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::Middleware;
use crate::response::{
    build_response, internal_error_body, Completion, HttpResponse, PartResult, ResponseBody,
    ResponseContext,
};
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;

/// Stages a request passes through. Each transition is logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Unmatched,
    MethodChecked,
    Bound,
    Validated,
    Dispatched,
    Rendered,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Unmatched => "unmatched",
            DispatchState::MethodChecked => "method-checked",
            DispatchState::Bound => "bound",
            DispatchState::Validated => "validated",
            DispatchState::Dispatched => "dispatched",
            DispatchState::Rendered => "rendered",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn transition(request_id: RequestId, state: DispatchState) {
    debug!(request_id = %request_id, state = %state, "Dispatch state transition");
}

type SingleFn = dyn Fn(&HandlerRequest) -> HandlerResult + Send + Sync;
type PartFn = dyn Fn(&HandlerRequest, &Value) -> HandlerResult + Send + Sync;

#[derive(Clone)]
enum Handler {
    Single(Arc<SingleFn>),
    /// Invoked once per identifier of a multipart action
    Parts(Arc<PartFn>),
}

/// Routes, binds and validates requests, runs their handlers and builds the
/// response.
///
/// The dispatcher is immutable once handlers are registered and can be shared
/// across the transport's workers behind an `Arc`.
pub struct Dispatcher {
    api: Arc<ApiDefinition>,
    router: Router,
    handlers: HashMap<String, Handler>,
    middlewares: Vec<Arc<dyn Middleware>>,
    config: RuntimeConfig,
}

impl Dispatcher {
    /// Dispatcher for `api` configured from the environment.
    pub fn new(api: Arc<ApiDefinition>) -> Self {
        Self::with_config(api, RuntimeConfig::from_env())
    }

    pub fn with_config(api: Arc<ApiDefinition>, config: RuntimeConfig) -> Self {
        let router = Router::new(&api);
        Self {
            api,
            router,
            handlers: HashMap::new(),
            middlewares: Vec::new(),
            config,
        }
    }

    pub fn api(&self) -> &ApiDefinition {
        &self.api
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register the handler for a single-response action, by `resource.action`
    /// name.
    pub fn register<F>(&mut self, handler_name: &str, handler: F) -> Result<(), DefinitionError>
    where
        F: Fn(&HandlerRequest) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(handler_name, Handler::Single(Arc::new(handler)), false)
    }

    /// Register the per-identifier handler of a multipart action. It is called
    /// once per element of the action's multipart parameter.
    pub fn register_parts<F>(
        &mut self,
        handler_name: &str,
        handler: F,
    ) -> Result<(), DefinitionError>
    where
        F: Fn(&HandlerRequest, &Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(handler_name, Handler::Parts(Arc::new(handler)), true)
    }

    fn insert(
        &mut self,
        handler_name: &str,
        handler: Handler,
        parts: bool,
    ) -> Result<(), DefinitionError> {
        let location = format!("handler:{handler_name}");
        let Some(entry) = self
            .router
            .entries()
            .iter()
            .find(|e| &*e.handler_name == handler_name)
        else {
            return Err(DefinitionError::single(
                location,
                "unknown_action",
                format!("no action is named `{handler_name}`"),
            ));
        };
        let multipart = entry.action.multipart.is_some();
        if multipart != parts {
            let expected = if multipart { "register_parts" } else { "register" };
            return Err(DefinitionError::single(
                location,
                "handler_kind",
                format!("`{handler_name}` must be registered with `{expected}`"),
            ));
        }

        if self.handlers.insert(handler_name.to_string(), handler).is_some() {
            warn!(handler_name = %handler_name, "Replaced existing handler");
        }
        info!(
            handler_name = %handler_name,
            total_handlers = self.handlers.len(),
            "Handler registered successfully"
        );
        Ok(())
    }

    /// Every action must have a handler before serving.
    pub fn check_handlers(&self) -> Result<(), DefinitionError> {
        let issues = self
            .router
            .entries()
            .iter()
            .filter(|e| !self.handlers.contains_key(&*e.handler_name))
            .map(|e| {
                DefinitionIssue::new(
                    format!("handler:{}", e.handler_name),
                    "missing_handler",
                    format!(
                        "no handler registered for {} {}",
                        e.action.method, e.action.route
                    ),
                )
            })
            .collect();
        DefinitionError::check(issues)
    }

    /// Check that `table` has an accessor for every attribute the views of
    /// `media_type` reference, so a blueprint missing a field fails at startup
    /// rather than at render time.
    pub fn check_blueprint<T: 'static>(
        &self,
        media_type: &str,
        table: &FieldTable<T>,
    ) -> Result<(), DefinitionError> {
        let Some(mt) = self.api.media_type(media_type) else {
            return DefinitionError::check(vec![DefinitionIssue::new(
                format!("blueprint:{}", std::any::type_name::<T>()),
                "unknown_media_type",
                format!("media type `{media_type}` is not declared"),
            )]);
        };
        table.check(mt)
    }

    /// Middleware runs in registration order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Handle one request end to end. Never fails: every outcome, including
    /// routing misses and handler panics, is an [`HttpResponse`].
    pub fn dispatch(&self, incoming: IncomingRequest) -> HttpResponse {
        let request_id = RequestId::from_header_or_new(incoming.get_header(REQUEST_ID_HEADER));
        let mut resp = self.dispatch_with_request_id(incoming, request_id);
        resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
        resp
    }

    fn dispatch_with_request_id(
        &self,
        incoming: IncomingRequest,
        request_id: RequestId,
    ) -> HttpResponse {
        transition(request_id, DispatchState::Unmatched);
        let route_match = match self.router.route(&incoming.method, &incoming.path) {
            Ok(m) => m,
            Err(e) => return HttpResponse::from_routing_error(&e),
        };
        transition(request_id, DispatchState::MethodChecked);

        let IncomingRequest {
            method,
            path,
            query,
            headers,
            body,
        } = incoming;
        let mut request = HandlerRequest {
            request_id,
            method,
            path,
            handler_name: Arc::clone(&route_match.entry.handler_name),
            query_params: bind::parse_query(query.as_deref()),
            path_params: route_match.path_params,
            route: route_match.entry,
            headers,
            params: Default::default(),
            payload: None,
            view: None,
        };

        debug!(
            request_id = %request_id,
            middleware_count = self.middlewares.len(),
            "Middleware before execution"
        );
        let mut early_resp: Option<HttpResponse> = None;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            if early_resp.is_none() {
                early_resp = mw.before(&request);
                if early_resp.is_some() {
                    debug!(
                        request_id = %request_id,
                        middleware_idx = idx,
                        "Middleware returned early response"
                    );
                }
            } else {
                mw.before(&request);
            }
        }

        let (mut resp, latency) = match early_resp {
            Some(r) => (r, Duration::ZERO),
            None => {
                let start = Instant::now();
                let r = self.bind_and_run(&mut request, body.as_deref());
                (r, start.elapsed())
            }
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut resp, latency);
        }
        resp
    }

    fn bind_and_run(&self, request: &mut HandlerRequest, body: Option<&[u8]>) -> HttpResponse {
        let request_id = request.request_id;
        let action = Arc::clone(&request.route.action);
        let media_types = self.api.media_types();

        let (bound, mut errors) = bind::coerce(
            &action,
            media_types,
            &request.path_params,
            &request.query_params,
            body,
        );
        transition(request_id, DispatchState::Bound);
        errors.extend(bind::validate(&action, media_types, &bound));
        if !errors.is_empty() {
            info!(
                request_id = %request_id,
                handler_name = %request.handler_name,
                error_count = errors.len(),
                "Request rejected by validation"
            );
            return HttpResponse::error(400, "request validation failed", errors);
        }
        transition(request_id, DispatchState::Validated);

        request.params = bound.params;
        request.payload = bound.payload;
        request.view = bound.view;

        let Some(handler) = self.handlers.get(&*request.handler_name) else {
            let available: Vec<&String> = self.handlers.keys().collect();
            error!(
                request_id = %request_id,
                handler_name = %request.handler_name,
                available_handlers = ?available,
                "Handler not found"
            );
            return internal_error_body(
                &format!("no handler registered for `{}`", request.handler_name),
                self.config.debug_errors,
            );
        };

        info!(
            request_id = %request_id,
            handler_name = %request.handler_name,
            method = %request.method,
            path = %request.path,
            "Request dispatched to handler"
        );
        transition(request_id, DispatchState::Dispatched);
        let body = self.run(handler, request);

        let ctx = ResponseContext {
            entry: &request.route,
            media_types,
            params: &request.params,
            view: request.view.as_deref(),
            debug_errors: self.config.debug_errors,
        };
        let resp = build_response(&ctx, body);
        transition(request_id, DispatchState::Rendered);
        resp
    }

    fn run(&self, handler: &Handler, request: &HandlerRequest) -> ResponseBody {
        let timeout = request.action().timeout.or(self.config.default_timeout);
        let deadline = timeout.map(|t| Instant::now() + t);
        let shared = Arc::new(request.clone());
        let stack_size = self.config.stack_size;

        match handler {
            Handler::Single(f) => {
                let f = Arc::clone(f);
                let req = Arc::clone(&shared);
                let call = spawn_call(
                    &request.handler_name,
                    request.request_id,
                    stack_size,
                    move || f(&req),
                );
                ResponseBody::Single(call.wait(deadline))
            }
            Handler::Parts(f) => {
                let ids: Vec<Value> = request
                    .action()
                    .multipart
                    .as_deref()
                    .and_then(|name| request.param(name))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                // Start every part before waiting on any of them
                let calls: Vec<(Value, Call)> = ids
                    .into_iter()
                    .map(|id| {
                        let f = Arc::clone(f);
                        let req = Arc::clone(&shared);
                        let part_id = id.clone();
                        let call = spawn_call(
                            &request.handler_name,
                            request.request_id,
                            stack_size,
                            move || f(&req, &part_id),
                        );
                        (id, call)
                    })
                    .collect();

                let parts: Vec<PartResult> = calls
                    .into_iter()
                    .map(|(id, call)| PartResult {
                        id,
                        completion: call.wait(deadline),
                    })
                    .collect();
                let timed_out = parts
                    .iter()
                    .filter(|p| matches!(p.completion, Completion::TimedOut))
                    .count();
                if timed_out > 0 {
                    warn!(
                        request_id = %request.request_id,
                        handler_name = %request.handler_name,
                        timed_out_parts = timed_out,
                        total_parts = parts.len(),
                        "Multipart request finished with timed-out parts"
                    );
                }
                ResponseBody::Multipart(parts)
            }
        }
    }
}
