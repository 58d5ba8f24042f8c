//! # Response Builder
//!
//! Turns what a handler produced into an [`HttpResponse`] according to the
//! action's declared [`ResponseSpec`]s. There is a single entry point,
//! [`build_response`], fed one tagged [`ResponseBody`]:
//!
//! - `Single`: the handler's outcome (or error) selects a response key; the
//!   key's declared response decides the status, renders the body through a view and fills
//!   the header templates.
//! - `Multipart`: one [`PartResult`] per identifier, each rendered
//!   independently into an `{id, status, body}` entry. A failed part never
//!   affects its siblings.
//!
//! Anything that indicates a programmer defect (an undeclared response key, a
//! render failure, a header placeholder nothing can fill) becomes a generic
//! `500`. The details are logged and only exposed in the body when debug
//! errors are enabled.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::blueprint::Body;
use crate::design::{join_path, placeholders_in, Action, MediaTypes, ResponseSpec, RouteEntry};
use crate::dispatcher::{HandlerOutcome, HandlerResult, HeaderVec};
use crate::error::{BindingError, HandlerError, RoutingError};
use crate::render::Renderer;
use crate::validator::ValidationFailure;

/// Framework response handed back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderVec,
    /// JSON body; `None` for empty responses such as `204`
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: None,
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        let mut resp = Self::new(status);
        resp.set_header("content-type", "application/json".to_string());
        resp.body = Some(body);
        resp
    }

    /// Standard error body: `{code, message, errors}`.
    pub fn error(status: u16, message: impl Into<String>, errors: Vec<ErrorDetail>) -> Self {
        let body = ErrorBody {
            code: status,
            message: message.into(),
            errors,
        };
        Self::json(status, serde_json::to_value(body).unwrap_or(Value::Null))
    }

    /// Response for a request that did not resolve to an action.
    pub fn from_routing_error(err: &RoutingError) -> Self {
        let reason = match err {
            RoutingError::NoRouteMatched { .. } => "notFound",
            RoutingError::MethodNotAllowed { .. } => "methodNotAllowed",
        };
        let mut resp = Self::error(
            err.status(),
            err.to_string(),
            vec![ErrorDetail::new("routing", reason, err.to_string())],
        );
        if let Some(allow) = err.allow_header() {
            resp.set_header("allow", allow);
        }
        resp
    }

    /// Header value by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Serialized body, empty when there is none.
    pub fn body_bytes(&self) -> Vec<u8> {
        self.body
            .as_ref()
            .and_then(|b| serde_json::to_vec(b).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Where the problem is: `path`, `query`, `payload`, `routing`, ...
    pub domain: String,
    pub reason: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(
        domain: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn from_binding(err: &BindingError) -> Self {
        let domain = match err {
            BindingError::Missing { location, .. } | BindingError::Coercion { location, .. } => {
                *location
            }
            BindingError::MalformedBody(_) => "payload",
            BindingError::UnknownView(_) => "query",
        };
        Self::new(domain, err.reason(), err.to_string())
    }

    pub fn from_validation(domain: &str, failure: &ValidationFailure) -> Self {
        Self::new(domain, failure.constraint, failure.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    pub errors: Vec<ErrorDetail>,
}

/// How one handler invocation ended.
#[derive(Debug)]
pub enum Completion {
    Returned(HandlerResult),
    /// The action's timeout elapsed before the handler replied
    TimedOut,
    /// The handler panicked or its coroutine could not run
    Panicked(String),
}

/// One part of a multipart response.
#[derive(Debug)]
pub struct PartResult {
    pub id: Value,
    pub completion: Completion,
}

#[derive(Debug)]
pub enum ResponseBody {
    Single(Completion),
    Multipart(Vec<PartResult>),
}

/// Everything about the request the builder needs besides the handler result.
pub struct ResponseContext<'a> {
    pub entry: &'a RouteEntry,
    pub media_types: &'a MediaTypes,
    /// Bound parameters, used to fill header templates
    pub params: &'a Map<String, Value>,
    /// View requested with `?view=`
    pub view: Option<&'a str>,
    /// Include internal diagnostics in `500` bodies
    pub debug_errors: bool,
}

/// Build the final response for one dispatched request.
pub fn build_response(ctx: &ResponseContext<'_>, body: ResponseBody) -> HttpResponse {
    match body {
        ResponseBody::Single(completion) => single(ctx, completion),
        ResponseBody::Multipart(parts) => multipart(ctx, parts),
    }
}

fn single(ctx: &ResponseContext<'_>, completion: Completion) -> HttpResponse {
    let rendered = match completion {
        Completion::Returned(Ok(outcome)) => keyed(ctx, outcome),
        Completion::Returned(Err(err)) => keyed_error(ctx, err),
        Completion::TimedOut => return timed_out(ctx),
        Completion::Panicked(message) => return internal_error(ctx, &message),
    };
    rendered.unwrap_or_else(|defect| internal_error(ctx, &defect))
}

fn multipart(ctx: &ResponseContext<'_>, parts: Vec<PartResult>) -> HttpResponse {
    let action = &ctx.entry.action;
    let Some(envelope) = action.multipart_response() else {
        return internal_error(
            ctx,
            &format!("action `{}` has no multipart response", action.name),
        );
    };

    let entries: Vec<Value> = parts
        .into_iter()
        .map(|part| {
            let resp = match part.completion {
                Completion::Returned(Ok(outcome)) => keyed(ctx, outcome),
                Completion::Returned(Err(err)) => keyed_error(ctx, err),
                Completion::TimedOut => Ok(timed_out(ctx)),
                Completion::Panicked(message) => Err(message),
            }
            .unwrap_or_else(|defect| internal_error(ctx, &defect));

            let mut entry = Map::new();
            entry.insert("id".to_string(), Value::String(param_text(&part.id)));
            entry.insert("status".to_string(), Value::from(resp.status));
            entry.insert("body".to_string(), resp.body.unwrap_or(Value::Null));
            Value::Object(entry)
        })
        .collect();

    HttpResponse::json(envelope.status, Value::Array(entries))
}

fn keyed(ctx: &ResponseContext<'_>, outcome: HandlerOutcome) -> Result<HttpResponse, String> {
    let spec = declared(&ctx.entry.action, &outcome.key)?;
    let mut resp = render(ctx, &outcome.key, spec, outcome.body)?;
    apply_header_templates(ctx, spec, &outcome.location_ids, &mut resp)?;
    for (name, value) in outcome.headers {
        resp.set_header(&name, value);
    }
    Ok(resp)
}

fn keyed_error(ctx: &ResponseContext<'_>, err: HandlerError) -> Result<HttpResponse, String> {
    info!(
        handler_name = %ctx.entry.handler_name,
        response_key = %err.key,
        message = err.message.as_deref().unwrap_or(""),
        "Handler returned an error response"
    );
    let spec = declared(&ctx.entry.action, &err.key)?;
    if err.body.is_none() && spec.media_type.is_none() && spec.status >= 400 {
        let message = err.message.clone().unwrap_or_else(|| err.key.clone());
        return Ok(HttpResponse::error(
            spec.status,
            message.clone(),
            vec![ErrorDetail::new("handler", err.key.as_str(), message)],
        ));
    }
    let mut resp = render(ctx, &err.key, spec, err.body)?;
    apply_header_templates(ctx, spec, &[], &mut resp)?;
    Ok(resp)
}

fn declared<'a>(action: &'a Action, key: &str) -> Result<&'a ResponseSpec, String> {
    action
        .response(key)
        .ok_or_else(|| format!("handler chose undeclared response key `{key}`"))
}

fn render(
    ctx: &ResponseContext<'_>,
    key: &str,
    spec: &ResponseSpec,
    body: Option<Body>,
) -> Result<HttpResponse, String> {
    let mut resp = HttpResponse::new(spec.status);
    if spec.status == 204 {
        return Ok(resp);
    }
    let Some(body) = body else {
        return Ok(resp);
    };

    match (&spec.media_type, body) {
        (Some(identifier), body) => {
            let view = select_view(ctx, identifier, spec);
            let renderer = Renderer::new(ctx.media_types);
            let rendered = match view {
                Some(view) => renderer.render(body.as_blueprint(), identifier, view),
                None => renderer.render_default(body.as_blueprint(), identifier),
            }
            .map_err(|e| format!("rendering response `{key}` failed: {e}"))?;
            resp.set_header("content-type", identifier.clone());
            resp.body = Some(Value::Object(rendered));
        }
        (None, Body::Json(value)) => {
            resp.set_header("content-type", "application/json".to_string());
            resp.body = Some(value);
        }
        (None, Body::Model(_)) => {
            return Err(format!(
                "response `{key}` declares no media type to render a model with"
            ));
        }
    }
    Ok(resp)
}

/// The requested view when the media type has it, then the response's declared view,
/// then the media type's default.
fn select_view<'a>(
    ctx: &'a ResponseContext<'_>,
    identifier: &str,
    spec: &'a ResponseSpec,
) -> Option<&'a str> {
    let requested = ctx.view.filter(|v| {
        ctx.media_types
            .get(identifier)
            .is_some_and(|mt| mt.has_view(v))
    });
    requested.or(spec.view.as_deref())
}

fn apply_header_templates(
    ctx: &ResponseContext<'_>,
    spec: &ResponseSpec,
    ids: &[(String, String)],
    resp: &mut HttpResponse,
) -> Result<(), String> {
    for header in &spec.headers {
        let template = if header.name.eq_ignore_ascii_case("location") {
            location_template(&ctx.entry.resource.prefix, &header.template)
        } else {
            header.template.clone()
        };
        let mut value = template.clone();
        for name in placeholders_in(&template) {
            let replacement = ids
                .iter()
                .rfind(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .or_else(|| ctx.params.get(name).map(param_text))
                .ok_or_else(|| {
                    format!(
                        "header `{}` placeholder `{{{name}}}` has no identifier or parameter",
                        header.name
                    )
                })?;
            value = value.replace(&format!("{{{name}}}"), &replacement);
        }
        resp.set_header(&header.name, value);
    }
    Ok(())
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `Location` templates are relative to the resource prefix, joined the
/// way action routes are. Templates already under the prefix and full URLs
/// are kept as given. Placeholders from the prefix are filled like any other.
fn location_template(prefix: &str, template: &str) -> String {
    if template.contains("://") {
        return template.to_string();
    }
    let base = prefix.trim_end_matches('/');
    let under_prefix = !base.is_empty()
        && template
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));
    if under_prefix {
        template.to_string()
    } else {
        join_path(prefix, template)
    }
}

fn timed_out(ctx: &ResponseContext<'_>) -> HttpResponse {
    warn!(handler_name = %ctx.entry.handler_name, "Handler timed out");
    HttpResponse::error(
        504,
        "handler did not respond in time",
        vec![ErrorDetail::new("server", "timeout", "handler did not respond in time")],
    )
}

fn internal_error(ctx: &ResponseContext<'_>, defect: &str) -> HttpResponse {
    error!(
        handler_name = %ctx.entry.handler_name,
        defect = %defect,
        "Response could not be built"
    );
    internal_error_body(defect, ctx.debug_errors)
}

/// Generic `500`; `defect` is only included when `debug` is set.
pub fn internal_error_body(defect: &str, debug: bool) -> HttpResponse {
    let message = if debug {
        format!("internal server error: {defect}")
    } else {
        "internal server error".to_string()
    };
    HttpResponse::error(
        500,
        message.clone(),
        vec![ErrorDetail::new("server", "internal", message)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Action, ApiDefinition, Attribute, MediaType, Resource};
    use serde_json::json;

    fn api() -> ApiDefinition {
        let note = MediaType::builder("application/vnd.note+json")
            .attribute(Attribute::integer("id"))
            .attribute(Attribute::string("text"))
            .view("default", ["id", "text"])
            .view("tiny", ["id"])
            .build()
            .unwrap();
        let notes = Resource::builder("notes")
            .prefix("/notes")
            .media_type("application/vnd.note+json")
            .action(
                Action::builder("create")
                    .post("")
                    .response("created", ResponseSpec::created().location("{id}"))
                    .response("odd", ResponseSpec::status(418)),
            )
            .action(
                Action::builder("purge")
                    .delete("/{ids}")
                    .param(Attribute::collection(
                        "ids",
                        crate::design::AttributeType::primitive(crate::design::Primitive::Integer),
                    ))
                    .multipart("ids")
                    .response("bulk", ResponseSpec::multipart(200))
                    .response("deleted", ResponseSpec::no_content())
                    .response("notFound", ResponseSpec::not_found()),
            )
            .build()
            .unwrap();
        ApiDefinition::builder("notes")
            .media_type(note)
            .resource(notes)
            .build()
            .unwrap()
    }

    fn with_ctx<R>(action: &str, view: Option<&str>, f: impl FnOnce(&ResponseContext<'_>) -> R) -> R {
        let api = api();
        let entry = api
            .routes()
            .into_iter()
            .find(|e| e.action.name == action)
            .unwrap();
        let params = Map::new();
        let ctx = ResponseContext {
            entry: &entry,
            media_types: api.media_types(),
            params: &params,
            view,
            debug_errors: false,
        };
        f(&ctx)
    }

    #[test]
    fn created_renders_and_resolves_location() {
        let resp = with_ctx("create", None, |ctx| {
            build_response(
                ctx,
                ResponseBody::Single(Completion::Returned(Ok(HandlerOutcome::new("created")
                    .with_body(json!({"id": 9, "text": "hi"}))
                    .with_id("id", 9)))),
            )
        });
        assert_eq!(resp.status, 201);
        assert_eq!(resp.get_header("location"), Some("/notes/9"));
        assert_eq!(
            serde_json::to_string(&resp.body).unwrap(),
            r#"{"id":9,"text":"hi"}"#
        );
    }

    #[test]
    fn requested_view_is_used_when_available() {
        let resp = with_ctx("create", Some("tiny"), |ctx| {
            build_response(
                ctx,
                ResponseBody::Single(Completion::Returned(Ok(HandlerOutcome::new("created")
                    .with_body(json!({"id": 9, "text": "hi"}))
                    .with_id("id", 9)))),
            )
        });
        assert_eq!(resp.body, Some(json!({"id": 9})));
    }

    #[test]
    fn undeclared_key_is_a_generic_500() {
        let resp = with_ctx("create", None, |ctx| {
            build_response(
                ctx,
                ResponseBody::Single(Completion::Returned(Ok(HandlerOutcome::new("teapot")))),
            )
        });
        assert_eq!(resp.status, 500);
        let text = serde_json::to_string(&resp.body).unwrap();
        assert!(!text.contains("teapot"));
    }

    #[test]
    fn multipart_keeps_order_and_isolates_failures() {
        let resp = with_ctx("purge", None, |ctx| {
            build_response(
                ctx,
                ResponseBody::Multipart(vec![
                    PartResult {
                        id: json!(1),
                        completion: Completion::Returned(Ok(HandlerOutcome::new("deleted"))),
                    },
                    PartResult {
                        id: json!(2),
                        completion: Completion::Panicked("boom".into()),
                    },
                    PartResult {
                        id: json!(3),
                        completion: Completion::Returned(Err(HandlerError::not_found())),
                    },
                    PartResult {
                        id: json!(4),
                        completion: Completion::TimedOut,
                    },
                ]),
            )
        });
        assert_eq!(resp.status, 200);
        let parts = resp.body.unwrap();
        let statuses: Vec<_> = parts
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["id"].clone(), p["status"].clone()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (json!("1"), json!(204)),
                (json!("2"), json!(500)),
                (json!("3"), json!(404)),
                (json!("4"), json!(504)),
            ]
        );
        assert_eq!(parts[0]["body"], Value::Null);
    }

    #[test]
    fn location_template_joins_prefix() {
        assert_eq!(location_template("/posts", "{id}"), "/posts/{id}");
        assert_eq!(location_template("/posts/", "{id}"), "/posts/{id}");
        assert_eq!(location_template("/posts", "/{id}"), "/posts/{id}");
        assert_eq!(location_template("", "{id}"), "/{id}");
        assert_eq!(location_template("/posts", "/posts/{id}"), "/posts/{id}");
        assert_eq!(location_template("/posts", "/postsx/{id}"), "/posts/postsx/{id}");
        assert_eq!(
            location_template("/posts/{post_id}/comments", "/{id}"),
            "/posts/{post_id}/comments/{id}"
        );
        assert_eq!(
            location_template("/posts", "https://cdn.example.com/{id}"),
            "https://cdn.example.com/{id}"
        );
    }

    #[test]
    fn debug_errors_expose_the_defect() {
        let resp = internal_error_body("view `x` missing", true);
        assert!(resp.body.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("view `x` missing"));
    }
}
