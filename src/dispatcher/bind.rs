//! Parameter binding and request validation.
//!
//! Binding happens in two passes so every problem reaches the client in one
//! `400`:
//!
//! 1. [`coerce`] turns raw path captures, query values and the body into
//!    typed JSON. Parameters that cannot be coerced are recorded and left out.
//! 2. [`validate`] runs the declared constraints over everything that was
//!    bound.
//!
//! Collection parameters accept repeated query keys and comma-separated
//! values (`?ids=1,2&ids=3`).

use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::design::{Action, Attribute, AttributeType, MediaTypes, Primitive};
use crate::error::BindingError;
use crate::response::ErrorDetail;
use crate::router::ParamVec;
use crate::validator::{validate_members, validate_with};

/// Query key selecting the response view, unless an action captures it.
pub const VIEW_QUERY_KEY: &str = "view";

/// Result of the coercion pass.
#[derive(Debug, Default)]
pub struct Bound {
    pub params: Map<String, Value>,
    pub payload: Option<Value>,
    pub view: Option<String>,
    /// Parameters that failed coercion; validation skips them
    failed: HashSet<String>,
    payload_failed: bool,
}

/// Parse a raw query string into percent-decoded pairs.
pub fn parse_query(query: Option<&str>) -> ParamVec {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn coerce(
    action: &Action,
    media_types: &MediaTypes,
    path_params: &ParamVec,
    query_params: &ParamVec,
    body: Option<&[u8]>,
) -> (Bound, Vec<ErrorDetail>) {
    let mut bound = Bound::default();
    let mut errors = Vec::new();

    for param in &action.params {
        let (location, raw) = raw_values(action, param, path_params, query_params);
        if raw.is_empty() {
            if param.constraints.required {
                errors.push(ErrorDetail::from_binding(&BindingError::Missing {
                    name: param.name.clone(),
                    location,
                }));
                bound.failed.insert(param.name.clone());
            }
            continue;
        }
        match coerce_param(param, location, &raw) {
            Ok(value) => {
                bound.params.insert(param.name.clone(), value);
            }
            Err(err) => {
                errors.push(ErrorDetail::from_binding(&err));
                bound.failed.insert(param.name.clone());
            }
        }
    }

    if action.payload.is_some() {
        match body.filter(|b| !b.iter().all(u8::is_ascii_whitespace)) {
            None => bound.payload = Some(Value::Object(Map::new())),
            Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
                Ok(value) => bound.payload = Some(value),
                Err(e) => {
                    errors.push(ErrorDetail::from_binding(&BindingError::MalformedBody(
                        e.to_string(),
                    )));
                    bound.payload_failed = true;
                }
            },
        }
    }

    let view_is_captured = action.route.query().iter().any(|q| q.key == VIEW_QUERY_KEY);
    if !view_is_captured {
        if let Some((_, view)) = query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == VIEW_QUERY_KEY)
        {
            let known = action
                .primary_media_type()
                .and_then(|id| media_types.get(id))
                .is_some_and(|mt| mt.has_view(view));
            if known {
                bound.view = Some(view.clone());
            } else {
                errors.push(ErrorDetail::from_binding(&BindingError::UnknownView(
                    view.clone(),
                )));
            }
        }
    }

    (bound, errors)
}

pub fn validate(action: &Action, media_types: &MediaTypes, bound: &Bound) -> Vec<ErrorDetail> {
    let mut errors = Vec::new();
    for param in &action.params {
        if bound.failed.contains(&param.name) {
            continue;
        }
        let value = bound.params.get(&param.name).unwrap_or(&Value::Null);
        let domain = location_of(action, &param.name);
        errors.extend(
            validate_with(value, param, media_types)
                .iter()
                .map(|f| ErrorDetail::from_validation(domain, f)),
        );
    }
    if let (Some(members), Some(payload), false) =
        (&action.payload, &bound.payload, bound.payload_failed)
    {
        errors.extend(
            validate_members(payload, members, media_types)
                .iter()
                .map(|f| ErrorDetail::from_validation("payload", f)),
        );
    }
    errors
}

fn location_of(action: &Action, name: &str) -> &'static str {
    if action.route.path_captures().any(|c| c == name) {
        "path"
    } else {
        "query"
    }
}

fn raw_values(
    action: &Action,
    param: &Attribute,
    path_params: &ParamVec,
    query_params: &ParamVec,
) -> (&'static str, Vec<String>) {
    if action.route.path_captures().any(|c| c == param.name) {
        let raw = path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == param.name)
            .map(|(_, v)| vec![v.clone()])
            .unwrap_or_default();
        return ("path", raw);
    }
    let key = action
        .route
        .query()
        .iter()
        .find(|q| q.name == param.name)
        .map(|q| q.key.as_str())
        .unwrap_or(param.name.as_str());
    let raw = query_params
        .iter()
        .filter(|(k, _)| k.as_ref() == key)
        .map(|(_, v)| v.clone())
        .collect();
    ("query", raw)
}

fn coerce_param(
    param: &Attribute,
    location: &'static str,
    raw: &[String],
) -> Result<Value, BindingError> {
    match &param.ty {
        AttributeType::Collection { items } => {
            let primitive = items.as_primitive().unwrap_or(Primitive::String);
            raw.iter()
                .flat_map(|r| r.split(','))
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .enumerate()
                .map(|(i, piece)| {
                    coerce_scalar(piece, primitive).ok_or_else(|| BindingError::Coercion {
                        name: format!("{}[{i}]", param.name),
                        location,
                        expected: primitive.to_string(),
                        raw: piece.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        ty => {
            let primitive = ty.as_primitive().unwrap_or(Primitive::String);
            // Last value wins for repeated scalar keys
            let last = raw.last().map(String::as_str).unwrap_or_default();
            coerce_scalar(last, primitive).ok_or_else(|| BindingError::Coercion {
                name: param.name.clone(),
                location,
                expected: primitive.to_string(),
                raw: last.to_string(),
            })
        }
    }
}

/// Coerce one raw string to the JSON shape of `primitive`.
pub fn coerce_scalar(raw: &str, primitive: Primitive) -> Option<Value> {
    match primitive {
        Primitive::Integer => raw.parse::<i64>().ok().map(Value::from),
        Primitive::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Primitive::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        Primitive::String | Primitive::DateTime | Primitive::Any => {
            Some(Value::String(raw.to_string()))
        }
    }
}
