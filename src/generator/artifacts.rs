use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::design::{Action, ApiDefinition, Attribute, ResponseSpec};
use crate::router::Router;

/// A rendered artifact waiting to be written.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: &'static str,
    pub contents: String,
}

#[derive(Serialize)]
struct RouteRow<'a> {
    method: &'a str,
    template: String,
    path: &'a str,
    query: Vec<Value>,
    handler: &'a str,
    resource: &'a str,
    action: &'a str,
    literal_segments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multipart: Option<&'a str>,
    responses: Map<String, Value>,
}

fn responses(action: &Action) -> Map<String, Value> {
    action
        .responses
        .iter()
        .map(|(key, spec)| (key.clone(), response_value(spec)))
        .collect()
}

fn response_value(spec: &ResponseSpec) -> Value {
    serde_json::to_value(spec).unwrap_or(Value::Null)
}

/// The routing table, one row per action in declaration order.
pub fn routes_json(api: &ApiDefinition, router: &Router) -> serde_json::Result<String> {
    let rows: Vec<RouteRow<'_>> = router
        .entries()
        .iter()
        .map(|entry| {
            let action = &entry.action;
            RouteRow {
                method: action.method.as_str(),
                template: action.route.to_string(),
                path: action.route.path(),
                query: action
                    .route
                    .query()
                    .iter()
                    .map(|q| json!({ "key": q.key, "param": q.name }))
                    .collect(),
                handler: &entry.handler_name,
                resource: &entry.resource.name,
                action: &action.name,
                literal_segments: action.route.literal_count(),
                timeout_ms: action.timeout.map(|t| t.as_millis() as u64),
                multipart: action.multipart.as_deref(),
                responses: responses(action),
            }
        })
        .collect();

    serde_json::to_string_pretty(&json!({
        "api": api.name,
        "version": api.version,
        "routes": rows,
    }))
}

#[derive(Serialize)]
struct ValidatorRow<'a> {
    params: &'a [Attribute],
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a [Attribute]>,
}

/// Parameter and payload constraints keyed by handler name.
pub fn validators_json(api: &ApiDefinition) -> serde_json::Result<String> {
    let mut table = Map::new();
    for entry in api.routes() {
        let row = ValidatorRow {
            params: &entry.action.params,
            payload: entry.action.payload.as_deref(),
        };
        table.insert(entry.handler_name.to_string(), serde_json::to_value(row)?);
    }
    serde_json::to_string_pretty(&Value::Object(table))
}

pub fn media_types_json(api: &ApiDefinition) -> serde_json::Result<String> {
    serde_json::to_string_pretty(api.media_types())
}
