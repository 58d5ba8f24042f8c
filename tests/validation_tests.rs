//! Constraint checks as clients see them, using the blog demo definitions.

mod common;

use common::request;
use http::Method;
use mediaroute::design::{load_dir, ApiDefinition};
use mediaroute::dispatcher::{Dispatcher, HandlerOutcome};
use mediaroute::runtime_config::RuntimeConfig;
use mediaroute::validator::{validate, validate_with};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const POST: &str = "application/vnd.blog.post+json";

fn blog() -> ApiDefinition {
    load_dir(&Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/blog")).unwrap()
}

fn blog_app() -> Dispatcher {
    let mut app = Dispatcher::with_config(Arc::new(blog()), RuntimeConfig::default());
    app.register("posts.create", |req| {
        let title = req.field("title").cloned().unwrap_or(Value::Null);
        Ok(HandlerOutcome::new("created")
            .with_id("id", 1)
            .with_body(json!({"id": 1, "title": title})))
    })
    .unwrap();
    app.register("posts.index", |_req| {
        Ok(HandlerOutcome::new("ok").with_body(json!({"count": 0, "items": []})))
    })
    .unwrap();
    app
}

fn reasons(body: &Value) -> Vec<(&str, &str)> {
    body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["domain"].as_str().unwrap(), e["reason"].as_str().unwrap()))
        .collect()
}

#[test]
fn test_min_length_boundary() {
    let app = blog_app();
    let resp = app.dispatch(
        request(Method::POST, "/posts").with_json(&json!({"title": "ab", "body": "x"})),
    );
    assert_eq!(resp.status, 400);
    assert_eq!(reasons(&resp.body.unwrap()), vec![("payload", "minLength")]);

    let resp = app.dispatch(
        request(Method::POST, "/posts").with_json(&json!({"title": "abc", "body": "x"})),
    );
    assert_eq!(resp.status, 201);
}

#[test]
fn test_every_payload_failure_is_reported() {
    let app = blog_app();
    let tags: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
    let resp = app.dispatch(
        request(Method::POST, "/posts").with_json(&json!({"title": "ab", "tags": tags})),
    );
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    assert_eq!(body["code"], 400);
    assert_eq!(
        reasons(&body),
        vec![
            ("payload", "minLength"),
            ("payload", "required"),
            ("payload", "maxLength"),
        ]
    );
    assert!(body["errors"][1]["message"].as_str().unwrap().starts_with("body"));
}

#[test]
fn test_query_bounds_are_inclusive() {
    let app = blog_app();
    assert_eq!(app.dispatch(request(Method::GET, "/posts?limit=1")).status, 200);
    assert_eq!(app.dispatch(request(Method::GET, "/posts?limit=100")).status, 200);

    let resp = app.dispatch(request(Method::GET, "/posts?limit=0"));
    assert_eq!(resp.status, 400);
    assert_eq!(reasons(&resp.body.unwrap()), vec![("query", "minimum")]);

    let resp = app.dispatch(request(Method::GET, "/posts?limit=101"));
    assert_eq!(reasons(&resp.body.unwrap()), vec![("query", "maximum")]);
}

#[test]
fn test_coercion_failure_names_the_parameter() {
    let app = blog_app();
    let resp = app.dispatch(request(Method::GET, "/posts?limit=ten"));
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    assert_eq!(reasons(&body), vec![("query", "type")]);
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("limit"));
}

#[test]
fn test_embedded_media_types_are_validated_through_the_registry() {
    let api = blog();
    let author = api
        .media_type(POST)
        .and_then(|mt| mt.attribute("author"))
        .unwrap();
    let doc = json!({"id": 1, "name": "Ada", "email": "not-an-address"});

    let failures = validate_with(&doc, author, api.media_types());
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "author.email");
    assert_eq!(failures[0].constraint, "pattern");

    // Without a lookup only the object shape is checked
    assert!(validate(&doc, author).is_empty());
}

#[test]
fn test_enumerations_are_exact() {
    let api = blog();
    let status = api
        .media_type(POST)
        .and_then(|mt| mt.attribute("status"))
        .unwrap();
    assert!(validate(&json!("draft"), status).is_empty());
    let failures = validate(&json!("Draft"), status);
    assert_eq!(failures[0].constraint, "enum");
}
