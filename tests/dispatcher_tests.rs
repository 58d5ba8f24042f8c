//! Tests for the request dispatcher
//!
//! # Test Coverage
//!
//! - Routing to registered handlers and response rendering
//! - Aggregated 400s for binding and validation failures
//! - 404 / 405 with `Allow`
//! - Undeclared response keys, panics and timeouts
//! - Handler registration checks
//! - Request id propagation

mod common;

use common::{init_tracing, request, seeded_store, task_api, task_app, Task, TASK};
use http::Method;
use mediaroute::blueprint::FieldTable;
use mediaroute::design::{Action, ApiDefinition, Attribute, MediaType, Resource, ResponseSpec};
use mediaroute::dispatcher::{Dispatcher, HandlerOutcome, IncomingRequest};
use mediaroute::ids::REQUEST_ID_HEADER;
use mediaroute::runtime_config::RuntimeConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn bare_app() -> Dispatcher {
    Dispatcher::with_config(Arc::new(task_api()), RuntimeConfig::default())
}

#[test]
fn test_show_renders_default_view() {
    init_tracing();
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks/1"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some(TASK));
    assert_eq!(
        resp.body,
        Some(json!({
            "id": 1,
            "title": "Write docs",
            "priority": 2,
            "done": false,
            "created_at": "2024-01-01T12:01:00Z"
        }))
    );
    let keys: Vec<_> = resp.body.unwrap().as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["id", "title", "priority", "done", "created_at"]);
}

#[test]
fn test_requested_view_is_used() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks/2?view=tiny"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, Some(json!({"id": 2, "title": "Ship release"})));
}

#[test]
fn test_unknown_view_is_a_client_error() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks/2?view=everything"));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.unwrap()["errors"][0]["reason"], "unknownView");
}

#[test]
fn test_collection_renders_nested_views() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks?done=false"));
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        Some(json!({"count": 1, "items": [{"id": 1, "title": "Write docs"}]}))
    );
}

#[test]
fn test_missing_resource_is_not_found() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks/42"));
    assert_eq!(resp.status, 404);
    let body = resp.body.unwrap();
    assert_eq!(body["code"], 404);
    assert_eq!(body["errors"][0]["domain"], "handler");
    assert_eq!(body["errors"][0]["reason"], "notFound");
}

#[test]
fn test_create_returns_location() {
    let store = seeded_store();
    let app = task_app(Arc::clone(&store));
    let resp = app.dispatch(
        request(Method::POST, "/tasks").with_json(&json!({"title": "Review PR", "priority": 4})),
    );
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("location"), Some("/tasks/3"));
    assert_eq!(resp.body.as_ref().unwrap()["title"], "Review PR");
    assert_eq!(store.read().len(), 3);
}

#[test]
fn test_payload_missing_two_required_attributes() {
    let store = seeded_store();
    let app = task_app(Arc::clone(&store));
    let resp = app.dispatch(request(Method::POST, "/tasks").with_json(&json!({"done": true})));
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    for (error, field) in errors.iter().zip(["title", "priority"]) {
        assert_eq!(error["domain"], "payload");
        assert_eq!(error["reason"], "required");
        assert!(error["message"].as_str().unwrap().starts_with(field));
    }
    // The handler never ran
    assert_eq!(store.read().len(), 2);
}

#[test]
fn test_path_param_failures() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/tasks/0"));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.unwrap()["errors"][0]["reason"], "minimum");

    let resp = app.dispatch(request(Method::GET, "/tasks/abc"));
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    assert_eq!(body["errors"][0]["domain"], "path");
    assert_eq!(body["errors"][0]["reason"], "type");
}

#[test]
fn test_path_and_payload_failures_in_one_response() {
    let store = seeded_store();
    let app = task_app(Arc::clone(&store));
    let resp = app.dispatch(
        request(Method::PUT, "/tasks/abc").with_json(&json!({"priority": 9})),
    );
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    let errors: Vec<(&str, &str)> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["domain"].as_str().unwrap(), e["reason"].as_str().unwrap()))
        .collect();
    assert_eq!(
        errors,
        vec![("path", "type"), ("payload", "required"), ("payload", "maximum")]
    );

    // Nothing was changed
    assert_eq!(store.read().get(1).unwrap().title, "Write docs");

    let resp = app.dispatch(
        request(Method::PUT, "/tasks/1").with_json(&json!({"title": "Write more docs", "priority": 5})),
    );
    assert_eq!(resp.status, 200);
    assert_eq!(store.read().get(1).unwrap().priority, 5);
}

#[test]
fn test_malformed_body() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::POST, "/tasks").with_body("{title"));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.unwrap()["errors"][0]["reason"], "malformedBody");
}

#[test]
fn test_method_not_allowed_lists_methods() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::PATCH, "/tasks"));
    assert_eq!(resp.status, 405);
    assert_eq!(resp.get_header("allow"), Some("GET, POST"));
}

#[test]
fn test_unknown_path_is_not_found() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::GET, "/projects"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body.unwrap()["errors"][0]["domain"], "routing");
}

#[test]
fn test_undeclared_response_key_is_internal_error() {
    let mut app = bare_app();
    app.register("tasks.show", |_req| Ok(HandlerOutcome::new("teapot")))
        .unwrap();
    let resp = app.dispatch(request(Method::GET, "/tasks/1"));
    assert_eq!(resp.status, 500);
    let body = resp.body.unwrap();
    assert_eq!(body["message"], "internal server error");
    assert!(!body.to_string().contains("teapot"));
}

#[test]
fn test_panic_becomes_internal_error() {
    init_tracing();
    let mut app = bare_app();
    app.register("tasks.show", |_req| panic!("store exploded"))
        .unwrap();
    let resp = app.dispatch(request(Method::GET, "/tasks/1"));
    assert_eq!(resp.status, 500);
    assert!(!resp.body.unwrap().to_string().contains("store exploded"));
}

#[test]
fn test_debug_errors_include_the_diagnostic() {
    let config = RuntimeConfig {
        debug_errors: true,
        ..RuntimeConfig::default()
    };
    let mut app = Dispatcher::with_config(Arc::new(task_api()), config);
    app.register("tasks.show", |_req| panic!("store exploded"))
        .unwrap();
    let resp = app.dispatch(request(Method::GET, "/tasks/1"));
    assert_eq!(resp.status, 500);
    assert!(resp.body.unwrap().to_string().contains("store exploded"));
}

#[test]
fn test_timeout_becomes_gateway_timeout() {
    let mut app = bare_app();
    app.register("tasks.report", |_req| {
        may::coroutine::sleep(Duration::from_millis(500));
        Ok(HandlerOutcome::new("ok"))
    })
    .unwrap();
    let resp = app.dispatch(request(Method::GET, "/tasks/report"));
    assert_eq!(resp.status, 504);
}

#[test]
fn test_timed_out_handler_never_finishes_its_work() {
    let store = seeded_store();
    let s = Arc::clone(&store);
    let mut app = bare_app();
    app.register("tasks.report", move |_req| {
        may::coroutine::sleep(Duration::from_millis(200));
        s.write().remove(1);
        Ok(HandlerOutcome::new("ok"))
    })
    .unwrap();
    assert_eq!(app.dispatch(request(Method::GET, "/tasks/report")).status, 504);

    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(store.read().len(), 2);
}

#[test]
fn test_default_timeout_applies_without_action_timeout() {
    let config = RuntimeConfig {
        default_timeout: Some(Duration::from_millis(30)),
        ..RuntimeConfig::default()
    };
    let mut app = Dispatcher::with_config(Arc::new(task_api()), config);
    app.register("tasks.show", |_req| {
        may::coroutine::sleep(Duration::from_millis(500));
        Ok(HandlerOutcome::new("ok"))
    })
    .unwrap();
    assert_eq!(app.dispatch(request(Method::GET, "/tasks/1")).status, 504);
}

#[test]
fn test_missing_handler_is_internal_error() {
    let app = bare_app();
    let resp = app.dispatch(request(Method::GET, "/tasks/1"));
    assert_eq!(resp.status, 500);
}

#[test]
fn test_registration_is_checked_against_the_definition() {
    let mut app = bare_app();
    let err = app
        .register("tasks.archive", |_req| Ok(HandlerOutcome::new("ok")))
        .unwrap_err();
    assert_eq!(err.issues[0].kind, "unknown_action");

    let err = app
        .register("tasks.bulk_delete", |_req| Ok(HandlerOutcome::new("deleted")))
        .unwrap_err();
    assert_eq!(err.issues[0].kind, "handler_kind");

    let err = app.check_handlers().unwrap_err();
    assert_eq!(err.issues.len(), 6);
    assert!(err.issues.iter().all(|i| i.kind == "missing_handler"));

    assert!(task_app(seeded_store()).check_handlers().is_ok());
}

#[test]
fn test_blueprints_are_checked_against_views() {
    let app = bare_app();
    assert!(app.check_blueprint(TASK, &common::TASK_FIELDS).is_ok());

    let partial = FieldTable::<Task>::new()
        .field("id", |t| t.id.into())
        .field("title", |t| t.title.as_str().into());
    let err = app.check_blueprint(TASK, &partial).unwrap_err();
    let missing: Vec<_> = err.issues.iter().map(|i| i.kind.as_str()).collect();
    assert_eq!(missing, vec!["missing_accessor"; 3]);
    assert!(err.issues[0].message.contains("`priority`"));

    let err = app
        .check_blueprint("application/vnd.nope+json", &partial)
        .unwrap_err();
    assert_eq!(err.issues[0].kind, "unknown_media_type");
}

#[test]
fn test_request_id_is_echoed() {
    let app = task_app(seeded_store());
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let resp = app.dispatch(
        IncomingRequest::new(Method::GET, "/tasks/1").with_header("X-Request-Id", id),
    );
    assert_eq!(resp.get_header(REQUEST_ID_HEADER), Some(id));

    let resp = app.dispatch(request(Method::GET, "/nowhere"));
    assert!(resp.get_header(REQUEST_ID_HEADER).is_some());
}

fn comments_api() -> ApiDefinition {
    let comment = MediaType::builder("application/vnd.comment+json")
        .attribute(Attribute::integer("id"))
        .attribute(Attribute::string("text"))
        .view("default", ["id", "text"])
        .build()
        .unwrap();
    let comments = Resource::builder("comments")
        .prefix("/posts/{post_id}/comments")
        .media_type("application/vnd.comment+json")
        .action(
            Action::builder("create")
                .post("")
                .param(Attribute::integer("post_id").required())
                .payload(vec![Attribute::string("text").required()])
                .response("created", ResponseSpec::created().location("/{id}")),
        )
        .action(
            Action::builder("reply")
                .post("/{id}/replies")
                .param(Attribute::integer("post_id").required())
                .param(Attribute::integer("id").required())
                .response(
                    "created",
                    ResponseSpec::created().location("/posts/{post_id}/comments/{reply_id}"),
                ),
        )
        .build()
        .unwrap();
    ApiDefinition::builder("comments")
        .media_type(comment)
        .resource(comments)
        .build()
        .unwrap()
}

#[test]
fn test_location_fills_captures_from_the_prefix() {
    let mut app = Dispatcher::with_config(Arc::new(comments_api()), RuntimeConfig::default());
    app.register("comments.create", |req| {
        let text = req.field("text").cloned().unwrap_or_default();
        Ok(HandlerOutcome::new("created")
            .with_id("id", 9)
            .with_body(json!({"id": 9, "text": text})))
    })
    .unwrap();
    app.register("comments.reply", |_req| {
        Ok(HandlerOutcome::new("created").with_id("reply_id", 12))
    })
    .unwrap();

    let resp = app.dispatch(
        request(Method::POST, "/posts/4/comments").with_json(&json!({"text": "first"})),
    );
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("location"), Some("/posts/4/comments/9"));

    // A template that already spells out the prefix is not prefixed again
    let resp = app.dispatch(request(Method::POST, "/posts/4/comments/9/replies"));
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("location"), Some("/posts/4/comments/12"));
}
