//! The hello demo, loaded from `demos/hello`, served end to end.

mod common;

use common::{init_tracing, request};
use http::Method;
use mediaroute::design::load_dir;
use mediaroute::dispatcher::{Dispatcher, HandlerOutcome};
use mediaroute::error::HandlerError;
use mediaroute::runtime_config::RuntimeConfig;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

type Greetings = Arc<RwLock<BTreeMap<i64, String>>>;

fn greeting(id: i64, text: &str) -> Value {
    json!({ "id": id, "text": text })
}

fn hello_app(store: Greetings) -> Dispatcher {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/hello");
    let api = load_dir(&dir).unwrap();
    let mut app = Dispatcher::with_config(Arc::new(api), RuntimeConfig::default());

    let s = Arc::clone(&store);
    app.register("hello.show", move |req| {
        let id = req.param_i64("id").unwrap_or_default();
        let text = s.read().get(&id).cloned().ok_or_else(HandlerError::not_found)?;
        Ok(HandlerOutcome::new("ok").with_body(greeting(id, &text)))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("hello.create", move |req| {
        let text = req.field("text").and_then(Value::as_str).unwrap_or_default();
        let mut greetings = s.write();
        let id = greetings.keys().next_back().copied().unwrap_or(0) + 1;
        greetings.insert(id, text.to_string());
        Ok(HandlerOutcome::new("created")
            .with_id("id", id)
            .with_body(greeting(id, text)))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("hello.delete", move |req| {
        let id = req.param_i64("id").unwrap_or_default();
        match s.write().remove(&id) {
            Some(_) => Ok(HandlerOutcome::new("deleted")),
            None => Err(HandlerError::not_found()),
        }
    })
    .unwrap();

    app.check_handlers().unwrap();
    app
}

fn store() -> Greetings {
    Arc::new(RwLock::new(BTreeMap::from([(1, "Hello world!".to_string())])))
}

#[test]
fn test_show_hello_world() {
    init_tracing();
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::GET, "/hello/1"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_bytes(), br#"{"id":1,"text":"Hello world!"}"#.to_vec());
    assert_eq!(
        resp.get_header("content-type"),
        Some("application/vnd.hello+json")
    );
}

#[test]
fn test_tiny_view() {
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::GET, "/hello/1?view=tiny"));
    assert_eq!(resp.body, Some(json!({"id": 1})));
}

#[test]
fn test_create_then_show() {
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::POST, "/hello").with_json(&json!({"text": "Hi there"})));
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("location"), Some("/hello/2"));

    let resp = app.dispatch(request(Method::GET, "/hello/2"));
    assert_eq!(resp.body, Some(greeting(2, "Hi there")));
}

#[test]
fn test_create_rejects_empty_text() {
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::POST, "/hello").with_json(&json!({"text": ""})));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.unwrap()["errors"][0]["reason"], "minLength");
}

#[test]
fn test_delete_then_not_found() {
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::DELETE, "/hello/1"));
    assert_eq!(resp.status, 204);
    assert_eq!(resp.body, None);
    assert!(resp.body_bytes().is_empty());

    let resp = app.dispatch(request(Method::GET, "/hello/1"));
    assert_eq!(resp.status, 404);
}

#[test]
fn test_unsupported_method() {
    let app = hello_app(store());
    let resp = app.dispatch(request(Method::PUT, "/hello/1"));
    assert_eq!(resp.status, 405);
    assert_eq!(resp.get_header("allow"), Some("DELETE, GET"));
}
