//! Multipart actions: one handler call per identifier, one entry per part.

mod common;

use common::{request, seeded_store, task_api, task_app};
use http::Method;
use mediaroute::dispatcher::{Dispatcher, HandlerOutcome};
use mediaroute::error::HandlerError;
use mediaroute::runtime_config::RuntimeConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn statuses(body: &Value) -> Vec<(&str, u64)> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|part| (part["id"].as_str().unwrap(), part["status"].as_u64().unwrap()))
        .collect()
}

#[test]
fn test_bulk_delete_reports_each_part() {
    let store = seeded_store();
    let app = task_app(Arc::clone(&store));
    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk?ids=1,2,999"));
    assert_eq!(resp.status, 200);
    let body = resp.body.unwrap();
    assert_eq!(statuses(&body), vec![("1", 204), ("2", 204), ("999", 404)]);
    assert_eq!(body[0]["body"], Value::Null);
    assert_eq!(body[2]["body"]["code"], 404);
    assert_eq!(store.read().len(), 0);
}

#[test]
fn test_repeated_keys_keep_input_order() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk?ids=999&ids=2&ids=1"));
    assert_eq!(
        statuses(&resp.body.unwrap()),
        vec![("999", 404), ("2", 204), ("1", 204)]
    );
}

#[test]
fn test_invalid_identifier_rejects_the_whole_request() {
    let store = seeded_store();
    let app = task_app(Arc::clone(&store));
    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk?ids=1,two"));
    assert_eq!(resp.status, 400);
    let body = resp.body.unwrap();
    assert_eq!(body["errors"][0]["reason"], "type");
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("ids[1]"));
    assert_eq!(store.read().len(), 2);
}

#[test]
fn test_missing_identifiers_are_required() {
    let app = task_app(seeded_store());
    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk"));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.unwrap()["errors"][0]["reason"], "required");
}

#[test]
fn test_failing_parts_do_not_affect_others() {
    let mut app = Dispatcher::with_config(Arc::new(task_api()), RuntimeConfig::default());
    app.register_parts("tasks.bulk_delete", |_req, id| match id.as_i64() {
        Some(1) => panic!("part exploded"),
        Some(3) => Err(HandlerError::not_found()),
        _ => Ok(HandlerOutcome::new("deleted")),
    })
    .unwrap();

    // Parts run concurrently and share one deadline
    let config = RuntimeConfig {
        default_timeout: Some(Duration::from_millis(100)),
        ..RuntimeConfig::default()
    };
    let mut timed = Dispatcher::with_config(Arc::new(task_api()), config);
    timed
        .register_parts("tasks.bulk_delete", |_req, id| {
            if id.as_i64() == Some(2) {
                may::coroutine::sleep(Duration::from_millis(500));
            }
            Ok(HandlerOutcome::new("deleted"))
        })
        .unwrap();

    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk?ids=1,3,4"));
    assert_eq!(resp.status, 200);
    assert_eq!(
        statuses(&resp.body.unwrap()),
        vec![("1", 500), ("3", 404), ("4", 204)]
    );

    let resp = timed.dispatch(request(Method::DELETE, "/tasks/bulk?ids=1,2,4"));
    assert_eq!(resp.status, 200);
    assert_eq!(
        statuses(&resp.body.unwrap()),
        vec![("1", 204), ("2", 504), ("4", 204)]
    );
}

#[test]
fn test_timed_out_part_does_not_delete() {
    let store = seeded_store();
    let config = RuntimeConfig {
        default_timeout: Some(Duration::from_millis(50)),
        ..RuntimeConfig::default()
    };
    let mut app = Dispatcher::with_config(Arc::new(task_api()), config);
    let s = Arc::clone(&store);
    app.register_parts("tasks.bulk_delete", move |_req, id| {
        let id = id.as_i64().unwrap_or_default();
        if id == 2 {
            may::coroutine::sleep(Duration::from_millis(200));
        }
        s.write().remove(id).ok_or_else(HandlerError::not_found)?;
        Ok(HandlerOutcome::new("deleted"))
    })
    .unwrap();

    let resp = app.dispatch(request(Method::DELETE, "/tasks/bulk?ids=1,2"));
    assert_eq!(statuses(&resp.body.unwrap()), vec![("1", 204), ("2", 504)]);

    std::thread::sleep(Duration::from_millis(400));
    let store = store.read();
    assert!(store.get(1).is_none());
    assert!(store.get(2).is_some());
}
