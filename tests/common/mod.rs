//! Shared fixtures: a small task tracker API backed by an in-memory store.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use http::Method;
use mediaroute::blueprint::{Blueprint, FieldTable, FieldValue};
use mediaroute::design::{
    Action, ApiDefinition, Attribute, AttributeType, MediaType, Primitive, Resource, ResponseSpec,
};
use mediaroute::dispatcher::{Dispatcher, HandlerOutcome, IncomingRequest};
use mediaroute::error::HandlerError;
use mediaroute::runtime_config::RuntimeConfig;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const TASK: &str = "application/vnd.task+json";
pub const TASK_LIST: &str = "application/vnd.task-list+json";

#[derive(Debug, Clone)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub priority: i64,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

pub static TASK_FIELDS: LazyLock<FieldTable<Task>> = LazyLock::new(|| {
    FieldTable::<Task>::new()
        .field("id", |t| t.id.into())
        .field("title", |t| t.title.as_str().into())
        .field("priority", |t| t.priority.into())
        .field("done", |t| t.done.into())
        .field("created_at", |t| t.created_at.into())
});

impl Blueprint for Task {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        TASK_FIELDS.get(self, name)
    }
}

pub struct TaskList {
    pub items: Vec<Task>,
}

pub static LIST_FIELDS: LazyLock<FieldTable<TaskList>> = LazyLock::new(|| {
    FieldTable::<TaskList>::new()
        .field("count", |l| (l.items.len() as i64).into())
        .field("items", |l| FieldValue::nested_list(&l.items))
});

impl Blueprint for TaskList {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        LIST_FIELDS.get(self, name)
    }
}

/// In-memory task store; handlers capture it behind an `Arc<RwLock<..>>`.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: BTreeMap<i64, Task>,
    next_id: i64,
}

impl TaskStore {
    pub fn insert(&mut self, title: &str, priority: i64, done: bool) -> Task {
        self.next_id += 1;
        let task = Task {
            id: self.next_id,
            title: title.to_string(),
            priority,
            done,
            created_at: Utc
                .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
                .unwrap()
                + chrono::Duration::minutes(self.next_id),
        };
        self.tasks.insert(task.id, task.clone());
        task
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn update(&mut self, id: i64, title: &str, priority: i64) -> Option<Task> {
        let task = self.tasks.get_mut(&id)?;
        task.title = title.to_string();
        task.priority = priority;
        Some(task.clone())
    }

    pub fn remove(&mut self, id: i64) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn filter(&self, done: Option<bool>) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| done.map_or(true, |d| t.done == d))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

pub type SharedStore = Arc<RwLock<TaskStore>>;

/// A store seeded with two tasks (ids 1 and 2).
pub fn seeded_store() -> SharedStore {
    let mut store = TaskStore::default();
    store.insert("Write docs", 2, false);
    store.insert("Ship release", 1, true);
    Arc::new(RwLock::new(store))
}

pub fn task_api() -> ApiDefinition {
    let task = MediaType::builder(TASK)
        .attribute(Attribute::integer("id").required())
        .attribute(Attribute::string("title").required().min_length(1).max_length(80))
        .attribute(Attribute::integer("priority").minimum(1.0).maximum(5.0))
        .attribute(Attribute::boolean("done"))
        .attribute(Attribute::datetime("created_at"))
        .view("default", ["id", "title", "priority", "done", "created_at"])
        .view("tiny", ["id", "title"])
        .build()
        .unwrap();
    let list = MediaType::builder(TASK_LIST)
        .attribute(Attribute::integer("count"))
        .attribute(Attribute::collection("items", AttributeType::media_type(TASK)).view("tiny"))
        .view("default", ["count", "items"])
        .build()
        .unwrap();

    let tasks = Resource::builder("tasks")
        .prefix("/tasks")
        .media_type(TASK)
        .action(
            Action::builder("index")
                .get("?done={done}")
                .param(Attribute::boolean("done"))
                .response("ok", ResponseSpec::ok().media_type(TASK_LIST)),
        )
        .action(
            Action::builder("show")
                .get("/{id}")
                .param(Attribute::integer("id").required().minimum(1.0))
                .response("ok", ResponseSpec::ok())
                .response("notFound", ResponseSpec::not_found()),
        )
        .action(
            Action::builder("create")
                .post("")
                .payload(vec![
                    Attribute::string("title").required().min_length(1).max_length(80),
                    Attribute::integer("priority").required().minimum(1.0).maximum(5.0),
                    Attribute::boolean("done"),
                ])
                .response("created", ResponseSpec::created().location("/{id}")),
        )
        .action(
            Action::builder("update")
                .put("/{id}")
                .param(Attribute::integer("id").required().minimum(1.0))
                .payload(vec![
                    Attribute::string("title").required().min_length(1).max_length(80),
                    Attribute::integer("priority").required().minimum(1.0).maximum(5.0),
                ])
                .response("ok", ResponseSpec::ok())
                .response("notFound", ResponseSpec::not_found()),
        )
        .action(
            Action::builder("report")
                .get("/report")
                .timeout(Duration::from_millis(50))
                .response("ok", ResponseSpec::ok().media_type(TASK_LIST)),
        )
        .action(
            Action::builder("bulk_delete")
                .delete("/bulk?ids={ids}")
                .param(
                    Attribute::collection("ids", AttributeType::primitive(Primitive::Integer))
                        .required()
                        .min_length(1),
                )
                .multipart("ids")
                .response("multi", ResponseSpec::multipart(200))
                .response("deleted", ResponseSpec::no_content())
                .response("notFound", ResponseSpec::not_found()),
        )
        .build()
        .unwrap();

    ApiDefinition::builder("tasks")
        .version("1.0")
        .media_type(task)
        .media_type(list)
        .resource(tasks)
        .build()
        .unwrap()
}

/// Dispatcher for [`task_api`] with a handler for every action.
pub fn task_app(store: SharedStore) -> Dispatcher {
    let mut app = Dispatcher::with_config(Arc::new(task_api()), RuntimeConfig::default());

    let s = Arc::clone(&store);
    app.register("tasks.index", move |req| {
        let done = req.param("done").and_then(Value::as_bool);
        let items = s.read().filter(done);
        Ok(HandlerOutcome::new("ok").with_model(TaskList { items }))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("tasks.show", move |req| {
        let id = req.param_i64("id").unwrap_or_default();
        let task = s.read().get(id).cloned().ok_or_else(HandlerError::not_found)?;
        Ok(HandlerOutcome::new("ok").with_model(task))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("tasks.create", move |req| {
        let title = req.field("title").and_then(Value::as_str).unwrap_or_default();
        let priority = req.field("priority").and_then(Value::as_i64).unwrap_or(3);
        let done = req.field("done").and_then(Value::as_bool).unwrap_or(false);
        let task = s.write().insert(title, priority, done);
        Ok(HandlerOutcome::new("created")
            .with_id("id", task.id)
            .with_model(task))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("tasks.update", move |req| {
        let id = req.param_i64("id").unwrap_or_default();
        let title = req.field("title").and_then(Value::as_str).unwrap_or_default();
        let priority = req.field("priority").and_then(Value::as_i64).unwrap_or(3);
        let task = s
            .write()
            .update(id, title, priority)
            .ok_or_else(HandlerError::not_found)?;
        Ok(HandlerOutcome::new("ok").with_model(task))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register("tasks.report", move |_req| {
        let items = s.read().filter(Some(false));
        Ok(HandlerOutcome::new("ok").with_model(TaskList { items }))
    })
    .unwrap();

    let s = Arc::clone(&store);
    app.register_parts("tasks.bulk_delete", move |_req, id| {
        let id = id.as_i64().unwrap_or_default();
        match s.write().remove(id) {
            Some(_) => Ok(HandlerOutcome::new("deleted")),
            None => Err(HandlerError::not_found()),
        }
    })
    .unwrap();

    app.check_blueprint(TASK, &TASK_FIELDS).unwrap();
    app.check_blueprint(TASK_LIST, &LIST_FIELDS).unwrap();
    app
}

pub fn request(method: Method, target: &str) -> IncomingRequest {
    IncomingRequest::from_target(method, target)
}

/// Route test logs through the test writer. Safe to call from every test.
pub fn init_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("mediaroute=debug")
            .try_init(),
    );
}
