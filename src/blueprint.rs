//! # Blueprints
//!
//! A blueprint is the native data structure behind a media type. Instead of
//! reflecting over struct fields, every blueprint exposes its fields through an
//! explicit name → accessor table. The accessors are ordinary typed functions,
//! so a renamed or retyped struct field breaks the build, and
//! [`Dispatcher::check_blueprint`](crate::dispatcher::Dispatcher::check_blueprint)
//! verifies at startup, through [`FieldTable::check`], that every attribute a
//! media type's views reference has an accessor.
//!
//! ```rust
//! use mediaroute::blueprint::{Blueprint, FieldTable, FieldValue};
//! use std::sync::LazyLock;
//!
//! struct Greeting {
//!     id: i64,
//!     text: String,
//! }
//!
//! static GREETING: LazyLock<FieldTable<Greeting>> = LazyLock::new(|| {
//!     FieldTable::<Greeting>::new()
//!         .field("id", |g| g.id.into())
//!         .field("text", |g| g.text.as_str().into())
//! });
//!
//! impl Blueprint for Greeting {
//!     fn field(&self, name: &str) -> Option<FieldValue<'_>> {
//!         GREETING.get(self, name)
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use crate::design::MediaType;
use crate::error::{DefinitionError, DefinitionIssue};

/// Native data exposed field by field to the render engine.
pub trait Blueprint: Send + Sync {
    /// Value of `name`, or `None` when the blueprint has no such field.
    ///
    /// `None` is a programmer defect surfaced as a render error; a field that
    /// exists but is empty should return `FieldValue::Value(Value::Null)`.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// A single field read from a blueprint.
pub enum FieldValue<'a> {
    /// Plain JSON (scalars, or whole objects/arrays for JSON-backed data)
    Value(Value),
    DateTime(DateTime<Utc>),
    /// Another blueprint, rendered through a nested media type or composite
    Nested(&'a dyn Blueprint),
    List(Vec<FieldValue<'a>>),
}

impl<'a> FieldValue<'a> {
    pub fn null() -> Self {
        FieldValue::Value(Value::Null)
    }

    pub fn nested<B: Blueprint>(b: &'a B) -> Self {
        FieldValue::Nested(b)
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue<'a>>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn nested_list<B: Blueprint>(items: &'a [B]) -> Self {
        FieldValue::List(items.iter().map(|b| FieldValue::Nested(b)).collect())
    }
}

impl fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldValue::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
            FieldValue::Nested(_) => f.write_str("Nested(..)"),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

macro_rules! field_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue<'_> {
                fn from(v: $ty) -> Self {
                    FieldValue::Value(Value::from(v))
                }
            }
        )*
    };
}

field_value_from!(i32, i64, u32, u64, f64, bool, String);

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(v: &'a str) -> Self {
        FieldValue::Value(Value::from(v))
    }
}

impl From<Value> for FieldValue<'_> {
    fn from(v: Value) -> Self {
        FieldValue::Value(v)
    }
}

impl From<DateTime<Utc>> for FieldValue<'_> {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::DateTime(v)
    }
}

impl<'a, T: Into<FieldValue<'a>>> From<Option<T>> for FieldValue<'a> {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_else(FieldValue::null)
    }
}

/// JSON objects are blueprints whose fields are their keys. A JSON object has
/// no schema, so an absent key reads as `null` rather than as a defect.
impl Blueprint for Value {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match self {
            Value::Object(map) => Some(FieldValue::Value(
                map.get(name).cloned().unwrap_or(Value::Null),
            )),
            _ => None,
        }
    }
}

/// Accessor reading one field from a `T`.
pub type Accessor<T> = for<'a> fn(&'a T) -> FieldValue<'a>;

/// Explicit name → accessor mapping for a blueprint type.
pub struct FieldTable<T: 'static> {
    entries: Vec<(&'static str, Accessor<T>)>,
}

impl<T: 'static> Default for FieldTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> FieldTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register the accessor for `name`. A later registration for the same
    /// name replaces the earlier one.
    pub fn field(mut self, name: &'static str, accessor: Accessor<T>) -> Self {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, accessor));
        self
    }

    pub fn get<'a>(&self, instance: &'a T, name: &str) -> Option<FieldValue<'a>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, accessor)| accessor(instance))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// Verify that every attribute referenced by any view of `media_type` has
    /// an accessor.
    pub fn check(&self, media_type: &MediaType) -> Result<(), DefinitionError> {
        let mut issues = Vec::new();
        for view in media_type.views() {
            for field in &view.fields {
                if !self.entries.iter().any(|(n, _)| *n == field.attribute) {
                    issues.push(DefinitionIssue::new(
                        format!(
                            "media_type:{}/view:{}",
                            media_type.identifier, view.name
                        ),
                        "missing_accessor",
                        format!(
                            "blueprint {} has no accessor for attribute `{}`",
                            std::any::type_name::<T>(),
                            field.attribute
                        ),
                    ));
                }
            }
        }
        issues.dedup();
        DefinitionError::check(issues)
    }
}

/// Body returned by a handler: either a blueprint to render through the
/// response's media type, or raw JSON.
pub enum Body {
    Model(Box<dyn Blueprint>),
    Json(Value),
}

impl Body {
    pub fn model<B: Blueprint + 'static>(b: B) -> Self {
        Body::Model(Box::new(b))
    }

    /// View the body as a blueprint for rendering.
    pub fn as_blueprint(&self) -> &dyn Blueprint {
        match self {
            Body::Model(b) => b.as_ref(),
            Body::Json(v) => v,
        }
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Json(v)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Model(_) => f.write_str("Model(..)"),
            Body::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}
