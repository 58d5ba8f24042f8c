//! # View Render Engine
//!
//! Renders a [`Blueprint`] through a media type view into a JSON object whose
//! keys follow the view's declared order. Output is deterministic: the same
//! instance rendered through the same view always yields the same bytes.
//!
//! Embedded media types recurse. The view used for an embedded value is, in
//! order of precedence:
//!
//! 1. the override on the enclosing view's field (`author` rendered `tiny`
//!    inside a `reader` view),
//! 2. the view declared on the attribute itself,
//! 3. the target media type's default view.
//!
//! Datetimes render as RFC 3339 strings in UTC.
//!
//! Every failure here is a programmer defect (a view that does not exist, a
//! blueprint missing a field), never a client error.

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use crate::blueprint::{Blueprint, FieldValue};
use crate::design::{AttributeType, MediaType, MediaTypes, Primitive, View};
use crate::error::RenderError;

/// Nesting limit guarding against blueprints that reference themselves.
pub const MAX_DEPTH: usize = 64;

pub struct Renderer<'a> {
    media_types: &'a MediaTypes,
}

impl<'a> Renderer<'a> {
    pub fn new(media_types: &'a MediaTypes) -> Self {
        Self { media_types }
    }

    /// Render `instance` through `view` of the media type `identifier`.
    pub fn render(
        &self,
        instance: &dyn Blueprint,
        identifier: &str,
        view: &str,
    ) -> Result<Map<String, Value>, RenderError> {
        let mt = self.lookup(identifier)?;
        let view = Self::select(mt, Some(view))?;
        self.render_object(instance, mt, view, 0)
    }

    /// Render through the media type's default view.
    pub fn render_default(
        &self,
        instance: &dyn Blueprint,
        identifier: &str,
    ) -> Result<Map<String, Value>, RenderError> {
        let mt = self.lookup(identifier)?;
        self.render_object(instance, mt, mt.default_view(), 0)
    }

    fn lookup(&self, identifier: &str) -> Result<&'a MediaType, RenderError> {
        self.media_types
            .get(identifier)
            .map(AsRef::as_ref)
            .ok_or_else(|| RenderError::UnknownMediaType(identifier.to_string()))
    }

    fn select<'m>(mt: &'m MediaType, view: Option<&str>) -> Result<&'m View, RenderError> {
        match view {
            None => Ok(mt.default_view()),
            Some(name) => mt.view(name).ok_or_else(|| RenderError::UnknownView {
                media_type: mt.identifier.clone(),
                view: name.to_string(),
            }),
        }
    }

    fn render_object(
        &self,
        instance: &dyn Blueprint,
        mt: &MediaType,
        view: &View,
        depth: usize,
    ) -> Result<Map<String, Value>, RenderError> {
        if depth > MAX_DEPTH {
            return Err(RenderError::DepthExceeded(MAX_DEPTH));
        }
        let mut out = Map::with_capacity(view.fields.len());
        for field in &view.fields {
            let missing = || RenderError::MissingField {
                media_type: mt.identifier.clone(),
                field: field.attribute.clone(),
            };
            let attr = mt.attribute(&field.attribute).ok_or_else(missing)?;
            let value = instance.field(&field.attribute).ok_or_else(missing)?;
            let nested_view = field.view.as_deref().or(attr.view.as_deref());
            let rendered = self.render_value(value, &attr.ty, nested_view, depth, mt, &attr.name)?;
            out.insert(attr.name.clone(), rendered);
        }
        Ok(out)
    }

    fn render_value(
        &self,
        value: FieldValue<'_>,
        ty: &AttributeType,
        nested_view: Option<&str>,
        depth: usize,
        owner: &MediaType,
        field: &str,
    ) -> Result<Value, RenderError> {
        let shape = |expected: String| RenderError::Shape {
            media_type: owner.identifier.clone(),
            field: field.to_string(),
            expected,
        };

        match (ty, value) {
            (_, FieldValue::Value(Value::Null)) => Ok(Value::Null),

            (AttributeType::Primitive { .. }, FieldValue::DateTime(dt)) => {
                Ok(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            }
            (AttributeType::Primitive { primitive }, FieldValue::Value(v)) => {
                let scalar = matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_));
                if scalar || *primitive == Primitive::Any {
                    Ok(v)
                } else {
                    Err(shape(primitive.to_string()))
                }
            }
            (AttributeType::Primitive { primitive }, _) => Err(shape(primitive.to_string())),

            (AttributeType::Composite { attributes }, FieldValue::Nested(b)) => {
                self.render_composite(b, attributes, depth, owner)
            }
            (AttributeType::Composite { attributes }, FieldValue::Value(v @ Value::Object(_))) => {
                self.render_composite(&v, attributes, depth, owner)
            }
            (AttributeType::Composite { .. }, _) => Err(shape("an object".to_string())),

            (AttributeType::Collection { items }, FieldValue::List(elements)) => elements
                .into_iter()
                .map(|e| self.render_value(e, items, nested_view, depth, owner, field))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (AttributeType::Collection { items }, FieldValue::Value(Value::Array(elements))) => {
                elements
                    .into_iter()
                    .map(|e| {
                        self.render_value(FieldValue::Value(e), items, nested_view, depth, owner, field)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            (AttributeType::Collection { .. }, _) => Err(shape("a list".to_string())),

            (AttributeType::MediaType { identifier }, FieldValue::Nested(b)) => {
                let target = self.lookup(identifier)?;
                let view = Self::select(target, nested_view)?;
                self.render_object(b, target, view, depth + 1).map(Value::Object)
            }
            (AttributeType::MediaType { identifier }, FieldValue::Value(v @ Value::Object(_))) => {
                let target = self.lookup(identifier)?;
                let view = Self::select(target, nested_view)?;
                self.render_object(&v, target, view, depth + 1).map(Value::Object)
            }
            (AttributeType::MediaType { identifier }, _) => {
                Err(shape(format!("an embedded {identifier}")))
            }
        }
    }

    /// Composites render every member in declaration order.
    fn render_composite(
        &self,
        instance: &dyn Blueprint,
        attributes: &[crate::design::Attribute],
        depth: usize,
        owner: &MediaType,
    ) -> Result<Value, RenderError> {
        if depth > MAX_DEPTH {
            return Err(RenderError::DepthExceeded(MAX_DEPTH));
        }
        let mut out = Map::with_capacity(attributes.len());
        for attr in attributes {
            let value = instance
                .field(&attr.name)
                .ok_or_else(|| RenderError::MissingField {
                    media_type: owner.identifier.clone(),
                    field: attr.name.clone(),
                })?;
            let rendered =
                self.render_value(value, &attr.ty, attr.view.as_deref(), depth + 1, owner, &attr.name)?;
            out.insert(attr.name.clone(), rendered);
        }
        Ok(Value::Object(out))
    }
}
