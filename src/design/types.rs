use serde::Serialize;
use std::fmt;

use super::attribute::Attribute;

/// Scalar kinds an attribute can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String,
    Integer,
    Float,
    Boolean,
    /// ISO-8601 / RFC 3339 timestamp, carried as a string on the wire
    DateTime,
    /// Opaque JSON, passed through untouched
    Any,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Boolean => "boolean",
            Primitive::DateTime => "datetime",
            Primitive::Any => "any",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of an [`Attribute`].
///
/// Composite attributes keep their members in declaration order; that order is
/// what the render engine and the generated artifacts use.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeType {
    Primitive { primitive: Primitive },
    Composite { attributes: Vec<Attribute> },
    Collection { items: Box<AttributeType> },
    /// Reference to a media type by identifier, resolved through the registry
    MediaType { identifier: String },
}

impl AttributeType {
    pub fn primitive(p: Primitive) -> Self {
        AttributeType::Primitive { primitive: p }
    }

    pub fn composite(attributes: Vec<Attribute>) -> Self {
        AttributeType::Composite { attributes }
    }

    pub fn collection(items: AttributeType) -> Self {
        AttributeType::Collection {
            items: Box::new(items),
        }
    }

    pub fn media_type(identifier: impl Into<String>) -> Self {
        AttributeType::MediaType {
            identifier: identifier.into(),
        }
    }

    /// Short name used in diagnostics and error bodies.
    pub fn describe(&self) -> String {
        match self {
            AttributeType::Primitive { primitive } => primitive.as_str().to_string(),
            AttributeType::Composite { .. } => "object".to_string(),
            AttributeType::Collection { items } => format!("array<{}>", items.describe()),
            AttributeType::MediaType { identifier } => identifier.clone(),
        }
    }

    /// Returns the primitive if this type is a scalar.
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            AttributeType::Primitive { primitive } => Some(*primitive),
            _ => None,
        }
    }
}
