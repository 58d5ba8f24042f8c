use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::types::{AttributeType, Primitive};

/// A regular expression constraint.
///
/// The source is kept verbatim for artifacts and diagnostics; matching is done
/// against an anchored compilation so that only full matches pass. A source
/// that fails to compile leaves `compiled` empty and is reported when the
/// definition is validated.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    compiled: Option<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&format!("^(?:{source})$")).ok();
        Self { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    /// Full-match test. An invalid pattern never matches.
    pub fn is_full_match(&self, value: &str) -> bool {
        self.compiled
            .as_ref()
            .map(|re| re.is_match(value))
            .unwrap_or(false)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Declarative predicates attached to an attribute.
///
/// Bounds are inclusive. `min_length`/`max_length` count characters for
/// strings and elements for collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

/// A typed, validated, named field.
///
/// Built with the chained constructors:
///
/// ```rust
/// use mediaroute::design::Attribute;
///
/// let title = Attribute::string("title").required().min_length(3).max_length(80);
/// assert!(title.constraints.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// View used when this attribute embeds another media type and the
    /// enclosing view does not override it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            constraints: Constraints::default(),
            description: None,
            view: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::String))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::Integer))
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::Float))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::Boolean))
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::DateTime))
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::primitive(Primitive::Any))
    }

    pub fn composite(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttributeType::composite(attributes))
    }

    pub fn collection(name: impl Into<String>, items: AttributeType) -> Self {
        Self::new(name, AttributeType::collection(items))
    }

    /// Attribute embedding another media type, rendered through `view`.
    pub fn media_type(
        name: impl Into<String>,
        identifier: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        let mut attr = Self::new(name, AttributeType::media_type(identifier));
        attr.view = Some(view.into());
        attr
    }

    pub fn required(mut self) -> Self {
        self.constraints.required = true;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.constraints.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.constraints.max_length = Some(n);
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.constraints.minimum = Some(n);
        self
    }

    pub fn maximum(mut self, n: f64) -> Self {
        self.constraints.maximum = Some(n);
        self
    }

    pub fn pattern(mut self, source: impl Into<String>) -> Self {
        self.constraints.pattern = Some(Pattern::new(source));
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }
}
