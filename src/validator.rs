//! Attribute validation.
//!
//! Validation is declarative: an [`Attribute`] carries its constraints and
//! [`validate`] checks a JSON value against them. Every violated constraint is
//! collected so a client sees all problems with a field in one response.
//!
//! - Length bounds are inclusive and count characters (strings) or elements
//!   (collections).
//! - Numeric bounds are inclusive.
//! - Patterns must match the whole string.
//! - Enumerations are exact membership tests.
//! - Composite members are validated recursively; failures carry a dotted
//!   path such as `author.display_name`, collection elements an index such as
//!   `tags[2]`.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::design::{Attribute, AttributeType, MediaType, Primitive};

/// Resolves media types embedded by attributes.
pub trait MediaTypeLookup {
    fn media_type(&self, identifier: &str) -> Option<&MediaType>;
}

/// Lookup that resolves nothing; embedded media types are not descended into.
pub struct NoLookup;

impl MediaTypeLookup for NoLookup {
    fn media_type(&self, _identifier: &str) -> Option<&MediaType> {
        None
    }
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    /// Attribute path, e.g. `author.display_name` or `tags[0]`
    pub path: String,
    /// Constraint name: `required`, `type`, `minLength`, `maxLength`,
    /// `minimum`, `maximum`, `pattern` or `enum`
    pub constraint: &'static str,
    pub actual: Value,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate `value` against `attr`, ignoring embedded media types.
pub fn validate(value: &Value, attr: &Attribute) -> Vec<ValidationFailure> {
    validate_with(value, attr, &NoLookup)
}

/// Validate `value` against `attr`, resolving embedded media types via `lookup`.
pub fn validate_with(
    value: &Value,
    attr: &Attribute,
    lookup: &dyn MediaTypeLookup,
) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    check(value, attr, &attr.name, lookup, &mut failures);
    failures
}

/// Validate a JSON object against a list of member attributes, as for a
/// request payload. Member paths are not prefixed.
pub fn validate_members(
    object: &Value,
    members: &[Attribute],
    lookup: &dyn MediaTypeLookup,
) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    check_members(object, members, "", lookup, &mut failures);
    failures
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn check_members(
    object: &Value,
    members: &[Attribute],
    path: &str,
    lookup: &dyn MediaTypeLookup,
    failures: &mut Vec<ValidationFailure>,
) {
    let Some(map) = object.as_object() else {
        failures.push(ValidationFailure {
            path: if path.is_empty() { "body".to_string() } else { path.to_string() },
            constraint: "type",
            actual: object.clone(),
            message: "must be an object".to_string(),
        });
        return;
    };
    for member in members {
        let value = map.get(&member.name).unwrap_or(&Value::Null);
        check(value, member, &child_path(path, &member.name), lookup, failures);
    }
}

fn check(
    value: &Value,
    attr: &Attribute,
    path: &str,
    lookup: &dyn MediaTypeLookup,
    failures: &mut Vec<ValidationFailure>,
) {
    if value.is_null() {
        if attr.constraints.required {
            failures.push(ValidationFailure {
                path: path.to_string(),
                constraint: "required",
                actual: Value::Null,
                message: "is required".to_string(),
            });
        }
        return;
    }

    if !check_type(value, &attr.ty, path, lookup, failures) {
        return;
    }

    let c = &attr.constraints;
    let mut fail = |constraint: &'static str, message: String| {
        failures.push(ValidationFailure {
            path: path.to_string(),
            constraint,
            actual: value.clone(),
            message,
        });
    };

    let length = match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };
    if let Some(len) = length {
        if let Some(min) = c.min_length {
            if len < min {
                fail("minLength", format!("length {len} is shorter than {min}"));
            }
        }
        if let Some(max) = c.max_length {
            if len > max {
                fail("maxLength", format!("length {len} is longer than {max}"));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = c.minimum {
            if n < min {
                fail("minimum", format!("{n} is below the minimum {min}"));
            }
        }
        if let Some(max) = c.maximum {
            if n > max {
                fail("maximum", format!("{n} is above the maximum {max}"));
            }
        }
    }

    if let (Some(pattern), Some(s)) = (&c.pattern, value.as_str()) {
        if !pattern.is_full_match(s) {
            fail("pattern", format!("does not match `{}`", pattern.source()));
        }
    }

    if let Some(allowed) = &c.allowed {
        if !allowed.contains(value) {
            let listed = allowed
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            fail("enum", format!("must be one of [{listed}]"));
        }
    }
}

/// Returns false when the value has the wrong shape, in which case the
/// remaining constraints are not evaluated.
fn check_type(
    value: &Value,
    ty: &AttributeType,
    path: &str,
    lookup: &dyn MediaTypeLookup,
    failures: &mut Vec<ValidationFailure>,
) -> bool {
    let type_failure = |failures: &mut Vec<ValidationFailure>, expected: String| {
        failures.push(ValidationFailure {
            path: path.to_string(),
            constraint: "type",
            actual: value.clone(),
            message: format!("must be {expected}"),
        });
        false
    };

    match ty {
        AttributeType::Primitive { primitive } => {
            let ok = match primitive {
                Primitive::String => value.is_string(),
                Primitive::Integer => value.is_i64() || value.is_u64(),
                Primitive::Float => value.is_number(),
                Primitive::Boolean => value.is_boolean(),
                Primitive::DateTime => value
                    .as_str()
                    .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
                Primitive::Any => true,
            };
            if ok {
                true
            } else {
                let expected = match primitive {
                    Primitive::DateTime => "an RFC 3339 datetime".to_string(),
                    Primitive::Integer => "an integer".to_string(),
                    p => format!("a {p}"),
                };
                type_failure(failures, expected)
            }
        }
        AttributeType::Composite { attributes } => {
            if !value.is_object() {
                return type_failure(failures, "an object".to_string());
            }
            check_members(value, attributes, path, lookup, failures);
            true
        }
        AttributeType::Collection { items } => {
            let Some(elements) = value.as_array() else {
                return type_failure(failures, ty.describe());
            };
            for (i, element) in elements.iter().enumerate() {
                let element_path = format!("{path}[{i}]");
                if element.is_null() {
                    failures.push(ValidationFailure {
                        path: element_path,
                        constraint: "type",
                        actual: Value::Null,
                        message: format!("must be {}", items.describe()),
                    });
                    continue;
                }
                check_type(element, items, &element_path, lookup, failures);
            }
            true
        }
        AttributeType::MediaType { identifier } => {
            if !value.is_object() {
                return type_failure(failures, format!("an object of {identifier}"));
            }
            if let Some(mt) = lookup.media_type(identifier) {
                check_members(value, mt.attributes(), path, lookup, failures);
            }
            true
        }
    }
}
