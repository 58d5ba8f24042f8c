//! # Error Taxonomy
//!
//! Every failure the framework can produce maps onto one of these types, and
//! each type maps onto exactly one HTTP outcome:
//!
//! | Error                 | Raised by            | Outcome                              |
//! |-----------------------|----------------------|--------------------------------------|
//! | [`ValidationFailure`] | attribute validation | aggregated into one `400`            |
//! | [`BindingError`]      | parameter binding    | aggregated into one `400`            |
//! | [`RoutingError`]      | router               | `404` / `405` + `Allow`              |
//! | [`RenderError`]       | view engine          | `500`, details logged only           |
//! | [`HandlerError`]      | application handler  | the response key the handler chose   |
//! | [`DefinitionError`]   | builders, generator  | fatal at registration / build time   |
//!
//! [`ValidationFailure`]: crate::validator::ValidationFailure

use http::Method;
use std::fmt;

use crate::blueprint::Body;

/// One problem found in the declaration graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionIssue {
    /// Where the issue occurred (e.g. `resource:posts/action:show`)
    pub location: String,
    /// Machine-readable kind (e.g. `unknown_view`, `ambiguous_route`)
    pub kind: String,
    pub message: String,
}

impl DefinitionIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DefinitionIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DefinitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// The declaration graph violates an invariant. Carries every issue found,
/// not just the first.
#[derive(Debug, Clone, thiserror::Error)]
#[error("definition rejected with {} issue(s): {}", .issues.len(), summary(.issues))]
pub struct DefinitionError {
    pub issues: Vec<DefinitionIssue>,
}

fn summary(issues: &[DefinitionIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DefinitionError {
    pub fn new(issues: Vec<DefinitionIssue>) -> Self {
        Self { issues }
    }

    pub fn single(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(vec![DefinitionIssue::new(location, kind, message)])
    }

    /// `Ok(())` when no issues were collected.
    pub fn check(issues: Vec<DefinitionIssue>) -> Result<(), DefinitionError> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self::new(issues))
        }
    }
}

/// A request parameter or payload could not be bound.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("missing required {location} `{name}`")]
    Missing { name: String, location: &'static str },
    #[error("{location} `{name}` must be {expected}, got `{raw}`")]
    Coercion {
        name: String,
        location: &'static str,
        expected: String,
        raw: String,
    },
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),
    #[error("view `{0}` is not available for this action")]
    UnknownView(String),
}

impl BindingError {
    /// Reason string used in the `errors[].reason` field of error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            BindingError::Missing { .. } => "required",
            BindingError::Coercion { .. } => "type",
            BindingError::MalformedBody(_) => "malformedBody",
            BindingError::UnknownView(_) => "unknownView",
        }
    }
}

/// The request did not resolve to an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("no route matched {method} {path}")]
    NoRouteMatched { method: Method, path: String },
    #[error("{method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        /// Union of methods declared for the path, sorted
        allow: Vec<Method>,
    },
}

impl RoutingError {
    pub fn status(&self) -> u16 {
        match self {
            RoutingError::NoRouteMatched { .. } => 404,
            RoutingError::MethodNotAllowed { .. } => 405,
        }
    }

    /// Value for the `Allow` header, when one applies.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            RoutingError::MethodNotAllowed { allow, .. } => Some(
                allow
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            RoutingError::NoRouteMatched { .. } => None,
        }
    }
}

/// Rendering failed. Always a programmer defect, never the client's fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("view `{view}` does not exist on media type `{media_type}`")]
    UnknownView { media_type: String, view: String },
    #[error("media type `{0}` is not registered")]
    UnknownMediaType(String),
    #[error("blueprint for `{media_type}` has no field `{field}`")]
    MissingField { media_type: String, field: String },
    #[error("field `{field}` of `{media_type}` cannot be rendered as {expected}")]
    Shape {
        media_type: String,
        field: String,
        expected: String,
    },
    #[error("render depth exceeded {0} levels; media types likely reference each other in a cycle")]
    DepthExceeded(usize),
}

/// Failure raised by application code.
///
/// The framework does not interpret it: the `key` selects a declared response
/// and `body` is rendered through that response like any other body.
#[derive(Debug, thiserror::Error)]
#[error("handler failed with response `{key}`{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct HandlerError {
    pub key: String,
    pub body: Option<Body>,
    pub message: Option<String>,
}

impl HandlerError {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: None,
            message: None,
        }
    }

    /// Common case: the addressed resource does not exist.
    pub fn not_found() -> Self {
        Self::new("notFound")
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
