use http::Method;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

use super::attribute::Attribute;
use super::route::RouteTemplate;
use super::types::AttributeType;
use crate::error::DefinitionIssue;

/// Header value template. `{name}` placeholders are filled from identifiers
/// returned by the handler first, then from bound parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderTemplate {
    pub name: String,
    pub template: String,
}

impl HeaderTemplate {
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        placeholders_in(&self.template)
    }
}

/// `{name}` placeholders of `template`, in order of appearance.
pub(crate) fn placeholders_in(template: &str) -> impl Iterator<Item = &str> {
    template
        .split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}').map(|(name, _)| name))
}

/// Outcome declared for an action under a response key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSpec {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderTemplate>,
    /// Envelope for per-identifier parts rather than a single body
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub multipart: bool,
}

impl ResponseSpec {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            media_type: None,
            view: None,
            headers: Vec::new(),
            multipart: false,
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn created() -> Self {
        Self::status(201)
    }

    pub fn no_content() -> Self {
        Self::status(204)
    }

    pub fn not_found() -> Self {
        Self::status(404)
    }

    /// Multipart envelope, one part per identifier.
    pub fn multipart(status: u16) -> Self {
        Self {
            multipart: true,
            ..Self::status(status)
        }
    }

    pub fn media_type(mut self, identifier: impl Into<String>) -> Self {
        self.media_type = Some(identifier.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.headers.push(HeaderTemplate {
            name: name.into(),
            template: template.into(),
        });
        self
    }

    pub fn location(self, template: impl Into<String>) -> Self {
        self.header("Location", template)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A named operation on a resource.
///
/// Actions are frozen by [`Resource`](super::Resource) when the resource is
/// built, because the full route depends on the resource prefix.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub method: Method,
    /// Template relative to the resource prefix, as declared
    pub path: String,
    /// Full template including the resource prefix
    pub route: RouteTemplate,
    pub params: Vec<Attribute>,
    pub payload: Option<Vec<Attribute>>,
    /// Response key → spec, in declaration order
    pub responses: Vec<(String, ResponseSpec)>,
    pub timeout: Option<Duration>,
    /// Collection parameter whose elements are processed as independent parts
    pub multipart: Option<String>,
}

impl Action {
    pub fn builder(name: impl Into<String>) -> ActionBuilder {
        ActionBuilder {
            name: name.into(),
            method: Method::GET,
            path: String::new(),
            params: Vec::new(),
            payload: None,
            responses: Vec::new(),
            timeout: None,
            multipart: None,
        }
    }

    pub fn response(&self, key: &str) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, spec)| spec)
    }

    pub fn param(&self, name: &str) -> Option<&Attribute> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The envelope response for multipart actions.
    pub fn multipart_response(&self) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .map(|(_, spec)| spec)
            .find(|spec| spec.multipart)
    }

    /// Media type of the first success response that renders one, used to
    /// check a client-requested view.
    pub fn primary_media_type(&self) -> Option<&str> {
        self.responses
            .iter()
            .map(|(_, spec)| spec)
            .find(|spec| spec.is_success() && !spec.multipart && spec.media_type.is_some())
            .and_then(|spec| spec.media_type.as_deref())
    }
}

pub struct ActionBuilder {
    name: String,
    method: Method,
    path: String,
    params: Vec<Attribute>,
    payload: Option<Vec<Attribute>>,
    responses: Vec<(String, ResponseSpec)>,
    timeout: Option<Duration>,
    multipart: Option<String>,
}

impl ActionBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(mut self, method: Method, path: impl Into<String>) -> Self {
        self.method = method;
        self.path = path.into();
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.route(Method::GET, path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.route(Method::PUT, path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.route(Method::PATCH, path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.route(Method::DELETE, path)
    }

    pub fn param(mut self, attribute: Attribute) -> Self {
        self.params.push(attribute);
        self
    }

    pub fn payload(mut self, attributes: Vec<Attribute>) -> Self {
        self.payload = Some(attributes);
        self
    }

    pub fn response(mut self, key: impl Into<String>, spec: ResponseSpec) -> Self {
        self.responses.push((key.into(), spec));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn multipart(mut self, param: impl Into<String>) -> Self {
        self.multipart = Some(param.into());
        self
    }

    /// Freeze the action under `prefix`, collecting every local issue.
    pub(crate) fn build(
        self,
        prefix: &str,
        location: &str,
    ) -> Result<Action, Vec<DefinitionIssue>> {
        let mut issues = Vec::new();
        let issue = |kind: &str, message: String| DefinitionIssue::new(location, kind, message);

        let route = match RouteTemplate::join(prefix, &self.path) {
            Ok(route) => Some(route),
            Err(e) => {
                issues.push(issue("invalid_route", e));
                None
            }
        };

        let mut param_names = HashSet::new();
        for p in &self.params {
            if !param_names.insert(p.name.as_str()) {
                issues.push(issue(
                    "duplicate_param",
                    format!("param `{}` declared more than once", p.name),
                ));
            }
        }

        if let Some(route) = &route {
            let mut path_names = HashSet::new();
            for name in route.path_captures() {
                if !path_names.insert(name) {
                    issues.push(issue(
                        "duplicate_capture",
                        format!("path capture `{name}` appears more than once"),
                    ));
                }
            }
            let mut query_names = HashSet::new();
            for q in route.query() {
                if path_names.contains(q.name.as_str()) {
                    issues.push(issue(
                        "capture_collision",
                        format!("`{}` is captured by both the path and the query", q.name),
                    ));
                } else if !query_names.insert(q.name.as_str()) {
                    issues.push(issue(
                        "duplicate_capture",
                        format!("query capture `{}` appears more than once", q.name),
                    ));
                }
            }
            for name in route.all_captures() {
                if !param_names.contains(name) {
                    issues.push(issue(
                        "undeclared_param",
                        format!("route captures `{name}` but no param declares it"),
                    ));
                }
            }
            for p in &self.params {
                if !path_names.contains(p.name.as_str()) && !query_names.contains(p.name.as_str())
                {
                    issues.push(issue(
                        "uncaptured_param",
                        format!("param `{}` is not captured by the route", p.name),
                    ));
                }
            }
        }

        for p in &self.params {
            let bindable = match &p.ty {
                AttributeType::Primitive { .. } => true,
                AttributeType::Collection { items } => items.as_primitive().is_some(),
                _ => false,
            };
            if !bindable {
                issues.push(issue(
                    "unbindable_param",
                    format!(
                        "param `{}` of type {} cannot be bound from a URL",
                        p.name,
                        p.ty.describe()
                    ),
                ));
            }
        }

        if self.responses.is_empty() {
            issues.push(issue(
                "no_responses",
                "an action must declare at least one response".to_string(),
            ));
        }
        let mut keys = HashSet::new();
        for (key, _) in &self.responses {
            if !keys.insert(key.as_str()) {
                issues.push(issue(
                    "duplicate_response_key",
                    format!("response key `{key}` declared more than once"),
                ));
            }
        }

        let envelopes = self.responses.iter().filter(|(_, s)| s.multipart).count();
        match &self.multipart {
            Some(name) => {
                match self.params.iter().find(|p| &p.name == name) {
                    Some(p) if matches!(p.ty, AttributeType::Collection { .. }) => {}
                    Some(_) => issues.push(issue(
                        "multipart_param",
                        format!("multipart param `{name}` must be a collection"),
                    )),
                    None => issues.push(issue(
                        "multipart_param",
                        format!("multipart param `{name}` is not declared"),
                    )),
                }
                if envelopes != 1 {
                    issues.push(issue(
                        "multipart_response",
                        format!("multipart actions need exactly one multipart response, found {envelopes}"),
                    ));
                }
            }
            None if envelopes > 0 => issues.push(issue(
                "multipart_response",
                "multipart response declared without a multipart param".to_string(),
            )),
            None => {}
        }

        match route {
            Some(route) if issues.is_empty() => Ok(Action {
                name: self.name,
                method: self.method,
                path: self.path,
                route,
                params: self.params,
                payload: self.payload,
                responses: self.responses,
                timeout: self.timeout,
                multipart: self.multipart,
            }),
            _ => Err(issues),
        }
    }
}
