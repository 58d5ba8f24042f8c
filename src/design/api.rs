use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::action::Action;
use super::attribute::Attribute;
use super::media_type::MediaType;
use super::resource::Resource;
use super::types::AttributeType;
use crate::error::{DefinitionError, DefinitionIssue};
use crate::validator::MediaTypeLookup;

/// Registry of media types keyed by identifier, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MediaTypes {
    types: Vec<Arc<MediaType>>,
    index: HashMap<String, usize>,
}

impl MediaTypes {
    pub fn get(&self, identifier: &str) -> Option<&Arc<MediaType>> {
        self.index.get(identifier).and_then(|&i| self.types.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MediaType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn insert(&mut self, media_type: MediaType) -> bool {
        if self.index.contains_key(&media_type.identifier) {
            return false;
        }
        self.index
            .insert(media_type.identifier.clone(), self.types.len());
        self.types.push(Arc::new(media_type));
        true
    }
}

impl MediaTypeLookup for MediaTypes {
    fn media_type(&self, identifier: &str) -> Option<&MediaType> {
        self.get(identifier).map(AsRef::as_ref)
    }
}

impl Serialize for MediaTypes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.types.iter().map(AsRef::as_ref))
    }
}

/// One routable action with the resource it belongs to.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub resource: Arc<Resource>,
    pub action: Arc<Action>,
    /// `resource.action`, the name handlers are registered under
    pub handler_name: Arc<str>,
}

/// The frozen declaration graph: every media type and resource, checked
/// against the cross-cutting invariants.
#[derive(Debug, Clone)]
pub struct ApiDefinition {
    pub name: String,
    pub version: Option<String>,
    media_types: MediaTypes,
    resources: Vec<Arc<Resource>>,
}

impl ApiDefinition {
    pub fn builder(name: impl Into<String>) -> ApiBuilder {
        ApiBuilder {
            name: name.into(),
            version: None,
            media_types: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn media_types(&self) -> &MediaTypes {
        &self.media_types
    }

    pub fn media_type(&self, identifier: &str) -> Option<&Arc<MediaType>> {
        self.media_types.get(identifier)
    }

    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&Arc<Resource>> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Every action in resource order, then action order.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.resources
            .iter()
            .flat_map(|resource| {
                resource.actions.iter().map(move |action| RouteEntry {
                    resource: Arc::clone(resource),
                    action: Arc::clone(action),
                    handler_name: Arc::from(resource.handler_name(action)),
                })
            })
            .collect()
    }
}

pub struct ApiBuilder {
    name: String,
    version: Option<String>,
    media_types: Vec<MediaType>,
    resources: Vec<Resource>,
}

impl ApiBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_types.push(media_type);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Check the global invariants and freeze the graph. Every violation is
    /// reported, not just the first.
    pub fn build(self) -> Result<ApiDefinition, DefinitionError> {
        let mut issues = Vec::new();

        let mut registry = MediaTypes::default();
        for mt in self.media_types {
            let id = mt.identifier.clone();
            if !registry.insert(mt) {
                issues.push(DefinitionIssue::new(
                    format!("media_type:{id}"),
                    "duplicate_media_type",
                    format!("media type `{id}` registered more than once"),
                ));
            }
        }

        for mt in registry.iter() {
            let location = format!("media_type:{}", mt.identifier);
            for attr in mt.attributes() {
                check_attribute(&registry, &location, attr, &mut issues);
            }
            for view in mt.views() {
                for field in &view.fields {
                    let Some(view_name) = &field.view else {
                        continue;
                    };
                    let target = mt.attribute(&field.attribute).and_then(|a| embedded(&a.ty));
                    let field_location = format!("{location}/view:{}", view.name);
                    match target.and_then(|id| registry.get(id)) {
                        Some(target) if !target.has_view(view_name) => {
                            issues.push(DefinitionIssue::new(
                                field_location,
                                "unknown_view",
                                format!(
                                    "`{}` overrides view `{view_name}`, which `{}` does not declare",
                                    field.attribute, target.identifier
                                ),
                            ))
                        }
                        Some(_) => {}
                        None if target.is_none() => issues.push(DefinitionIssue::new(
                            field_location,
                            "view_override",
                            format!(
                                "`{}` does not embed a media type, so it cannot select a view",
                                field.attribute
                            ),
                        )),
                        // unresolved target already reported by check_attribute
                        None => {}
                    }
                }
            }
        }

        let mut names = HashSet::new();
        for resource in &self.resources {
            let location = format!("resource:{}", resource.name);
            if !names.insert(resource.name.as_str()) {
                issues.push(DefinitionIssue::new(
                    &location,
                    "duplicate_resource",
                    format!("resource `{}` declared more than once", resource.name),
                ));
            }
            for action in &resource.actions {
                check_action(&registry, &format!("{location}/action:{}", action.name), action, &mut issues);
            }
        }

        check_ambiguity(&self.resources, &mut issues);

        DefinitionError::check(issues)?;

        info!(
            api = %self.name,
            media_types = registry.len(),
            resources = self.resources.len(),
            actions = self.resources.iter().map(|r| r.actions.len()).sum::<usize>(),
            "API definition frozen"
        );

        Ok(ApiDefinition {
            name: self.name,
            version: self.version,
            media_types: registry,
            resources: self.resources.into_iter().map(Arc::new).collect(),
        })
    }
}

/// Media type identifier embedded by `ty`, directly or as collection items.
fn embedded(ty: &AttributeType) -> Option<&str> {
    match ty {
        AttributeType::MediaType { identifier } => Some(identifier),
        AttributeType::Collection { items } => embedded(items),
        _ => None,
    }
}

fn check_attribute(
    registry: &MediaTypes,
    location: &str,
    attr: &Attribute,
    issues: &mut Vec<DefinitionIssue>,
) {
    let c = &attr.constraints;
    if let Some(p) = &c.pattern {
        if !p.is_valid() {
            issues.push(DefinitionIssue::new(
                location,
                "invalid_pattern",
                format!("`{}` has an invalid pattern `{}`", attr.name, p.source()),
            ));
        }
    }
    let inverted_length = matches!((c.min_length, c.max_length), (Some(lo), Some(hi)) if lo > hi);
    let inverted_range = matches!((c.minimum, c.maximum), (Some(lo), Some(hi)) if lo > hi);
    if inverted_length || inverted_range {
        issues.push(DefinitionIssue::new(
            location,
            "inverted_bounds",
            format!("`{}` has a lower bound above its upper bound", attr.name),
        ));
    }
    check_type(registry, location, &attr.name, &attr.ty, attr.view.as_deref(), issues);
}

fn check_type(
    registry: &MediaTypes,
    location: &str,
    name: &str,
    ty: &AttributeType,
    view: Option<&str>,
    issues: &mut Vec<DefinitionIssue>,
) {
    match ty {
        AttributeType::Primitive { .. } => {}
        AttributeType::Composite { attributes } => {
            let nested = format!("{location}/{name}");
            let mut seen = HashSet::new();
            for member in attributes {
                if !seen.insert(member.name.as_str()) {
                    issues.push(DefinitionIssue::new(
                        &nested,
                        "duplicate_attribute",
                        format!("attribute `{}` declared more than once", member.name),
                    ));
                }
                check_attribute(registry, &nested, member, issues);
            }
        }
        AttributeType::Collection { items } => {
            if matches!(items.as_ref(), AttributeType::Collection { .. }) {
                issues.push(DefinitionIssue::new(
                    location,
                    "nested_collection",
                    format!("`{name}` is a collection of collections"),
                ));
            } else {
                check_type(registry, location, name, items, view, issues);
            }
        }
        AttributeType::MediaType { identifier } => match registry.get(identifier) {
            None => issues.push(DefinitionIssue::new(
                location,
                "unknown_media_type",
                format!("`{name}` references unregistered media type `{identifier}`"),
            )),
            Some(target) => {
                if let Some(view) = view {
                    if !target.has_view(view) {
                        issues.push(DefinitionIssue::new(
                            location,
                            "unknown_view",
                            format!("`{name}` renders view `{view}`, which `{identifier}` does not declare"),
                        ));
                    }
                }
            }
        },
    }
}

fn check_action(
    registry: &MediaTypes,
    location: &str,
    action: &Action,
    issues: &mut Vec<DefinitionIssue>,
) {
    for p in &action.params {
        check_attribute(registry, location, p, issues);
    }
    for member in action.payload.iter().flatten() {
        check_attribute(registry, &format!("{location}/payload"), member, issues);
    }
    for (key, spec) in &action.responses {
        let response_location = format!("{location}/response:{key}");
        match (&spec.media_type, &spec.view) {
            (Some(id), view) => match registry.get(id) {
                None => issues.push(DefinitionIssue::new(
                    response_location,
                    "unknown_media_type",
                    format!("response renders unregistered media type `{id}`"),
                )),
                Some(mt) => {
                    if let Some(view) = view {
                        if !mt.has_view(view) {
                            issues.push(DefinitionIssue::new(
                                response_location,
                                "unknown_view",
                                format!("response view `{view}` is not declared by `{id}`"),
                            ));
                        }
                    }
                }
            },
            (None, Some(view)) => issues.push(DefinitionIssue::new(
                response_location,
                "view_without_media_type",
                format!("response selects view `{view}` but renders no media type"),
            )),
            (None, None) => {}
        }
    }
}

/// Two actions with the same method whose templates overlap and carry the
/// same number of literal segments cannot be told apart at request time.
fn check_ambiguity(resources: &[Resource], issues: &mut Vec<DefinitionIssue>) {
    let all: Vec<(&Resource, &Arc<Action>)> = resources
        .iter()
        .flat_map(|r| r.actions.iter().map(move |a| (r, a)))
        .collect();

    for (i, (ra, a)) in all.iter().enumerate() {
        for (rb, b) in all.iter().skip(i + 1) {
            if a.method == b.method
                && a.route.overlaps(&b.route)
                && a.route.literal_count() == b.route.literal_count()
            {
                debug!(
                    first = %a.route,
                    second = %b.route,
                    method = %a.method,
                    "Ambiguous route pair"
                );
                issues.push(DefinitionIssue::new(
                    format!("resource:{}/action:{}", rb.name, b.name),
                    "ambiguous_route",
                    format!(
                        "{} {} is indistinguishable from {} {} (resource:{}/action:{})",
                        b.method,
                        b.route.path(),
                        a.method,
                        a.route.path(),
                        ra.name,
                        a.name
                    ),
                ));
            }
        }
    }
}
