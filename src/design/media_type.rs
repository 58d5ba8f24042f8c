use serde::Serialize;
use std::collections::HashSet;

use super::attribute::Attribute;
use crate::error::{DefinitionError, DefinitionIssue};

/// Name of the view used when a caller does not ask for one.
pub const DEFAULT_VIEW: &str = "default";

/// One entry of a view: an attribute, optionally forcing the view used for the
/// media type it embeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewField {
    pub attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl ViewField {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            view: None,
        }
    }

    pub fn with_view(attribute: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            view: Some(view.into()),
        }
    }
}

impl From<&str> for ViewField {
    fn from(attribute: &str) -> Self {
        ViewField::new(attribute)
    }
}

impl From<String> for ViewField {
    fn from(attribute: String) -> Self {
        ViewField::new(attribute)
    }
}

/// A named, ordered projection of a media type's attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub name: String,
    pub fields: Vec<ViewField>,
}

/// Named representation schema with one or more views.
///
/// Constructed through [`MediaType::builder`], which enforces that at least one
/// view exists and that every view only references declared attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaType {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    attributes: Vec<Attribute>,
    views: Vec<View>,
}

impl MediaType {
    pub fn builder(identifier: impl Into<String>) -> MediaTypeBuilder {
        MediaTypeBuilder {
            identifier: identifier.into(),
            description: None,
            attributes: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.view(name).is_some()
    }

    /// The `default` view if declared, otherwise the first declared view.
    pub fn default_view(&self) -> &View {
        // The builder guarantees at least one view.
        self.view(DEFAULT_VIEW)
            .unwrap_or_else(|| &self.views[0])
    }
}

pub struct MediaTypeBuilder {
    identifier: String,
    description: Option<String>,
    attributes: Vec<Attribute>,
    views: Vec<View>,
}

impl MediaTypeBuilder {
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a view listing attribute names in render order.
    pub fn view<I, F>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<ViewField>,
    {
        self.views.push(View {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate the local invariants and freeze the media type. Cross-type
    /// references (nested media types and their views) are checked when the
    /// whole API definition is assembled.
    pub fn build(self) -> Result<MediaType, DefinitionError> {
        let location = format!("media_type:{}", self.identifier);
        let mut issues = Vec::new();

        if self.identifier.trim().is_empty() {
            issues.push(DefinitionIssue::new(
                &location,
                "empty_identifier",
                "media type identifier must not be empty",
            ));
        }

        let mut names = HashSet::new();
        for attr in &self.attributes {
            if !names.insert(attr.name.as_str()) {
                issues.push(DefinitionIssue::new(
                    &location,
                    "duplicate_attribute",
                    format!("attribute `{}` declared more than once", attr.name),
                ));
            }
        }

        if self.views.is_empty() {
            issues.push(DefinitionIssue::new(
                &location,
                "no_views",
                "a media type must expose at least one view",
            ));
        }

        let mut view_names = HashSet::new();
        for view in &self.views {
            let view_location = format!("{location}/view:{}", view.name);
            if !view_names.insert(view.name.as_str()) {
                issues.push(DefinitionIssue::new(
                    &view_location,
                    "duplicate_view",
                    format!("view `{}` declared more than once", view.name),
                ));
            }
            let mut seen = HashSet::new();
            for field in &view.fields {
                if !names.contains(field.attribute.as_str()) {
                    issues.push(DefinitionIssue::new(
                        &view_location,
                        "unknown_attribute",
                        format!("view references undeclared attribute `{}`", field.attribute),
                    ));
                }
                if !seen.insert(field.attribute.as_str()) {
                    issues.push(DefinitionIssue::new(
                        &view_location,
                        "duplicate_view_field",
                        format!("attribute `{}` listed twice", field.attribute),
                    ));
                }
            }
        }

        DefinitionError::check(issues)?;
        Ok(MediaType {
            identifier: self.identifier,
            description: self.description,
            attributes: self.attributes,
            views: self.views,
        })
    }
}
