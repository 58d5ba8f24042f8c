use std::collections::HashSet;
use std::sync::Arc;

use super::action::{Action, ActionBuilder};
use crate::error::{DefinitionError, DefinitionIssue};

/// A named group of actions sharing a route prefix.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub prefix: String,
    pub version: Option<String>,
    /// Media type rendered by actions that do not name one
    pub media_type: Option<String>,
    pub actions: Vec<Arc<Action>>,
}

impl Resource {
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            name: name.into(),
            prefix: String::new(),
            version: None,
            media_type: None,
            actions: Vec::new(),
        }
    }

    pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Handler registration name for an action of this resource.
    pub fn handler_name(&self, action: &Action) -> String {
        format!("{}.{}", self.name, action.name)
    }
}

pub struct ResourceBuilder {
    name: String,
    prefix: String,
    version: Option<String>,
    media_type: Option<String>,
    actions: Vec<ActionBuilder>,
}

impl ResourceBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn media_type(mut self, identifier: impl Into<String>) -> Self {
        self.media_type = Some(identifier.into());
        self
    }

    pub fn action(mut self, action: ActionBuilder) -> Self {
        self.actions.push(action);
        self
    }

    pub fn build(self) -> Result<Resource, DefinitionError> {
        let location = format!("resource:{}", self.name);
        let mut issues = Vec::new();

        if self.name.is_empty() || self.name.contains('.') {
            issues.push(DefinitionIssue::new(
                &location,
                "invalid_name",
                "resource names must be non-empty and must not contain `.`",
            ));
        }

        let mut seen = HashSet::new();
        let mut actions = Vec::with_capacity(self.actions.len());
        for builder in self.actions {
            let action_location = format!("{location}/action:{}", builder.name());
            if !seen.insert(builder.name().to_string()) {
                issues.push(DefinitionIssue::new(
                    &action_location,
                    "duplicate_action",
                    format!("action `{}` declared more than once", builder.name()),
                ));
            }
            match builder.build(&self.prefix, &action_location) {
                Ok(mut action) => {
                    if let Some(default) = &self.media_type {
                        for (_, spec) in action.responses.iter_mut() {
                            if spec.is_success()
                                && !spec.multipart
                                && spec.status != 204
                                && spec.media_type.is_none()
                            {
                                spec.media_type = Some(default.clone());
                            }
                        }
                    }
                    actions.push(Arc::new(action));
                }
                Err(mut action_issues) => issues.append(&mut action_issues),
            }
        }

        DefinitionError::check(issues)?;
        Ok(Resource {
            name: self.name,
            prefix: self.prefix,
            version: self.version,
            media_type: self.media_type,
            actions,
        })
    }
}
