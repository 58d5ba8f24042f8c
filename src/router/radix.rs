//! Radix tree for route matching.
//!
//! Each node represents one path segment:
//! - literal segments (e.g. `posts`) match exactly
//! - capture segments (e.g. `{id}`) match any single segment
//! - actions are stored at terminal nodes
//!
//! Unlike a first-match tree, [`RadixTree::search`] collects every action
//! whose template matches the path, across literal and capture branches. The
//! router needs the full set to tell a 405 from a 404 and to apply the
//! most-literal-segments tie-break.

use std::borrow::Cow;
use std::sync::Arc;

use crate::design::{RouteEntry, Segment};

use super::core::ParamVec;

/// A terminal entry: the action plus its position in declaration order.
#[derive(Debug)]
pub(crate) struct Terminal {
    pub entry: RouteEntry,
    pub order: usize,
}

#[derive(Debug, Clone, Default)]
struct RadixNode {
    /// The path segment this node represents (without leading /)
    segment: Cow<'static, str>,
    /// Actions whose template ends at this node
    routes: Vec<Arc<Terminal>>,
    /// Capture name if this is a capture node
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode>,
    /// One child per distinct capture name at this position, so
    /// `/users/{user_id}/posts` and `/users/{id}/comments` keep their own names
    param_children: Vec<RadixNode>,
}

impl RadixNode {
    fn new(segment: Cow<'static, str>) -> Self {
        Self {
            segment,
            ..Default::default()
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(name)),
            ..Default::default()
        }
    }

    fn insert(&mut self, segments: &[Segment], terminal: Arc<Terminal>) {
        let Some((first, remaining)) = segments.split_first() else {
            self.routes.push(terminal);
            return;
        };

        match first {
            Segment::Capture(name) => {
                if let Some(child) = self
                    .param_children
                    .iter_mut()
                    .find(|c| c.param_name.as_deref() == Some(name.as_str()))
                {
                    child.insert(remaining, terminal);
                    return;
                }
                let mut child = RadixNode::new_param(name);
                child.insert(remaining, terminal);
                self.param_children.push(child);
            }
            Segment::Literal(literal) => {
                if let Some(child) = self.children.iter_mut().find(|c| c.segment == literal.as_str()) {
                    child.insert(remaining, terminal);
                    return;
                }
                let mut child = RadixNode::new(Cow::Owned(literal.clone()));
                child.insert(remaining, terminal);
                self.children.push(child);
            }
        }
    }

    fn search(
        &self,
        segments: &[&str],
        params: &mut ParamVec,
        out: &mut Vec<(Arc<Terminal>, ParamVec)>,
    ) {
        let Some((&segment, remaining)) = segments.split_first() else {
            for terminal in &self.routes {
                out.push((Arc::clone(terminal), params.clone()));
            }
            return;
        };

        for child in &self.children {
            if child.segment == segment {
                child.search(remaining, params, out);
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), segment.to_string()));
                child.search(remaining, params, out);
                // Backtrack before trying the next capture branch
                params.pop();
            }
        }
    }
}

/// Radix tree over every action in an API definition.
#[derive(Debug, Clone, Default)]
pub(crate) struct RadixTree {
    root: RadixNode,
}

impl RadixTree {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        let mut root = RadixNode::new(Cow::Borrowed(""));
        for (order, entry) in entries.into_iter().enumerate() {
            let segments = entry.action.route.segments().to_vec();
            root.insert(&segments, Arc::new(Terminal { entry, order }));
        }
        Self { root }
    }

    /// Every terminal whose template matches `segments`, with its captures.
    pub fn search(&self, segments: &[&str]) -> Vec<(Arc<Terminal>, ParamVec)> {
        let mut out = Vec::new();
        let mut params = ParamVec::new();
        self.root.search(segments, &mut params, &mut out);
        out
    }
}
