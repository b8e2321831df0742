//! Declarative route configuration and the immutable route table.

use crate::error::{NavError, NavResult};
use std::collections::HashMap;
use std::sync::Arc;

/// One node of the declarative route configuration.
///
/// Consumed once by [`RouteTable::build`]; names are derived from the nesting
/// (`root.home_layout.index`), so the configuration only carries segments.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Human-readable title.
    pub title: String,
    /// Pathname pattern, unique across the whole tree.
    pub pathname: String,
    /// Whether this node (and thereby its subtree) requires an
    /// authenticated session.
    pub needs_auth: bool,
    /// Child segment → child configuration, in declaration order.
    pub children: Vec<(String, RouteSpec)>,
}

impl RouteSpec {
    /// Build a leaf configuration node.
    #[must_use]
    pub fn new(title: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pathname: pathname.into(),
            needs_auth: false,
            children: Vec::new(),
        }
    }

    /// Mark this node as requiring authentication.
    #[must_use]
    pub const fn protected(mut self) -> Self {
        self.needs_auth = true;
        self
    }

    /// Append a child node under the given segment.
    #[must_use]
    pub fn child(mut self, segment: impl Into<String>, spec: Self) -> Self {
        self.children.push((segment.into(), spec));
        self
    }
}

/// Immutable node of the flattened route tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    /// Unique dot-path name, e.g. `root.home_layout.index`.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Pathname pattern.
    pub pathname: String,
    /// Name of the parent node; `None` for the root.
    pub parent: Option<String>,
    /// Names of the child nodes, in declaration order.
    pub children: Vec<String>,
    /// Whether this node requires an authenticated session.
    pub needs_auth: bool,
}

/// Static route tree built once from the declarative configuration.
#[derive(Debug, Clone)]
pub struct RouteTable {
    nodes: HashMap<String, Arc<RouteNode>>,
    by_pathname: HashMap<String, String>,
    root: String,
    not_found: String,
}

impl RouteTable {
    /// Flatten a configuration tree into an immutable table.
    ///
    /// `root_segment` names the root node; `not_found` is the dot-path of the
    /// route used when resolution fails.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::DuplicatePathname`] when two nodes share a
    /// pathname and [`NavError::UnknownRoute`] when `not_found` does not name
    /// a configured node.
    pub fn build(root_segment: &str, spec: RouteSpec, not_found: &str) -> NavResult<Self> {
        let mut nodes = HashMap::new();
        let mut by_pathname = HashMap::new();
        flatten(root_segment, None, &spec, &mut nodes, &mut by_pathname)?;
        if !nodes.contains_key(not_found) {
            return Err(NavError::UnknownRoute {
                name: not_found.to_string(),
            });
        }
        Ok(Self {
            nodes,
            by_pathname,
            root: root_segment.to_string(),
            not_found: not_found.to_string(),
        })
    }

    /// Look up a node by its dot-path name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<RouteNode>> {
        self.nodes.get(name)
    }

    /// Resolve a navigation target by name first, then by pathname.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<&Arc<RouteNode>> {
        self.nodes.get(target).or_else(|| {
            self.by_pathname
                .get(target)
                .and_then(|name| self.nodes.get(name))
        })
    }

    /// The root-to-leaf chain of nodes ending at `name`.
    #[must_use]
    pub fn chain(&self, name: &str) -> Vec<Arc<RouteNode>> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(name);
        while let Some(node) = cursor {
            chain.push(Arc::clone(node));
            cursor = node.parent.as_deref().and_then(|parent| self.nodes.get(parent));
        }
        chain.reverse();
        chain
    }

    /// Name of the root node.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Name of the configured not-found fallback.
    #[must_use]
    pub fn not_found(&self) -> &str {
        &self.not_found
    }

    /// Number of configured routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the table holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn flatten(
    segment: &str,
    parent: Option<&RouteNode>,
    spec: &RouteSpec,
    nodes: &mut HashMap<String, Arc<RouteNode>>,
    by_pathname: &mut HashMap<String, String>,
) -> NavResult<()> {
    let name = parent.map_or_else(
        || segment.to_string(),
        |parent| format!("{}.{segment}", parent.name),
    );
    // Auth requirements inherit down the tree.
    let needs_auth = spec.needs_auth || parent.is_some_and(|parent| parent.needs_auth);
    let node = RouteNode {
        name: name.clone(),
        title: spec.title.clone(),
        pathname: spec.pathname.clone(),
        parent: parent.map(|parent| parent.name.clone()),
        children: spec
            .children
            .iter()
            .map(|(child_segment, _)| format!("{name}.{child_segment}"))
            .collect(),
        needs_auth,
    };
    if let Some(previous) = by_pathname.insert(spec.pathname.clone(), name.clone()) {
        tracing::error!(pathname = %spec.pathname, previous = %previous, "duplicate route pathname");
        return Err(NavError::DuplicatePathname {
            pathname: spec.pathname.clone(),
        });
    }
    for (child_segment, child_spec) in &spec.children {
        flatten(child_segment, Some(&node), child_spec, nodes, by_pathname)?;
    }
    nodes.insert(name, Arc::new(node));
    Ok(())
}
