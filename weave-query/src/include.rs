//! Include trees parsed from `include=author,chapters.reviewer`.

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::model::{ModelDescriptor, Registry};
use crate::relations::Targets;

/// Relationship key -> nested include tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: IndexMap<String, IncludeTree>,
}

impl IncludeTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of dotted paths.
    pub fn parse(raw: &str) -> QueryResult<Self> {
        let mut tree = Self::new();
        for path in raw.split(',').map(str::trim) {
            if path.is_empty() {
                continue;
            }
            let mut node = &mut tree;
            for segment in path.split('.') {
                if segment.is_empty() {
                    return Err(QueryError::invalid_include(path, "empty path segment"));
                }
                node = node.children.entry(segment.to_string()).or_default();
            }
        }
        Ok(tree)
    }

    /// Builder form: include `path` (dotted).
    pub fn with(mut self, path: &str) -> Self {
        let mut node = &mut self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        self
    }

    /// Check that every key names a relationship of the model at its level.
    ///
    /// Below a polymorphic relationship the target is only known per
    /// instance, so those sub-trees are checked when they are expanded.
    pub fn validate(&self, model: &ModelDescriptor, registry: &Registry) -> QueryResult<()> {
        self.validate_at(model, registry, "")
    }

    fn validate_at(
        &self,
        model: &ModelDescriptor,
        registry: &Registry,
        prefix: &str,
    ) -> QueryResult<()> {
        for (key, child) in &self.children {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            let rel = model.relationship(key).ok_or_else(|| {
                QueryError::invalid_include(
                    &path,
                    format!("{} has no relationship named {}", model.type_name(), key),
                )
            })?;
            if let Targets::One(target) = rel.targets() {
                child.validate_at(registry.model(target)?, registry, &path)?;
            }
        }
        Ok(())
    }

    /// Keep only the keys that are relationships of `model`.
    pub fn prune_for(&self, model: &ModelDescriptor) -> Self {
        Self {
            children: self
                .children
                .iter()
                .filter(|(key, _)| model.relationship(key).is_some())
                .map(|(key, child)| (key.clone(), child.clone()))
                .collect(),
        }
    }

    /// Sub-tree under `key`.
    pub fn child(&self, key: &str) -> Option<&IncludeTree> {
        self.children.get(key)
    }

    /// Top-level keys in request order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Check if nothing is included.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}
