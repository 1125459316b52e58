//! Relation maps: which instances a resolved instance references.
//!
//! Three views of the same information are used while resolving:
//! - [`OwnerRelations`]: produced by one relationship for a whole batch,
//!   owner id -> target type -> ids.
//! - [`InstanceRelations`]: stored per instance in the request cache,
//!   relationship key -> target type -> ids.
//! - [`NeededMap`]: aggregated over a batch to drive include expansion,
//!   target type -> relationship key -> ids (de-duplicated).

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

type TypedIds = IndexMap<String, Vec<String>>;

/// References produced by one relationship, grouped by owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerRelations {
    entries: HashMap<String, TypedIds>,
}

impl OwnerRelations {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` references `type_name/id`.
    pub fn add(&mut self, owner: &str, type_name: &str, id: impl Into<String>) {
        self.entries
            .entry(owner.to_string())
            .or_default()
            .entry(type_name.to_string())
            .or_default()
            .push(id.into());
    }

    /// References of one owner.
    pub fn get(&self, owner: &str) -> Option<&TypedIds> {
        self.entries.get(owner)
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// References of a single instance, by relationship key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceRelations {
    entries: IndexMap<String, TypedIds>,
}

impl InstanceRelations {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that relationship `key` references `type_name/id`.
    pub fn add(&mut self, key: &str, type_name: &str, id: impl Into<String>) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .entry(type_name.to_string())
            .or_default()
            .push(id.into());
    }

    /// Record every reference of `targets` under `key`.
    pub fn extend(&mut self, key: &str, targets: &TypedIds) {
        for (type_name, ids) in targets {
            for id in ids {
                self.add(key, type_name, id.clone());
            }
        }
    }

    /// References of one relationship.
    pub fn get(&self, key: &str) -> Option<&TypedIds> {
        self.entries.get(key)
    }

    /// Iterate over relationship keys and their references.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedIds)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check if the instance references nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ids still to be resolved, by target type and relationship key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeededMap {
    entries: IndexMap<String, IndexMap<String, IndexSet<String>>>,
}

impl NeededMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one instance's references.
    pub fn merge(&mut self, relations: &InstanceRelations) {
        for (key, targets) in relations.iter() {
            for (type_name, ids) in targets {
                let slot = self
                    .entries
                    .entry(type_name.clone())
                    .or_default()
                    .entry(key.to_string())
                    .or_default();
                slot.extend(ids.iter().cloned());
            }
        }
    }

    /// Ids of `type_name` reached through `key`.
    pub fn get(&self, type_name: &str, key: &str) -> Option<&IndexSet<String>> {
        self.entries.get(type_name).and_then(|keys| keys.get(key))
    }

    /// Every `(target type, ids)` pair reached through `key`.
    pub fn targets_for(&self, key: &str) -> Vec<(&str, Vec<String>)> {
        self.entries
            .iter()
            .filter_map(|(type_name, keys)| {
                keys.get(key)
                    .filter(|ids| !ids.is_empty())
                    .map(|ids| (type_name.as_str(), ids.iter().cloned().collect()))
            })
            .collect()
    }

    /// Iterate over target types.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Check if nothing is needed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
