//! Request-scoped instance cache.
//!
//! One cache lives for one external request. An entry is written once, when
//! an instance has all of its relationship values attached, and is never
//! overwritten or invalidated afterwards. Concurrent resolvers racing on the
//! same `(type, id)` both get the first stored instance back.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::instance::Instance;
use crate::relation_map::InstanceRelations;

/// A cached instance together with its relation map.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The canonical instance.
    pub instance: Arc<Instance>,
    /// What the instance references.
    pub relations: Arc<InstanceRelations>,
}

/// Cache usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries written.
    pub stores: u64,
    /// Store calls that lost to an existing entry.
    pub duplicates: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    instances: HashMap<(String, String), Arc<Instance>>,
    relations: HashMap<(String, String), Arc<InstanceRelations>>,
    stats: CacheStats,
}

/// Per-request memo of resolved instances.
///
/// A single lock guards both tables since they are written together.
#[derive(Debug, Default)]
pub struct RequestCache {
    state: Mutex<CacheState>,
}

impl RequestCache {
    /// Create an empty cache for a new request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance and its relation map.
    ///
    /// Returns the canonical entry: the one already present if another
    /// resolver stored this `(type, id)` first.
    pub fn store(&self, instance: Instance, relations: InstanceRelations) -> CacheEntry {
        let key = (instance.type_name().to_string(), instance.id().to_string());
        let mut state = self.state.lock();

        if let (Some(existing), Some(existing_relations)) =
            (state.instances.get(&key), state.relations.get(&key))
        {
            let entry = CacheEntry {
                instance: Arc::clone(existing),
                relations: Arc::clone(existing_relations),
            };
            state.stats.duplicates += 1;
            trace!(r#type = %key.0, id = %key.1, "Cache entry already present");
            return entry;
        }

        let entry = CacheEntry {
            instance: Arc::new(instance),
            relations: Arc::new(relations),
        };
        state.instances.insert(key.clone(), Arc::clone(&entry.instance));
        state.relations.insert(key, Arc::clone(&entry.relations));
        state.stats.stores += 1;
        entry
    }

    /// Look up an instance.
    pub fn get(&self, type_name: &str, id: &str) -> Option<CacheEntry> {
        let key = (type_name.to_string(), id.to_string());
        let mut state = self.state.lock();
        let found = match (state.instances.get(&key), state.relations.get(&key)) {
            (Some(instance), Some(relations)) => Some(CacheEntry {
                instance: Arc::clone(instance),
                relations: Arc::clone(relations),
            }),
            _ => None,
        };
        if found.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        found
    }

    /// Check for an entry without touching the counters.
    pub fn contains(&self, type_name: &str, id: &str) -> bool {
        self.state
            .lock()
            .instances
            .contains_key(&(type_name.to_string(), id.to_string()))
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }
}
