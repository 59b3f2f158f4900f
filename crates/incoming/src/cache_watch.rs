use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::ReplicatedCache;

/// Caches that can be invalidated by replicated cache events, by name.
#[derive(Default)]
pub struct CacheWatchTable {
    caches: DashMap<String, Arc<dyn ReplicatedCache>>,
}

impl CacheWatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Watches a cache under `name`. The first registration for a name wins.
    pub fn watch(&self, name: impl Into<String>, cache: Arc<dyn ReplicatedCache>) -> bool {
        match self.caches.entry(name.into()) {
            Entry::Occupied(existing) => {
                warn!(cache = %existing.key(), "cache is already watched");
                false
            }
            Entry::Vacant(slot) => {
                debug!(cache = %slot.key(), "watching cache");
                slot.insert(cache);
                true
            }
        }
    }

    /// Cache watched under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ReplicatedCache>> {
        self.caches.get(name).map(|entry| entry.value().clone())
    }

    /// Number of watched caches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Forgets every cache.
    pub fn clear(&self) {
        self.caches.clear();
    }
}
