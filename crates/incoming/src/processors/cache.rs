use std::sync::Arc;

use async_trait::async_trait;
use replication_config::ReplicationConfig;
use replication_events::{CacheEvent, Origin, ReplicatedEvent};
use tracing::{debug, warn};

use super::unexpected;
use crate::{CacheWatchTable, Error, ReplicatedEventProcessor, Result};

/// Evicts keys from, or runs typed operations on, watched caches.
pub struct CacheProcessor {
    caches: Arc<CacheWatchTable>,
    config: Arc<ReplicationConfig>,
}

impl CacheProcessor {
    /// Creates a processor over the watched `caches`.
    #[must_use]
    pub const fn new(caches: Arc<CacheWatchTable>, config: Arc<ReplicationConfig>) -> Self {
        Self { caches, config }
    }

    fn apply(&self, event: &CacheEvent) -> Result<()> {
        let cache = self
            .caches
            .get(&event.cache_name)
            .ok_or_else(|| Error::UnknownCache(event.cache_name.clone()))?;
        let settings = self.config.cache(&event.cache_name);

        if let Some(operation) = &event.operation {
            if !cache.supports(operation) {
                return Err(Error::MethodInvocation {
                    cache_name: event.cache_name.clone(),
                    operation: operation.name(),
                    source: crate::CapabilityError::new("operation not declared by cache"),
                });
            }
            cache.invoke(operation).map_err(|source| Error::MethodInvocation {
                cache_name: event.cache_name.clone(),
                operation: operation.name(),
                source,
            })?;
            debug!(
                cache = %event.cache_name,
                operation = operation.name(),
                "invoked cache operation"
            );
            return Ok(());
        }

        if !settings.evict {
            debug!(cache = %event.cache_name, "cache is not evicted remotely, ignoring");
            return Ok(());
        }

        cache.evict(&event.key);
        debug!(cache = %event.cache_name, key = %event.key, "evicted cache key");

        if settings.reload_on_evict {
            if let Err(e) = cache.reload(&event.key) {
                warn!(
                    cache = %event.cache_name,
                    key = %event.key,
                    error = %e,
                    "reload after eviction failed"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicatedEventProcessor for CacheProcessor {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn origin(&self) -> Origin {
        Origin::CacheEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        match &event {
            ReplicatedEvent::Cache(cache_event) => self.apply(cache_event),
            other => Err(unexpected(self.name(), other)),
        }
    }
}
