use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use replication_events::{Envelope, Origin, ReplicatedEvent};
use tracing::{debug, error};

use crate::{Error, Result};

/// Applies the replicated events of one origin on this node.
#[async_trait]
pub trait ReplicatedEventProcessor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Origin this processor handles.
    fn origin(&self) -> Origin;

    /// Applies one event.
    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()>;
}

/// Maps each origin to the single processor subscribed to it.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: DashMap<Origin, Arc<dyn ReplicatedEventProcessor>>,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `processor` to `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySubscribed`] if another processor owns the origin.
    pub fn subscribe(
        &self,
        origin: Origin,
        processor: Arc<dyn ReplicatedEventProcessor>,
    ) -> Result<()> {
        match self.processors.entry(origin) {
            Entry::Occupied(existing) => {
                error!(
                    %origin,
                    existing = existing.get().name(),
                    rejected = processor.name(),
                    "refusing second processor for origin"
                );
                Err(Error::AlreadySubscribed(origin))
            }
            Entry::Vacant(slot) => {
                debug!(%origin, processor = processor.name(), "processor subscribed");
                slot.insert(processor);
                Ok(())
            }
        }
    }

    /// Subscribes a processor to the origin it declares.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySubscribed`] if another processor owns the origin.
    pub fn subscribe_processor(&self, processor: Arc<dyn ReplicatedEventProcessor>) -> Result<()> {
        self.subscribe(processor.origin(), processor)
    }

    /// Unsubscribes `processor` from `origin` if it is the subscribed one.
    /// Returns whether anything was removed.
    pub fn unsubscribe(
        &self,
        origin: Origin,
        processor: &Arc<dyn ReplicatedEventProcessor>,
    ) -> bool {
        let removed = self
            .processors
            .remove_if(&origin, |_, subscribed| Arc::ptr_eq(subscribed, processor))
            .is_some();
        if removed {
            debug!(%origin, processor = processor.name(), "processor unsubscribed");
        }
        removed
    }

    /// Unsubscribes a processor from the origin it declares.
    pub fn stop_processor(&self, processor: &Arc<dyn ReplicatedEventProcessor>) -> bool {
        self.unsubscribe(processor.origin(), processor)
    }

    /// Removes every subscription.
    pub fn unsubscribe_all(&self) {
        self.processors.clear();
    }

    /// Processor subscribed to `origin`, if any.
    #[must_use]
    pub fn processor(&self, origin: Origin) -> Option<Arc<dyn ReplicatedEventProcessor>> {
        self.processors.get(&origin).map(|entry| entry.value().clone())
    }

    /// Whether a processor is subscribed to `origin`.
    #[must_use]
    pub fn is_subscribed(&self, origin: Origin) -> bool {
        self.processors.contains_key(&origin)
    }

    /// Routes an envelope to its processor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProcessor`] when nothing handles the origin, an
    /// envelope error when the payload cannot be rebuilt, or whatever the
    /// processor reports.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        let processor = self
            .processor(envelope.origin)
            .ok_or(Error::NoProcessor(envelope.origin))?;
        let event = envelope.decode()?;
        processor.process_incoming_replicated_event(event).await
    }
}
