use std::sync::Arc;

use async_trait::async_trait;
use replication_broker::{ReplayOutcome, StreamReplayBridge};
use replication_events::{Origin, ReplicatedEvent, ReplicatedOccurrence};
use tracing::debug;

use super::unexpected;
use crate::{ReplicatedEventProcessor, Result};

/// Replays activity stream notifications from other nodes to local listeners.
pub struct StreamProcessor {
    bridge: Arc<StreamReplayBridge>,
}

impl StreamProcessor {
    /// Creates the processor.
    #[must_use]
    pub const fn new(bridge: Arc<StreamReplayBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for StreamProcessor {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn origin(&self) -> Origin {
        Origin::StreamEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let mut event = match event {
            ReplicatedEvent::Stream(event) => event,
            other => return Err(unexpected(self.name(), &other)),
        };

        // Whatever the sender wrote, a received notification must never be queued again.
        event.set_already_replicated(true);

        match self.bridge.on_replicated_stream_event(&event) {
            ReplayOutcome::Replayed(delivery) => {
                debug!(
                    event = event.kind.simple_name(),
                    from = event.originating_node(),
                    ?delivery,
                    "replayed stream event"
                );
            }
            outcome => {
                debug!(event = event.kind.simple_name(), ?outcome, "stream event not replayed");
            }
        }
        Ok(())
    }
}
