use std::sync::Arc;

use replication_events::{ReplicatedOccurrence, StreamEvent};
use tracing::debug;

use crate::{Delivery, EventContext, StreamEventFacade};

/// Result of offering a received notification to the bridge.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplayOutcome {
    /// Delivered to local listeners.
    Replayed(Delivery),
    /// Not marked as replicated, so it is not a replay.
    NotReplicated,
    /// Created on this node; its local delivery already happened.
    LocalOrigin,
}

/// Replays notifications received from other nodes into the local facade.
pub struct StreamReplayBridge {
    facade: Arc<StreamEventFacade>,
    local_node: String,
}

impl StreamReplayBridge {
    /// Creates a bridge for the node `local_node`.
    pub fn new(facade: Arc<StreamEventFacade>, local_node: impl Into<String>) -> Self {
        Self {
            facade,
            local_node: local_node.into(),
        }
    }

    /// Replays the notification if it is replicated and came from another node.
    pub fn on_replicated_stream_event(&self, event: &StreamEvent) -> ReplayOutcome {
        if !event.already_replicated() {
            debug!(
                event = event.kind.simple_name(),
                "ignoring stream event not marked as replicated"
            );
            return ReplayOutcome::NotReplicated;
        }
        if event.originating_node() == self.local_node {
            debug!(event = event.kind.simple_name(), "ignoring stream event from the local node");
            return ReplayOutcome::LocalOrigin;
        }

        let context = EventContext::replayed(event.originating_node());
        ReplayOutcome::Replayed(self.facade.fire(event, &context))
    }
}
