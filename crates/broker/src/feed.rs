use replication_config::ReplicationConfig;
use replication_events::{ReplicatedOccurrence, StreamEvent};
use replication_outgoing::FeedContext;
use tracing::trace;

/// Why a notification stays local.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Replication is turned off on this node.
    Disabled,
    /// The notification has already been replicated.
    AlreadyReplicated,
    /// The kind is node-local by nature.
    NeverReplicate,
    /// The kind is listed in the configured skip-list.
    SkipListed,
}

/// Queues locally fired stream notifications for replication.
#[derive(Clone)]
pub struct StreamEventsFeed {
    context: FeedContext,
    skip_events: Vec<String>,
}

impl StreamEventsFeed {
    /// Creates the feed with the skip-list from `config`.
    #[must_use]
    pub fn new(context: FeedContext, config: &ReplicationConfig) -> Self {
        Self {
            context,
            skip_events: config.stream.skip_events.clone(),
        }
    }

    /// Decides whether a notification is replicated, and if not, why.
    #[must_use]
    pub fn skip_reason(&self, event: &StreamEvent) -> Option<SkipReason> {
        let name = event.kind.simple_name();
        if !self.context.is_enabled() {
            Some(SkipReason::Disabled)
        } else if event.already_replicated() {
            Some(SkipReason::AlreadyReplicated)
        } else if event.kind.never_replicate() {
            Some(SkipReason::NeverReplicate)
        } else if self.skip_events.iter().any(|skipped| skipped.eq_ignore_ascii_case(name)) {
            Some(SkipReason::SkipListed)
        } else {
            None
        }
    }

    /// Queues a copy of the notification marked as replicated.
    pub fn queue(&self, event: &StreamEvent) {
        let mut outgoing = event.clone();
        outgoing.set_already_replicated(true);
        trace!(
            event = event.kind.simple_name(),
            destination = event.destination(),
            "queueing stream event"
        );
        self.context.replicate(outgoing);
    }
}
