use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use replication_events::{ReplicatedOccurrence, StreamEvent};
use tracing::debug;

use crate::{Delivery, EventBroker, EventContext, EventScope, StreamEventsFeed};

/// Identity of one occurrence across clones.
type OccurrenceId = (String, i64, i64);

fn occurrence_id(event: &StreamEvent) -> OccurrenceId {
    (event.originating_node().to_string(), event.event_timestamp(), event.event_nano_time())
}

/// Single entry point for firing activity stream notifications.
///
/// Locally fired notifications are queued for replication unless they are
/// already replicated, never-replicate, or skip-listed, then delivered through
/// the broker. Replayed notifications arrive here too and are only delivered.
pub struct StreamEventFacade {
    broker: Arc<EventBroker>,
    feed: StreamEventsFeed,
    firing: Mutex<HashSet<OccurrenceId>>,
}

struct FiringGuard<'a> {
    firing: &'a Mutex<HashSet<OccurrenceId>>,
    id: OccurrenceId,
}

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        self.firing.lock().remove(&self.id);
    }
}

impl StreamEventFacade {
    /// Creates a facade over `broker` that queues through `feed`.
    #[must_use]
    pub fn new(broker: Arc<EventBroker>, feed: StreamEventsFeed) -> Self {
        Self {
            broker,
            feed,
            firing: Mutex::new(HashSet::new()),
        }
    }

    /// Broker the facade delivers through.
    #[must_use]
    pub const fn broker(&self) -> &Arc<EventBroker> {
        &self.broker
    }

    /// Fires a notification.
    ///
    /// The local copy keeps its replicated flag as given. If a listener fires
    /// the same occurrence again while it is being delivered, it is delivered
    /// but not queued a second time.
    pub fn fire(&self, event: &StreamEvent, context: &EventContext) -> Delivery {
        let id = occurrence_id(event);
        let reentrant = !self.firing.lock().insert(id.clone());
        let _guard = (!reentrant).then(|| FiringGuard {
            firing: &self.firing,
            id,
        });

        if reentrant {
            debug!(event = event.kind.simple_name(), "re-entrant fire, not queueing again");
        } else {
            match self.feed.skip_reason(event) {
                None => self.feed.queue(event),
                Some(reason) => {
                    debug!(event = event.kind.simple_name(), ?reason, "stream event stays local");
                }
            }
        }

        self.broker.post_event(event, &EventScope::of(event), context)
    }
}
