mod common;

use std::sync::{Arc, Weak};

use common::{RecordingListener, RecordingQueue, comment_added, shared};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use replication_broker::{
    AllowAll, EventBroker, EventContext, Principal, ReplayOutcome, StreamEventFacade,
    StreamEventsFeed, StreamListener, StreamReplayBridge,
};
use replication_config::ReplicationConfig;
use replication_events::{
    EnvelopeFactory, EventMeta, ReplicatedOccurrence, StreamEvent, StreamEventKind,
};
use replication_outgoing::FeedContext;

struct Node {
    queue: Arc<RecordingQueue>,
    listener: Arc<RecordingListener>,
    facade: Arc<StreamEventFacade>,
    bridge: StreamReplayBridge,
}

fn node(node_id: &str, skip_events: &[&str]) -> Node {
    let mut config = ReplicationConfig::new(node_id, 10, 1_000);
    config.stream.skip_events = skip_events.iter().map(ToString::to_string).collect();
    config.normalize();

    let queue = shared(RecordingQueue::default());
    let context = FeedContext::new(EnvelopeFactory::new(node_id), queue.clone());
    let broker = shared(EventBroker::new(Arc::new(AllowAll)));
    let listener = shared(RecordingListener::default());
    broker.register_listener(listener.clone());
    let facade = shared(StreamEventFacade::new(broker, StreamEventsFeed::new(context, &config)));
    let bridge = StreamReplayBridge::new(facade.clone(), node_id);

    Node { queue, listener, facade, bridge }
}

fn user() -> EventContext {
    EventContext::local(Principal::User { account_id: 1000 })
}

#[test]
fn test_local_event_is_queued_once_and_delivered() {
    let node = node("node-a", &[]);
    let event = comment_added("node-a", 1);

    let delivery = node.facade.fire(&event, &user());

    assert_eq!(delivery.delivered, 1);
    let queued = node.queue.stream_events();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].already_replicated());
    assert!(!node.listener.seen.lock()[0].0.already_replicated());
}

struct RefiringListener {
    facade: Mutex<Weak<StreamEventFacade>>,
    fired: Mutex<u32>,
}

impl StreamListener for RefiringListener {
    fn on_stream_event(&self, event: &StreamEvent, context: &EventContext) {
        let mut fired = self.fired.lock();
        if *fired > 0 {
            return;
        }
        *fired += 1;
        drop(fired);
        if let Some(facade) = self.facade.lock().upgrade() {
            facade.fire(event, context);
        }
    }
}

#[test]
fn test_reentrant_fire_does_not_queue_twice() {
    let node = node("node-a", &[]);
    let refiring = shared(RefiringListener {
        facade: Mutex::new(Arc::downgrade(&node.facade)),
        fired: Mutex::new(0),
    });
    node.facade.broker().register_listener(refiring);

    node.facade.fire(&comment_added("node-a", 1), &user());

    assert_eq!(node.queue.stream_events().len(), 1);
    assert_eq!(node.listener.count(), 2);
}

#[test]
fn test_local_only_kinds_are_not_queued() {
    let node = node("node-a", &["commentadded"]);

    node.facade.fire(&comment_added("node-a", 1), &user());
    node.facade.fire(
        &StreamEvent::new(
            EventMeta::new("node-a", 1, 2),
            StreamEventKind::GarbageCollected { project: "ProjectA".to_string(), account_id: None },
        ),
        &user(),
    );
    let mut replicated = comment_added("node-a", 3);
    replicated.set_already_replicated(true);
    node.facade.fire(&replicated, &user());

    assert!(node.queue.envelopes.lock().is_empty());
    assert_eq!(node.listener.count(), 3);
}

#[test]
fn test_remote_event_is_replayed_but_never_requeued() {
    let a = node("node-a", &[]);
    let b = node("node-b", &[]);

    a.facade.fire(&comment_added("node-a", 1), &user());
    let mut received = a.queue.stream_events().remove(0);
    received.set_already_replicated(true);

    let outcome = b.bridge.on_replicated_stream_event(&received);

    assert!(matches!(outcome, ReplayOutcome::Replayed(delivery) if delivery.delivered == 1));
    assert!(b.queue.envelopes.lock().is_empty());
    let seen = b.listener.seen.lock();
    assert_eq!(seen[0].1, EventContext::replayed("node-a"));
    assert_eq!(seen[0].0.originating_node(), "node-a");
}

#[test]
fn test_bridge_ignores_local_and_unreplicated_events() {
    let a = node("node-a", &[]);

    let mut own = comment_added("node-a", 1);
    own.set_already_replicated(true);
    assert_eq!(a.bridge.on_replicated_stream_event(&own), ReplayOutcome::LocalOrigin);
    assert_eq!(
        a.bridge.on_replicated_stream_event(&comment_added("node-b", 2)),
        ReplayOutcome::NotReplicated
    );
    assert_eq!(a.listener.count(), 0);
}

#[test]
fn test_disabled_node_delivers_locally_only() {
    let config = ReplicationConfig::new("node-a", 10, 1_000);
    let broker = shared(EventBroker::new(Arc::new(AllowAll)));
    let listener = shared(RecordingListener::default());
    broker.register_listener(listener.clone());
    let feed =
        StreamEventsFeed::new(FeedContext::disabled(EnvelopeFactory::new("node-a")), &config);
    let facade = StreamEventFacade::new(broker, feed);

    facade.fire(&comment_added("node-a", 1), &user());

    assert_eq!(listener.count(), 1);
}
