mod common;

use std::sync::Arc;

use common::{RecordingListener, comment_added, shared};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use replication_broker::{
    Delivery, Error, EventBroker, EventContext, EventScope, PermissionBackend, Principal, Result,
    StreamListener, UserScopedListener,
};
use replication_events::StreamEvent;

struct ChangeAcl {
    readable: Vec<(u32, u32)>,
    broken: bool,
}

impl PermissionBackend for ChangeAcl {
    fn can_read_project(&self, _principal: &Principal, _project: &str) -> Result<bool> {
        Ok(true)
    }

    fn can_read_change(&self, principal: &Principal, _project: &str, number: u32) -> Result<bool> {
        if self.broken {
            return Err(Error::PermissionCheck("backend unavailable".to_string()));
        }
        Ok(match principal {
            Principal::Internal => true,
            Principal::User { account_id } => self.readable.contains(&(*account_id, number)),
        })
    }

    fn can_read_ref(
        &self,
        _principal: &Principal,
        _project: &str,
        _ref_name: &str,
    ) -> Result<bool> {
        Ok(true)
    }
}

struct ScopedListener {
    account_id: u32,
    inner: RecordingListener,
}

impl StreamListener for ScopedListener {
    fn on_stream_event(&self, event: &StreamEvent, context: &EventContext) {
        self.inner.on_stream_event(event, context);
    }
}

impl UserScopedListener for ScopedListener {
    fn principal(&self) -> Principal {
        Principal::User { account_id: self.account_id }
    }
}

fn setup(
    readable: Vec<(u32, u32)>,
    broken: bool,
) -> (EventBroker, Arc<RecordingListener>, Arc<ScopedListener>) {
    let broker = EventBroker::new(Arc::new(ChangeAcl { readable, broken }));
    let unrestricted = shared(RecordingListener::default());
    let scoped = shared(ScopedListener { account_id: 1000, inner: RecordingListener::default() });
    broker.register_listener(unrestricted.clone());
    broker.register_user_scoped(scoped.clone());
    (broker, unrestricted, scoped)
}

#[test]
fn test_invisible_change_reaches_only_unrestricted_listeners() {
    let (broker, unrestricted, scoped) = setup(vec![], false);
    let event = comment_added("node-a", 1);

    let delivery = broker.post_event(
        &event,
        &EventScope::of(&event),
        &EventContext::local(Principal::Internal),
    );

    assert_eq!(delivery, Delivery { delivered: 1, filtered: 1, failed: 0 });
    assert_eq!(unrestricted.count(), 1);
    assert_eq!(scoped.inner.count(), 0);
}

#[test]
fn test_visible_change_reaches_both() {
    let (broker, unrestricted, scoped) = setup(vec![(1000, 17)], false);
    let event = comment_added("node-a", 1);

    broker.post_event(&event, &EventScope::of(&event), &EventContext::local(Principal::Internal));

    assert_eq!(unrestricted.count(), 1);
    assert_eq!(scoped.inner.count(), 1);
}

#[tracing_test::traced_test]
#[test]
fn test_failing_check_counts_as_not_visible() {
    let (broker, unrestricted, scoped) = setup(vec![(1000, 17)], true);
    let event = comment_added("node-a", 1);

    let delivery = broker.post_event(
        &event,
        &EventScope::of(&event),
        &EventContext::local(Principal::Internal),
    );

    assert_eq!(delivery.filtered, 1);
    assert_eq!(unrestricted.count(), 1);
    assert_eq!(scoped.inner.count(), 0);
    assert!(logs_contain("treating as not visible"));
}

struct Panicking;

impl StreamListener for Panicking {
    fn on_stream_event(&self, _event: &StreamEvent, _context: &EventContext) {
        panic!("listener bug");
    }
}

struct Ordered {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl StreamListener for Ordered {
    fn on_stream_event(&self, _event: &StreamEvent, _context: &EventContext) {
        self.log.lock().push(self.label);
    }
}

#[test]
fn test_listeners_run_in_order_and_are_isolated() {
    let broker = EventBroker::new(Arc::new(replication_broker::AllowAll));
    let log = Arc::new(Mutex::new(Vec::new()));
    broker.register_listener(Arc::new(Ordered { label: "first", log: log.clone() }));
    broker.register_listener(Arc::new(Panicking));
    let last = broker.register_listener(Arc::new(Ordered { label: "last", log: log.clone() }));
    let event = comment_added("node-a", 1);

    let delivery =
        broker.post_event(&event, &EventScope::None, &EventContext::local(Principal::Internal));

    assert_eq!(delivery, Delivery { delivered: 2, filtered: 0, failed: 1 });
    assert_eq!(*log.lock(), vec!["first", "last"]);

    assert!(broker.unregister(last));
    assert!(!broker.unregister(last));
    assert_eq!(broker.listener_count(), 2);
}
