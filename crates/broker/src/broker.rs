use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use replication_events::StreamEvent;
use tracing::{debug, error};

use crate::visibility::is_visible;
use crate::{EventContext, EventScope, PermissionBackend, Principal};

/// Receives activity stream notifications.
pub trait StreamListener: Send + Sync {
    /// Called once per delivered notification.
    fn on_stream_event(&self, event: &StreamEvent, context: &EventContext);
}

/// A listener acting on behalf of one principal. It only receives
/// notifications that principal is allowed to see.
pub trait UserScopedListener: StreamListener {
    /// Principal whose permissions filter deliveries.
    fn principal(&self) -> Principal;
}

/// Handle returned on registration, used to remove the listener again.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(u64);

enum Registration {
    Unrestricted(Arc<dyn StreamListener>),
    UserScoped {
        scoped: Arc<dyn UserScopedListener>,
        listener: Arc<dyn StreamListener>,
    },
}

/// Outcome of one [`EventBroker::post_event`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Delivery {
    /// Listeners that received the notification.
    pub delivered: usize,
    /// User-scoped listeners excluded by the visibility check.
    pub filtered: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// Fans notifications out to in-process listeners, in registration order.
pub struct EventBroker {
    permissions: Arc<dyn PermissionBackend>,
    listeners: RwLock<Vec<(ListenerId, Registration)>>,
    next_id: AtomicU64,
}

impl EventBroker {
    /// Creates a broker that checks visibility with `permissions`.
    #[must_use]
    pub fn new(permissions: Arc<dyn PermissionBackend>) -> Self {
        Self {
            permissions,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener that receives every notification.
    pub fn register_listener(&self, listener: Arc<dyn StreamListener>) -> ListenerId {
        self.register(Registration::Unrestricted(listener))
    }

    /// Registers a listener that only receives what its principal can see.
    pub fn register_user_scoped<L>(&self, listener: Arc<L>) -> ListenerId
    where
        L: UserScopedListener + 'static,
    {
        self.register(Registration::UserScoped {
            scoped: listener.clone(),
            listener,
        })
    }

    fn register(&self, registration: Registration) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, registration));
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers a notification to every listener allowed to see it.
    ///
    /// A failed visibility check counts as "not visible". A panicking listener
    /// is logged and does not stop delivery to the ones after it.
    pub fn post_event(
        &self,
        event: &StreamEvent,
        scope: &EventScope,
        context: &EventContext,
    ) -> Delivery {
        let mut delivery = Delivery::default();

        // Listeners run outside the lock so they may register or fire re-entrantly.
        let targets: Vec<Arc<dyn StreamListener>> = self
            .listeners
            .read()
            .iter()
            .filter_map(|(_, registration)| match registration {
                Registration::Unrestricted(listener) => Some(listener.clone()),
                Registration::UserScoped { scoped, listener } => {
                    if self.visible_to(&scoped.principal(), scope) {
                        Some(listener.clone())
                    } else {
                        delivery.filtered += 1;
                        None
                    }
                }
            })
            .collect();

        if delivery.filtered > 0 {
            debug!(
                event = event.kind.simple_name(),
                filtered = delivery.filtered,
                "listeners filtered by visibility"
            );
        }

        for listener in targets {
            match catch_unwind(AssertUnwindSafe(|| listener.on_stream_event(event, context))) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => {
                    delivery.failed += 1;
                    error!(event = event.kind.simple_name(), "stream listener panicked");
                }
            }
        }

        delivery
    }

    fn visible_to(&self, principal: &Principal, scope: &EventScope) -> bool {
        match is_visible(self.permissions.as_ref(), principal, scope) {
            Ok(visible) => visible,
            Err(e) => {
                debug!(
                    ?principal,
                    ?scope,
                    error = %e,
                    "visibility check failed, treating as not visible"
                );
                false
            }
        }
    }
}
