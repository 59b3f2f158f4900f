//! Activity stream delivery and the loop-breaking bridge.
//!
//! Notifications fired on this node pass through [`StreamEventFacade`], which
//! queues them for replication and delivers them via the visibility-filtered
//! [`EventBroker`]. Notifications received from other nodes are replayed through
//! [`StreamReplayBridge`] into the same facade without being queued again.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bridge;
mod broker;
mod context;
mod error;
mod facade;
mod feed;
mod visibility;

pub use bridge::{ReplayOutcome, StreamReplayBridge};
pub use broker::{Delivery, EventBroker, ListenerId, StreamListener, UserScopedListener};
pub use context::EventContext;
pub use error::{Error, Result};
pub use facade::StreamEventFacade;
pub use feed::{SkipReason, StreamEventsFeed};
pub use visibility::{AllowAll, EventScope, PermissionBackend, Principal};
