//! Outgoing side of the replicated event pipeline.
//!
//! Envelopes queued by the feeds are staged into one append-only file per
//! destination and published with an atomic rename once a batching threshold
//! is hit, for the external transport to pick up.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
pub mod feeds;
mod naming;
mod scheduler;
mod writer;

pub use error::{Error, Result};
pub use feeds::{
    AccountIndexEventsFeed, CacheEventsFeed, FeedContext, IndexEventsFeed, ProjectEventsFeed,
    ProjectIndexEventsFeed,
};
pub use naming::{StagingFileName, destination_hash};
pub use scheduler::{OutgoingQueue, OutgoingScheduler};
pub use writer::{PersistedEventWriter, WriterSettings};
