//! One processor per origin.

mod cache;
mod deletion;
mod index;
mod project;
mod stream;

pub use cache::CacheProcessor;
pub use deletion::{DeletionLedger, DeletionMessageProcessor};
pub use index::{
    AccountIndexProcessor, ChangeIndexProcessor, GroupIndexProcessor, ProjectIndexProcessor,
};
pub use project::ProjectProcessor;
pub use stream::StreamProcessor;

use replication_events::ReplicatedEvent;

use crate::Error;

pub(crate) const fn unexpected(processor: &'static str, event: &ReplicatedEvent) -> Error {
    Error::UnexpectedPayload {
        processor,
        type_name: event.type_name(),
    }
}
