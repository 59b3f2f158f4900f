//! Incoming side of the replicated event pipeline.
//!
//! Published files delivered by the transport are read back in order, each
//! envelope is routed by its origin to the one subscribed processor, and the
//! processor applies the effect locally.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cache_watch;
pub mod capabilities;
mod error;
pub mod processors;
mod reader;
mod registry;
mod scheduler;

pub use cache_watch::CacheWatchTable;
pub use capabilities::{
    AccountIndexer, ChangeIndexer, GroupIndexer, ProjectIndexer, ReplicatedCache, RepositoryManager,
};
pub use error::{CapabilityError, Error, Result};
pub use reader::{FileReport, IncomingEventReader, IncomingFile, list_published};
pub use registry::{ProcessorRegistry, ReplicatedEventProcessor};
pub use scheduler::IncomingScheduler;
