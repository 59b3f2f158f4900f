//! Envelope and origin model for replicated events.
//!
//! Every state-changing occurrence that must be mirrored on the other nodes of
//! a cluster is described by one of the payload types in this crate, wrapped in
//! an [`Envelope`] carrying its [`Origin`], destination and stamping metadata.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod cache;
mod envelope;
mod error;
mod index;
mod meta;
mod origin;
mod payload;
mod project;
mod stream;

pub use cache::{CacheEvent, CacheOperation};
pub use envelope::{Envelope, EnvelopeFactory};
pub use error::{Error, Result};
pub use index::{AccountIndexEvent, ChangeIndexEvent, GroupIndexEvent, ProjectIndexEvent};
pub use meta::{EventMeta, ReplicatedOccurrence};
pub use origin::Origin;
pub use payload::ReplicatedEvent;
pub use project::{DeleteProjectChangesEvent, DeleteProjectEvent, DeleteProjectMessage};
pub use stream::{Approval, ChangeAttribute, StreamEvent, StreamEventKind};

/// Destination used for account and group events, which have no project of their own.
pub const ALL_USERS: &str = "All-Users";

/// Destination used for project-wide events that are not tied to a single project.
pub const ALL_PROJECTS: &str = "All-Projects";
