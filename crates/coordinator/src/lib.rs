//! Assembles one node's replicated event pipeline.
//!
//! [`ReplicatedEventsCoordinator`] wires the outgoing scheduler, the feeds, the
//! stream facade and broker, the processor registry and the incoming scheduler
//! from a [`ReplicationConfig`](replication_config::ReplicationConfig) and the
//! application's [`Capabilities`], and drives their start and stop order.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod capabilities;
mod coordinator;
mod error;
mod logging;

pub use capabilities::Capabilities;
pub use coordinator::{Feeds, ReplicatedEventsCoordinator};
pub use error::{Error, Result};
pub use logging::init_tracing;
