use std::path::PathBuf;

use replication_events::Origin;
use thiserror::Error;

/// Result type for incoming operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an application capability.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    /// Creates an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised while reading and applying incoming events.
#[derive(Debug, Error)]
pub enum Error {
    /// A processor is already subscribed to the origin.
    #[error("a processor is already subscribed to {0}")]
    AlreadySubscribed(Origin),

    /// The incoming scheduler is already running.
    #[error("incoming scheduler already started")]
    AlreadyStarted,

    /// A capability failed while applying an event.
    #[error("{origin} event could not be applied: {source}")]
    Capability {
        /// Origin of the event.
        origin: Origin,
        /// Error reported by the capability.
        #[source]
        source: CapabilityError,
    },

    /// The envelope or its payload could not be decoded.
    #[error(transparent)]
    Envelope(#[from] replication_events::Error),

    /// An incoming file operation failed.
    #[error("{operation} {path}: {source}")]
    Io {
        /// What was being done.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A typed cache operation failed or is not supported by the cache.
    #[error("failed to invoke {operation} on cache `{cache_name}`: {source}")]
    MethodInvocation {
        /// Cache name.
        cache_name: String,
        /// Operation name.
        operation: &'static str,
        /// Why it failed.
        #[source]
        source: CapabilityError,
    },

    /// No processor is subscribed to the origin.
    #[error("no processor subscribed to {0}")]
    NoProcessor(Origin),

    /// The incoming scheduler is not running.
    #[error("incoming scheduler is not running")]
    NotRunning,

    /// A processor received a payload of another origin.
    #[error("{processor} cannot handle a {type_name} payload")]
    UnexpectedPayload {
        /// Processor name.
        processor: &'static str,
        /// Payload type name received.
        type_name: &'static str,
    },

    /// The event names a cache that is not watched on this node.
    #[error("unknown cache `{0}`")]
    UnknownCache(String),
}

impl Error {
    /// Whether retrying with the same bytes cannot succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::Capability { .. })
    }
}
