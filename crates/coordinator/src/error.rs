use std::path::PathBuf;

use thiserror::Error;

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling or running the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The coordinator is already running, or has been stopped.
    #[error("coordinator already started")]
    AlreadyStarted,

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] replication_config::Error),

    /// A staging directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The incoming side failed.
    #[error(transparent)]
    Incoming(#[from] replication_incoming::Error),

    /// The coordinator is not running.
    #[error("coordinator is not running")]
    NotRunning,

    /// The outgoing side failed.
    #[error(transparent)]
    Outgoing(#[from] replication_outgoing::Error),

    /// A global tracing subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
}
