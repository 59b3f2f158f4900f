use std::path::PathBuf;

use thiserror::Error;

/// Result type for outgoing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the outgoing side of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The scheduler is already running.
    #[error("outgoing scheduler already started")]
    AlreadyStarted,

    /// A writer was used after its file was published.
    #[error("staging file for `{0}` is already published")]
    AlreadyPublished(String),

    /// The staging directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The envelope could not be serialised.
    #[error(transparent)]
    Envelope(#[from] replication_events::Error),

    /// A staging file operation failed.
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

    /// The scheduler is not running.
    #[error("outgoing scheduler is not running")]
    NotRunning,

    /// The queue no longer accepts events.
    #[error("outgoing queue is closed")]
    QueueClosed,
}
