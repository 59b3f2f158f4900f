use std::path::PathBuf;

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The node identity is empty.
    #[error("node_id must not be empty")]
    MissingNodeId,

    /// A batching threshold is out of range.
    #[error("invalid threshold `{name}`: {reason}")]
    InvalidThreshold {
        /// Setting name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A worker pool size is zero.
    #[error("worker pool `{0}` must have at least one worker")]
    InvalidPoolSize(&'static str),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be serialised.
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
