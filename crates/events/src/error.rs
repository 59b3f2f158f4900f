use thiserror::Error;

use crate::Origin;

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or decoding envelopes.
#[derive(Debug, Error)]
pub enum Error {
    /// The envelope line was not valid JSON or lacked required fields.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The payload could not be decoded into its declared type.
    #[error("failed to decode {type_name} payload: {source}")]
    Payload {
        /// Declared payload type name.
        type_name: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialised.
    #[error("{0}: {1}")]
    Serialize(&'static str, #[source] serde_json::Error),

    /// The origin named in the envelope is not known to this node.
    #[error("unknown origin `{0}`")]
    UnknownOrigin(String),

    /// The payload type name is not valid for the envelope's origin.
    #[error("unknown payload type `{type_name}` for origin {origin}")]
    UnknownPayloadType {
        /// Origin of the envelope.
        origin: Origin,
        /// Payload type name found in the envelope.
        type_name: String,
    },
}
