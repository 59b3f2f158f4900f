use std::fmt;

use sha1::{Digest, Sha1};

const PREFIX: &str = "events_";
const SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";

/// Hex SHA-1 of a destination name, as used in staging file names.
#[must_use]
pub fn destination_hash(destination: &str) -> String {
    hex::encode(Sha1::digest(destination.as_bytes()))
}

/// Name of a staging file.
///
/// Rendered as `events_<timestamp>x<nano>_<node>_<destinationHash>_<contentHash>.json`.
/// The timestamp and nano parts are fixed width so names sort in creation order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagingFileName {
    /// Creation time of the first event, in milliseconds.
    pub event_timestamp: i64,
    /// Tie-breaker of the first event.
    pub event_nano_time: i64,
    /// Node that wrote the file.
    pub originating_node: String,
    /// SHA-1 of the destination name.
    pub destination_hash: String,
    /// Identity of this particular file.
    pub content_hash: String,
}

impl StagingFileName {
    /// Builds a fresh name for a file holding events for `destination`.
    #[must_use]
    pub fn new(
        destination: &str,
        originating_node: &str,
        event_timestamp: i64,
        event_nano_time: i64,
    ) -> Self {
        let identity = uuid::Uuid::new_v4();
        let mut hasher = Sha1::new();
        hasher.update(destination.as_bytes());
        hasher.update(event_timestamp.to_be_bytes());
        hasher.update(event_nano_time.to_be_bytes());
        hasher.update(identity.as_bytes());
        let content_hash = hex::encode(&hasher.finalize()[..4]);

        Self {
            event_timestamp,
            event_nano_time,
            originating_node: originating_node.to_string(),
            destination_hash: destination_hash(destination),
            content_hash,
        }
    }

    /// Name while the file is still being appended to.
    #[must_use]
    pub fn tmp_name(&self) -> String {
        format!("{self}{TMP_SUFFIX}")
    }

    /// Parses a published file name. Returns `None` for anything else, including `.tmp` files.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let body = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;

        let mut tail = body.rsplitn(3, '_');
        let content_hash = tail.next()?;
        let destination_hash = tail.next()?;
        let head = tail.next()?;

        let (composite, node) = head.split_once('_')?;
        let (timestamp, nano) = composite.split_once('x')?;

        Some(Self {
            event_timestamp: timestamp.parse().ok()?,
            event_nano_time: i64::from_str_radix(nano, 16).ok()?,
            originating_node: node.to_string(),
            destination_hash: destination_hash.to_string(),
            content_hash: content_hash.to_string(),
        })
    }
}

impl fmt::Display for StagingFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{:013}x{:016x}_{}_{}_{}{SUFFIX}",
            self.event_timestamp,
            self.event_nano_time,
            self.originating_node,
            self.destination_hash,
            self.content_hash
        )
    }
}
