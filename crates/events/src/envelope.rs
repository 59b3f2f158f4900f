use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Error, EventMeta, Origin, ReplicatedEvent, ReplicatedOccurrence, Result};

/// Unit of replication: a serialised payload plus its routing information.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Envelope {
    /// JSON body of the payload.
    pub payload: String,
    /// Name of the payload type, used to rebuild it on the receiving node.
    pub type_name: String,
    /// Destination project, `None` for account and group events.
    pub destination: Option<String>,
    /// Category of the occurrence.
    pub origin: Origin,
    /// Node the occurrence was created on.
    pub originating_node: String,
    /// Wall-clock creation time in milliseconds.
    pub event_timestamp: i64,
    /// Monotonic tie-breaker.
    pub event_nano_time: i64,
}

#[derive(Deserialize)]
struct WireEnvelope {
    payload: String,
    type_name: String,
    #[serde(default)]
    destination: Option<String>,
    origin: String,
    originating_node: String,
    event_timestamp: i64,
    event_nano_time: i64,
}

impl Envelope {
    /// Wraps a payload, copying its stamping metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised.
    pub fn wrap(event: &ReplicatedEvent) -> Result<Self> {
        Ok(Self {
            payload: event.payload_json()?,
            type_name: event.type_name().to_string(),
            destination: event.destination().map(str::to_string),
            origin: event.origin(),
            originating_node: event.originating_node().to_string(),
            event_timestamp: event.event_timestamp(),
            event_nano_time: event.event_nano_time(),
        })
    }

    /// Rebuilds the typed payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the type name is unknown for the origin or the body does not decode.
    pub fn decode(&self) -> Result<ReplicatedEvent> {
        ReplicatedEvent::decode(self.origin, &self.type_name, &self.payload)
    }

    /// Destination the envelope is staged under.
    #[must_use]
    pub fn staging_destination(&self) -> &str {
        self.destination.as_deref().unwrap_or(crate::ALL_USERS)
    }

    /// Serialises the envelope as a single JSON line, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialize("failed to serialise envelope", e))
    }

    /// Parses one JSON line written by [`Envelope::to_json_line`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOrigin`] when the origin is not known to this
    /// node and [`Error::MalformedEnvelope`] when the line does not parse.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_str(line).map_err(Error::MalformedEnvelope)?;
        Ok(Self {
            payload: wire.payload,
            type_name: wire.type_name,
            destination: wire.destination,
            origin: wire.origin.parse()?,
            originating_node: wire.originating_node,
            event_timestamp: wire.event_timestamp,
            event_nano_time: wire.event_nano_time,
        })
    }
}

/// Stamps new occurrences with the local node identity and creation times.
#[derive(Clone, Debug)]
pub struct EnvelopeFactory {
    node_id: Arc<str>,
    epoch: Instant,
    last_nano: Arc<AtomicI64>,
}

impl EnvelopeFactory {
    /// Creates a factory for the given node.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Arc::from(node_id.into()),
            epoch: Instant::now(),
            last_nano: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Local node identity.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Fresh metadata for an occurrence created now on this node.
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        EventMeta::new(self.node_id.as_ref(), Utc::now().timestamp_millis(), self.next_nano())
    }

    fn next_nano(&self) -> i64 {
        let elapsed = i64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX);
        let previous = self
            .last_nano
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(elapsed.max(last + 1)))
            .unwrap_or_else(|last| last);
        elapsed.max(previous + 1)
    }
}
