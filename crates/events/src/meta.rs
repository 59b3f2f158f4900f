use serde::{Deserialize, Serialize};

/// Stamping metadata shared by every replicated payload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventMeta {
    /// Identity of the node the occurrence was created on.
    pub originating_node: String,
    /// Wall-clock creation time, in milliseconds since the epoch.
    pub event_timestamp: i64,
    /// Monotonic tie-breaker between occurrences created in the same millisecond.
    pub event_nano_time: i64,
    /// Set once the occurrence has been queued for, or received from, replication.
    #[serde(default)]
    pub already_replicated: bool,
}

impl EventMeta {
    /// Creates metadata for an occurrence that has not been replicated yet.
    pub fn new(
        originating_node: impl Into<String>,
        event_timestamp: i64,
        event_nano_time: i64,
    ) -> Self {
        Self {
            originating_node: originating_node.into(),
            event_timestamp,
            event_nano_time,
            already_replicated: false,
        }
    }
}

/// Contract shared by every replicated payload.
pub trait ReplicatedOccurrence {
    /// Stamping metadata.
    fn meta(&self) -> &EventMeta;

    /// Mutable stamping metadata.
    fn meta_mut(&mut self) -> &mut EventMeta;

    /// Node the occurrence was created on.
    fn originating_node(&self) -> &str {
        &self.meta().originating_node
    }

    /// Wall-clock creation time in milliseconds.
    fn event_timestamp(&self) -> i64 {
        self.meta().event_timestamp
    }

    /// Monotonic tie-breaker.
    fn event_nano_time(&self) -> i64 {
        self.meta().event_nano_time
    }

    /// Whether the occurrence has already passed through replication.
    fn already_replicated(&self) -> bool {
        self.meta().already_replicated
    }

    /// Marks (or clears) the replicated flag.
    fn set_already_replicated(&mut self, replicated: bool) {
        self.meta_mut().already_replicated = replicated;
    }
}

macro_rules! impl_occurrence {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::ReplicatedOccurrence for $ty {
                fn meta(&self) -> &$crate::EventMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut $crate::EventMeta {
                    &mut self.meta
                }
            }
        )+
    };
}

pub(crate) use impl_occurrence;
