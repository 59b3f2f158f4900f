use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Category of a replicated occurrence.
///
/// Determines which processor consumes an envelope on the receiving node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Origin {
    /// Activity stream notification.
    StreamEvent,
    /// Cache eviction or typed cache operation.
    CacheEvent,
    /// Change index update.
    IndexEvent,
    /// Account index update.
    AccountUserIndexEvent,
    /// Group index update.
    AccountGroupIndexEvent,
    /// Project index update.
    ProjectsIndexEvent,
    /// Project deletion, or deletion of a project's changes.
    DeleteProjectEvent,
    /// Deletion completed message.
    DeleteProjectMessageEvent,
}

impl Origin {
    /// Every origin, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::StreamEvent,
        Self::CacheEvent,
        Self::IndexEvent,
        Self::AccountUserIndexEvent,
        Self::AccountGroupIndexEvent,
        Self::ProjectsIndexEvent,
        Self::DeleteProjectEvent,
        Self::DeleteProjectMessageEvent,
    ];

    /// Wire name of the origin.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StreamEvent => "StreamEvent",
            Self::CacheEvent => "CacheEvent",
            Self::IndexEvent => "IndexEvent",
            Self::AccountUserIndexEvent => "AccountUserIndexEvent",
            Self::AccountGroupIndexEvent => "AccountGroupIndexEvent",
            Self::ProjectsIndexEvent => "ProjectsIndexEvent",
            Self::DeleteProjectEvent => "DeleteProjectEvent",
            Self::DeleteProjectMessageEvent => "DeleteProjectMessageEvent",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|origin| origin.as_str() == s)
            .ok_or_else(|| Error::UnknownOrigin(s.to_string()))
    }
}
