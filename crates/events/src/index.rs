use serde::{Deserialize, Serialize};

use crate::meta::impl_occurrence;
use crate::EventMeta;

/// Change index update.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChangeIndexEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Project the change belongs to.
    pub project: String,
    /// Numeric change id.
    pub change_id: u32,
    /// Whether the change was removed from the index rather than reindexed.
    #[serde(default)]
    pub deleted: bool,
}

/// Account index update.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AccountIndexEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Account to reindex.
    pub account_id: u32,
}

/// Group index update.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GroupIndexEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Group to reindex.
    pub group_uuid: String,
}

/// Project index update.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProjectIndexEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Project to reindex.
    pub project: String,
    /// Whether the project was removed from the index.
    #[serde(default)]
    pub deleted: bool,
}

impl_occurrence!(ChangeIndexEvent, AccountIndexEvent, GroupIndexEvent, ProjectIndexEvent);
