use serde::{Deserialize, Serialize};

use crate::meta::impl_occurrence;
use crate::EventMeta;

/// A project was deleted on the originating node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteProjectEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Identifies this deletion; echoed back by every [`DeleteProjectMessage`] it causes.
    pub task_id: String,
    /// Project name.
    pub project: String,
    /// Keep the repository on disk after releasing it.
    #[serde(default)]
    pub preserve: bool,
}

/// The changes of a project were deleted on the originating node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteProjectChangesEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Project name.
    pub project: String,
    /// Changes to drop from the local index.
    pub change_ids: Vec<u32>,
}

/// Sent once a node has released its handle on a deleted project.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteProjectMessage {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// The deletion being acknowledged.
    pub task_id: String,
    /// Project name.
    pub project: String,
    /// Whether the repository data should be removed from disk.
    pub delete_from_disk: bool,
}

impl_occurrence!(DeleteProjectEvent, DeleteProjectChangesEvent, DeleteProjectMessage);
