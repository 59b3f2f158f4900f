use serde::{Deserialize, Serialize};

use crate::meta::impl_occurrence;
use crate::{ALL_PROJECTS, EventMeta};

/// Typed invalidation operations a cache can declare support for.
///
/// Caches that are not simple key/value maps need an imperative call rather
/// than a key eviction. Each such call is one variant here.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "op")]
pub enum CacheOperation {
    /// Drop the cached state of a project.
    EvictProject {
        /// Project name.
        project: String,
    },
    /// Remove a project from the cache and from the list of known projects.
    RemoveProject {
        /// Project name.
        project: String,
    },
    /// Register a newly created project.
    OnCreateProject {
        /// Project name.
        project: String,
    },
    /// Drop the cached member list of a group.
    EvictGroupMembers {
        /// Group UUID.
        group_uuid: String,
    },
    /// Drop all cached state of an account.
    EvictAccount {
        /// Account id.
        account_id: u32,
    },
}

impl CacheOperation {
    /// Operation name, used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EvictProject { .. } => "evictProject",
            Self::RemoveProject { .. } => "removeProject",
            Self::OnCreateProject { .. } => "onCreateProject",
            Self::EvictGroupMembers { .. } => "evictGroupMembers",
            Self::EvictAccount { .. } => "evictAccount",
        }
    }
}

/// Replicated cache mutation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CacheEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// Logical cache name.
    pub cache_name: String,
    /// Key to evict. Ignored when an operation is present.
    pub key: serde_json::Value,
    /// Project the key belongs to, if any.
    #[serde(default)]
    pub project: Option<String>,
    /// Typed operation to invoke instead of a plain eviction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<CacheOperation>,
}

impl CacheEvent {
    /// Creates a plain key eviction.
    pub fn eviction(
        meta: EventMeta,
        cache_name: impl Into<String>,
        key: serde_json::Value,
        project: Option<String>,
    ) -> Self {
        Self {
            meta,
            cache_name: cache_name.into(),
            key,
            project,
            operation: None,
        }
    }

    /// Creates a typed cache operation.
    pub fn operation(
        meta: EventMeta,
        cache_name: impl Into<String>,
        operation: CacheOperation,
    ) -> Self {
        let project = match &operation {
            CacheOperation::EvictProject { project }
            | CacheOperation::RemoveProject { project }
            | CacheOperation::OnCreateProject { project } => Some(project.clone()),
            _ => None,
        };
        Self {
            meta,
            cache_name: cache_name.into(),
            key: serde_json::Value::Null,
            project,
            operation: Some(operation),
        }
    }

    /// Destination the event is staged under.
    #[must_use]
    pub fn destination(&self) -> &str {
        self.project.as_deref().unwrap_or(ALL_PROJECTS)
    }
}

impl_occurrence!(CacheEvent);
