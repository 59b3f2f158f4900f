//! Application collaborators the processors apply events through.
//!
//! Every indexing call here is the local-only variant: it must not trigger
//! replication of its own.

use async_trait::async_trait;
use replication_events::CacheOperation;

use crate::CapabilityError;

/// A cache that can be invalidated remotely.
pub trait ReplicatedCache: Send + Sync {
    /// Evicts one key.
    fn evict(&self, key: &serde_json::Value);

    /// Loads one key again after eviction.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be loaded.
    fn reload(&self, key: &serde_json::Value) -> Result<(), CapabilityError>;

    /// Whether the cache implements `operation`.
    fn supports(&self, _operation: &CacheOperation) -> bool {
        false
    }

    /// Runs a typed operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is unsupported or fails.
    fn invoke(&self, operation: &CacheOperation) -> Result<(), CapabilityError> {
        Err(CapabilityError::new(format!("{} is not supported", operation.name())))
    }
}

/// Change index.
#[async_trait]
pub trait ChangeIndexer: Send + Sync {
    /// Reindexes one change.
    async fn index_no_repl(&self, project: &str, change_id: u32) -> Result<(), CapabilityError>;

    /// Removes one change from the index.
    async fn delete_no_repl(&self, project: &str, change_id: u32) -> Result<(), CapabilityError>;

    /// Removes several changes of a project from the index.
    async fn delete_changes_no_repl(
        &self,
        project: &str,
        change_ids: &[u32],
    ) -> Result<(), CapabilityError> {
        for change_id in change_ids {
            self.delete_no_repl(project, *change_id).await?;
        }
        Ok(())
    }
}

/// Account index.
#[async_trait]
pub trait AccountIndexer: Send + Sync {
    /// Reindexes one account.
    async fn index_no_repl(&self, account_id: u32) -> Result<(), CapabilityError>;
}

/// Group index.
#[async_trait]
pub trait GroupIndexer: Send + Sync {
    /// Reindexes one group.
    async fn index_no_repl(&self, group_uuid: &str) -> Result<(), CapabilityError>;
}

/// Project index.
#[async_trait]
pub trait ProjectIndexer: Send + Sync {
    /// Reindexes one project.
    async fn index_no_repl(&self, project: &str) -> Result<(), CapabilityError>;

    /// Removes one project from the index.
    async fn delete_no_repl(&self, project: &str) -> Result<(), CapabilityError>;
}

/// Open repository handles.
#[async_trait]
pub trait RepositoryManager: Send + Sync {
    /// Closes the repository and evicts it from every repository cache.
    /// Returns whether a handle was released.
    async fn close_and_evict(&self, project: &str) -> Result<bool, CapabilityError>;
}
