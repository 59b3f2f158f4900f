use std::sync::Arc;

use replication_broker::{AllowAll, PermissionBackend};
use replication_incoming::{
    AccountIndexer, ChangeIndexer, GroupIndexer, ProjectIndexer, RepositoryManager,
};

/// Application services the pipeline applies replicated events through.
#[derive(Clone)]
pub struct Capabilities {
    /// Read permissions used to filter activity stream delivery.
    pub permissions: Arc<dyn PermissionBackend>,
    /// Change index.
    pub change_indexer: Arc<dyn ChangeIndexer>,
    /// Account index.
    pub account_indexer: Arc<dyn AccountIndexer>,
    /// Group index.
    pub group_indexer: Arc<dyn GroupIndexer>,
    /// Project index.
    pub project_indexer: Arc<dyn ProjectIndexer>,
    /// Open repositories.
    pub repositories: Arc<dyn RepositoryManager>,
}

impl Capabilities {
    /// Bundles the indexers and repositories with a permission backend that lets everyone read.
    pub fn new(
        change_indexer: Arc<dyn ChangeIndexer>,
        account_indexer: Arc<dyn AccountIndexer>,
        group_indexer: Arc<dyn GroupIndexer>,
        project_indexer: Arc<dyn ProjectIndexer>,
        repositories: Arc<dyn RepositoryManager>,
    ) -> Self {
        Self {
            permissions: Arc::new(AllowAll),
            change_indexer,
            account_indexer,
            group_indexer,
            project_indexer,
            repositories,
        }
    }

    /// Replaces the permission backend.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionBackend>) -> Self {
        self.permissions = permissions;
        self
    }
}
