use std::sync::Arc;

use async_trait::async_trait;
use replication_events::{Origin, ReplicatedEvent};
use tracing::debug;

use super::unexpected;
use crate::{
    AccountIndexer, CapabilityError, ChangeIndexer, Error, GroupIndexer, ProjectIndexer,
    ReplicatedEventProcessor, Result,
};

fn capability(origin: Origin) -> impl FnOnce(CapabilityError) -> Error {
    move |source| Error::Capability { origin, source }
}

/// Applies change index updates without replicating them again.
pub struct ChangeIndexProcessor {
    indexer: Arc<dyn ChangeIndexer>,
}

impl ChangeIndexProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new(indexer: Arc<dyn ChangeIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for ChangeIndexProcessor {
    fn name(&self) -> &'static str {
        "change-index"
    }

    fn origin(&self) -> Origin {
        Origin::IndexEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let event = match event {
            ReplicatedEvent::ChangeIndex(event) => event,
            other => return Err(unexpected(self.name(), &other)),
        };

        debug!(
            project = %event.project,
            change = event.change_id,
            deleted = event.deleted,
            "applying change index event"
        );
        let applied = if event.deleted {
            self.indexer.delete_no_repl(&event.project, event.change_id).await
        } else {
            self.indexer.index_no_repl(&event.project, event.change_id).await
        };
        applied.map_err(capability(self.origin()))
    }
}

/// Reindexes accounts without replicating them again.
pub struct AccountIndexProcessor {
    indexer: Arc<dyn AccountIndexer>,
}

impl AccountIndexProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new(indexer: Arc<dyn AccountIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for AccountIndexProcessor {
    fn name(&self) -> &'static str {
        "account-index"
    }

    fn origin(&self) -> Origin {
        Origin::AccountUserIndexEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let event = match event {
            ReplicatedEvent::AccountIndex(event) => event,
            other => return Err(unexpected(self.name(), &other)),
        };

        debug!(account = event.account_id, "reindexing account");
        self.indexer
            .index_no_repl(event.account_id)
            .await
            .map_err(capability(self.origin()))
    }
}

/// Reindexes groups without replicating them again.
pub struct GroupIndexProcessor {
    indexer: Arc<dyn GroupIndexer>,
}

impl GroupIndexProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new(indexer: Arc<dyn GroupIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for GroupIndexProcessor {
    fn name(&self) -> &'static str {
        "group-index"
    }

    fn origin(&self) -> Origin {
        Origin::AccountGroupIndexEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let event = match event {
            ReplicatedEvent::GroupIndex(event) => event,
            other => return Err(unexpected(self.name(), &other)),
        };

        debug!(group = %event.group_uuid, "reindexing group");
        self.indexer
            .index_no_repl(&event.group_uuid)
            .await
            .map_err(capability(self.origin()))
    }
}

/// Applies project index updates without replicating them again.
pub struct ProjectIndexProcessor {
    indexer: Arc<dyn ProjectIndexer>,
}

impl ProjectIndexProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new(indexer: Arc<dyn ProjectIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for ProjectIndexProcessor {
    fn name(&self) -> &'static str {
        "project-index"
    }

    fn origin(&self) -> Origin {
        Origin::ProjectsIndexEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let event = match event {
            ReplicatedEvent::ProjectIndex(event) => event,
            other => return Err(unexpected(self.name(), &other)),
        };

        debug!(project = %event.project, deleted = event.deleted, "applying project index event");
        let applied = if event.deleted {
            self.indexer.delete_no_repl(&event.project).await
        } else {
            self.indexer.index_no_repl(&event.project).await
        };
        applied.map_err(capability(self.origin()))
    }
}
