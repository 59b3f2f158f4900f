use std::sync::Arc;

use async_trait::async_trait;
use replication_events::{DeleteProjectChangesEvent, DeleteProjectEvent, Origin, ReplicatedEvent};
use replication_outgoing::ProjectEventsFeed;
use tracing::{debug, info};

use super::{DeletionLedger, unexpected};
use crate::{ChangeIndexer, Error, ReplicatedEventProcessor, RepositoryManager, Result};

/// Applies project deletions and deletions of a project's changes.
pub struct ProjectProcessor {
    repositories: Arc<dyn RepositoryManager>,
    change_indexer: Arc<dyn ChangeIndexer>,
    feed: ProjectEventsFeed,
    ledger: Arc<DeletionLedger>,
    preserve_on_disk: bool,
}

impl ProjectProcessor {
    /// Creates the processor. Completion messages are sent through `feed`.
    #[must_use]
    pub fn new(
        repositories: Arc<dyn RepositoryManager>,
        change_indexer: Arc<dyn ChangeIndexer>,
        feed: ProjectEventsFeed,
        ledger: Arc<DeletionLedger>,
        preserve_on_disk: bool,
    ) -> Self {
        Self {
            repositories,
            change_indexer,
            feed,
            ledger,
            preserve_on_disk,
        }
    }

    async fn delete_project(&self, event: &DeleteProjectEvent) -> Result<()> {
        let released = self
            .repositories
            .close_and_evict(&event.project)
            .await
            .map_err(|source| Error::Capability {
                origin: Origin::DeleteProjectEvent,
                source,
            })?;
        self.ledger.record_local_release(&event.task_id, &event.project);

        let delete_from_disk = released && !(event.preserve || self.preserve_on_disk);
        info!(
            task_id = %event.task_id,
            project = %event.project,
            released,
            delete_from_disk,
            "released deleted project"
        );

        self.feed
            .replicate_deletion_message(&event.task_id, &event.project, delete_from_disk);
        Ok(())
    }

    async fn delete_changes(&self, event: &DeleteProjectChangesEvent) -> Result<()> {
        debug!(
            project = %event.project,
            changes = event.change_ids.len(),
            "deleting changes from index"
        );
        self.change_indexer
            .delete_changes_no_repl(&event.project, &event.change_ids)
            .await
            .map_err(|source| Error::Capability {
                origin: Origin::DeleteProjectEvent,
                source,
            })
    }
}

#[async_trait]
impl ReplicatedEventProcessor for ProjectProcessor {
    fn name(&self) -> &'static str {
        "project"
    }

    fn origin(&self) -> Origin {
        Origin::DeleteProjectEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        match &event {
            ReplicatedEvent::DeleteProject(deletion) => self.delete_project(deletion).await,
            ReplicatedEvent::DeleteProjectChanges(deletion) => self.delete_changes(deletion).await,
            other => Err(unexpected(self.name(), other)),
        }
    }
}
