//! Entry points that turn local operations into queued envelopes.

use std::sync::Arc;

use replication_events::{
    AccountIndexEvent, CacheEvent, CacheOperation, ChangeIndexEvent, DeleteProjectChangesEvent,
    DeleteProjectEvent, DeleteProjectMessage, Envelope, EnvelopeFactory, EventMeta, GroupIndexEvent,
    ProjectIndexEvent, ReplicatedEvent,
};
use tracing::{error, trace};

use crate::OutgoingQueue;

/// Shared plumbing for every feed: stamps, wraps and queues events.
///
/// A context without a queue belongs to a disabled pipeline and drops everything.
#[derive(Clone)]
pub struct FeedContext {
    factory: EnvelopeFactory,
    queue: Option<Arc<dyn OutgoingQueue>>,
}

impl FeedContext {
    /// Context that queues onto `queue`.
    #[must_use]
    pub fn new(factory: EnvelopeFactory, queue: Arc<dyn OutgoingQueue>) -> Self {
        Self {
            factory,
            queue: Some(queue),
        }
    }

    /// Context for a node with replication turned off.
    #[must_use]
    pub const fn disabled(factory: EnvelopeFactory) -> Self {
        Self { factory, queue: None }
    }

    /// Whether events are actually queued.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Envelope factory for the local node.
    #[must_use]
    pub const fn factory(&self) -> &EnvelopeFactory {
        &self.factory
    }

    /// Fresh stamping metadata.
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        self.factory.meta()
    }

    /// Wraps and queues an event. Failures are logged, never returned:
    /// replication must not fail the operation that triggered it.
    pub fn replicate(&self, event: impl Into<ReplicatedEvent>) {
        let Some(queue) = &self.queue else {
            return;
        };
        let event = event.into();

        let envelope = match Envelope::wrap(&event) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    origin = %event.origin(),
                    error = %e,
                    "failed to wrap event for replication"
                );
                return;
            }
        };

        trace!(
            origin = %envelope.origin,
            destination = envelope.staging_destination(),
            "queueing event"
        );
        if let Err(e) = queue.queue_event(envelope) {
            error!(origin = %event.origin(), error = %e, "failed to queue event for replication");
        }
    }
}

/// Replicates cache evictions and typed cache operations.
#[derive(Clone)]
pub struct CacheEventsFeed {
    context: FeedContext,
}

impl CacheEventsFeed {
    /// Creates the feed.
    #[must_use]
    pub const fn new(context: FeedContext) -> Self {
        Self { context }
    }

    /// Replicates the eviction of `key` from `cache_name`.
    pub fn replicate_eviction(
        &self,
        cache_name: &str,
        key: serde_json::Value,
        project: Option<&str>,
    ) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(CacheEvent::eviction(
            self.context.meta(),
            cache_name,
            key,
            project.map(str::to_string),
        ));
    }

    /// Replicates a typed operation on `cache_name`.
    pub fn replicate_operation(&self, cache_name: &str, operation: CacheOperation) {
        if !self.context.is_enabled() {
            return;
        }
        self.context
            .replicate(CacheEvent::operation(self.context.meta(), cache_name, operation));
    }
}

/// Replicates change index updates.
#[derive(Clone)]
pub struct IndexEventsFeed {
    context: FeedContext,
}

impl IndexEventsFeed {
    /// Creates the feed.
    #[must_use]
    pub const fn new(context: FeedContext) -> Self {
        Self { context }
    }

    /// Replicates a reindex of one change.
    pub fn replicate_change_reindex(&self, project: &str, change_id: u32) {
        self.replicate(project, change_id, false);
    }

    /// Replicates the removal of one change from the index.
    pub fn replicate_change_deletion(&self, project: &str, change_id: u32) {
        self.replicate(project, change_id, true);
    }

    fn replicate(&self, project: &str, change_id: u32, deleted: bool) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(ChangeIndexEvent {
            meta: self.context.meta(),
            project: project.to_string(),
            change_id,
            deleted,
        });
    }
}

/// Replicates account and group index updates.
#[derive(Clone)]
pub struct AccountIndexEventsFeed {
    context: FeedContext,
}

impl AccountIndexEventsFeed {
    /// Creates the feed.
    #[must_use]
    pub const fn new(context: FeedContext) -> Self {
        Self { context }
    }

    /// Replicates the reindex of an account.
    pub fn replicate_account_reindex(&self, account_id: u32) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(AccountIndexEvent {
            meta: self.context.meta(),
            account_id,
        });
    }

    /// Replicates the reindex of a group.
    pub fn replicate_group_reindex(&self, group_uuid: &str) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(GroupIndexEvent {
            meta: self.context.meta(),
            group_uuid: group_uuid.to_string(),
        });
    }
}

/// Replicates project index updates.
#[derive(Clone)]
pub struct ProjectIndexEventsFeed {
    context: FeedContext,
}

impl ProjectIndexEventsFeed {
    /// Creates the feed.
    #[must_use]
    pub const fn new(context: FeedContext) -> Self {
        Self { context }
    }

    /// Replicates the reindex of a project.
    pub fn replicate_reindex(&self, project: &str) {
        self.replicate(project, false);
    }

    /// Replicates the removal of a project from the index.
    pub fn replicate_deletion(&self, project: &str) {
        self.replicate(project, true);
    }

    fn replicate(&self, project: &str, deleted: bool) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(ProjectIndexEvent {
            meta: self.context.meta(),
            project: project.to_string(),
            deleted,
        });
    }
}

/// Replicates project deletions and their completion messages.
#[derive(Clone)]
pub struct ProjectEventsFeed {
    context: FeedContext,
}

impl ProjectEventsFeed {
    /// Creates the feed.
    #[must_use]
    pub const fn new(context: FeedContext) -> Self {
        Self { context }
    }

    /// Replicates the deletion of a project.
    ///
    /// Returns the task id other nodes will acknowledge the deletion under,
    /// or `None` when replication is disabled.
    pub fn replicate_project_deletion(&self, project: &str, preserve: bool) -> Option<String> {
        if !self.context.is_enabled() {
            return None;
        }
        let task_id = uuid::Uuid::new_v4().to_string();
        self.context.replicate(DeleteProjectEvent {
            meta: self.context.meta(),
            task_id: task_id.clone(),
            project: project.to_string(),
            preserve,
        });
        Some(task_id)
    }

    /// Replicates the deletion of some of a project's changes.
    pub fn replicate_project_changes_deletion(&self, project: &str, change_ids: Vec<u32>) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(DeleteProjectChangesEvent {
            meta: self.context.meta(),
            project: project.to_string(),
            change_ids,
        });
    }

    /// Announces that this node has handled deletion `task_id` of a project.
    pub fn replicate_deletion_message(&self, task_id: &str, project: &str, delete_from_disk: bool) {
        if !self.context.is_enabled() {
            return;
        }
        self.context.replicate(DeleteProjectMessage {
            meta: self.context.meta(),
            task_id: task_id.to_string(),
            project: project.to_string(),
            delete_from_disk,
        });
    }
}
