use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use replication_events::{Origin, ReplicatedEvent, ReplicatedOccurrence};
use tracing::info;

use super::unexpected;
use crate::{ReplicatedEventProcessor, Result};

#[derive(Debug, Default)]
struct DeletionState {
    project: String,
    released_locally: bool,
    delete_from_disk: bool,
    acknowledged_by: BTreeSet<String>,
}

/// Tracks which nodes have handled each project deletion, keyed by task id.
///
/// Two deletions of the same project are separate tasks and never share state.
#[derive(Debug, Default)]
pub struct DeletionLedger {
    tasks: Mutex<HashMap<String, DeletionState>>,
}

impl DeletionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, task_id: &str, project: &str, apply: impl FnOnce(&mut DeletionState)) {
        let mut tasks = self.tasks.lock();
        let state = tasks.entry(task_id.to_string()).or_insert_with(|| DeletionState {
            project: project.to_string(),
            ..DeletionState::default()
        });
        apply(state);
    }

    /// Records that this node released its handle on `project` for deletion `task_id`.
    pub fn record_local_release(&self, task_id: &str, project: &str) {
        self.update(task_id, project, |state| state.released_locally = true);
    }

    /// Records that `node` handled deletion `task_id` of `project`.
    pub fn record_acknowledgement(
        &self,
        task_id: &str,
        project: &str,
        node: &str,
        delete_from_disk: bool,
    ) {
        self.update(task_id, project, |state| {
            state.acknowledged_by.insert(node.to_string());
            state.delete_from_disk |= delete_from_disk;
        });
    }

    /// Project targeted by deletion `task_id`, if the task is known.
    #[must_use]
    pub fn project(&self, task_id: &str) -> Option<String> {
        self.tasks.lock().get(task_id).map(|state| state.project.clone())
    }

    /// Known deletion tasks of `project`, in task id order.
    #[must_use]
    pub fn tasks_for(&self, project: &str) -> Vec<String> {
        let mut tasks: Vec<String> = self
            .tasks
            .lock()
            .iter()
            .filter(|(_, state)| state.project == project)
            .map(|(task_id, _)| task_id.clone())
            .collect();
        tasks.sort_unstable();
        tasks
    }

    /// Whether this node has released its handle for deletion `task_id`.
    #[must_use]
    pub fn released_locally(&self, task_id: &str) -> bool {
        self.tasks.lock().get(task_id).is_some_and(|state| state.released_locally)
    }

    /// Whether any acknowledgement of `task_id` asked for the data to be removed from disk.
    #[must_use]
    pub fn delete_from_disk(&self, task_id: &str) -> bool {
        self.tasks.lock().get(task_id).is_some_and(|state| state.delete_from_disk)
    }

    /// Other nodes known to have handled deletion `task_id`, in name order.
    #[must_use]
    pub fn acknowledged_by(&self, task_id: &str) -> Vec<String> {
        self.tasks
            .lock()
            .get(task_id)
            .map(|state| state.acknowledged_by.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forgets a deletion task once its removal is complete.
    pub fn forget(&self, task_id: &str) -> bool {
        self.tasks.lock().remove(task_id).is_some()
    }
}

/// Records deletion-completed messages from other nodes.
///
/// Physical removal is carried out by the transport once every node has
/// acknowledged; this node only keeps track of who has.
pub struct DeletionMessageProcessor {
    ledger: Arc<DeletionLedger>,
}

impl DeletionMessageProcessor {
    /// Creates the processor.
    #[must_use]
    pub const fn new(ledger: Arc<DeletionLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ReplicatedEventProcessor for DeletionMessageProcessor {
    fn name(&self) -> &'static str {
        "deletion-message"
    }

    fn origin(&self) -> Origin {
        Origin::DeleteProjectMessageEvent
    }

    async fn process_incoming_replicated_event(&self, event: ReplicatedEvent) -> Result<()> {
        let message = match event {
            ReplicatedEvent::DeleteProjectMessage(message) => message,
            other => return Err(unexpected(self.name(), &other)),
        };

        self.ledger.record_acknowledgement(
            &message.task_id,
            &message.project,
            message.originating_node(),
            message.delete_from_disk,
        );
        info!(
            task_id = %message.task_id,
            project = %message.project,
            node = message.originating_node(),
            delete_from_disk = message.delete_from_disk,
            "project deletion acknowledged"
        );
        Ok(())
    }
}
