use serde::{Deserialize, Serialize};

use crate::meta::impl_occurrence;
use crate::{ALL_PROJECTS, EventMeta};

/// Minimal description of a change, as carried by change-scoped notifications.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChangeAttribute {
    /// Project the change belongs to.
    pub project: String,
    /// Target branch, without the `refs/heads/` prefix.
    pub branch: String,
    /// Numeric change identifier.
    pub number: u32,
    /// Change-Id footer value.
    pub id: String,
    /// Change subject line.
    pub subject: String,
    /// Topic, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Label vote attached to a comment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Approval {
    /// Label name, e.g. `Code-Review`.
    pub label: String,
    /// Vote value.
    pub value: i16,
    /// Previous vote value, if the vote changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<i16>,
}

/// Activity stream notification kinds.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StreamEventKind {
    /// A contributor agreement was signed.
    AgreementSignup {
        /// Account that signed.
        account_id: u32,
        /// Agreement name.
        agreement: String,
    },
    /// The assignee of a change was changed.
    AssigneeChanged {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that made the change.
        changer: u32,
        /// Assignee before the change, if any.
        old_assignee: Option<u32>,
    },
    /// A change was abandoned.
    ChangeAbandoned {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that abandoned it.
        abandoner: u32,
        /// Reason given, if any.
        reason: Option<String>,
    },
    /// A change was deleted.
    ChangeDeleted {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that deleted it.
        deleter: u32,
    },
    /// A change was merged.
    ChangeMerged {
        /// Affected change.
        change: ChangeAttribute,
        /// Patch set that was merged.
        patch_set: u32,
        /// Account that submitted it.
        submitter: u32,
        /// Revision the branch now points to.
        new_revision: String,
    },
    /// An abandoned change was restored.
    ChangeRestored {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that restored it.
        restorer: u32,
        /// Reason given, if any.
        reason: Option<String>,
    },
    /// A change was reverted by another change.
    ChangeReverted {
        /// Change that was reverted.
        change: ChangeAttribute,
        /// Number of the reverting change.
        revert_change: u32,
    },
    /// A comment was added to a change.
    CommentAdded {
        /// Affected change.
        change: ChangeAttribute,
        /// Patch set commented on.
        patch_set: u32,
        /// Comment author.
        author: u32,
        /// Comment text.
        comment: String,
        /// Votes cast with the comment.
        #[serde(default)]
        approvals: Vec<Approval>,
    },
    /// Hashtags on a change were edited.
    HashtagsEdited {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that edited them.
        editor: u32,
        /// Hashtags added.
        #[serde(default)]
        added: Vec<String>,
        /// Hashtags removed.
        #[serde(default)]
        removed: Vec<String>,
    },
    /// The private flag of a change was toggled.
    PrivateStateChanged {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that toggled it.
        changer: u32,
        /// New value of the flag.
        private: bool,
    },
    /// A git reference was updated.
    RefUpdated {
        /// Project owning the reference.
        project: String,
        /// Full reference name.
        ref_name: String,
        /// Revision before the update.
        old_rev: String,
        /// Revision after the update.
        new_rev: String,
        /// Account that pushed, if known.
        submitter: Option<u32>,
    },
    /// A reviewer was added to a change.
    ReviewerAdded {
        /// Affected change.
        change: ChangeAttribute,
        /// Account added as reviewer.
        reviewer: u32,
    },
    /// A reviewer was removed from a change.
    ReviewerDeleted {
        /// Affected change.
        change: ChangeAttribute,
        /// Account removed as reviewer.
        reviewer: u32,
        /// Account that removed them.
        remover: u32,
    },
    /// A new patch set was uploaded.
    RevisionCreated {
        /// Affected change.
        change: ChangeAttribute,
        /// Number of the new patch set.
        patch_set: u32,
        /// Account that uploaded it.
        uploader: u32,
    },
    /// The topic of a change was edited.
    TopicEdited {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that edited it.
        editor: u32,
        /// Topic before the edit, if any.
        old_topic: Option<String>,
    },
    /// A vote was removed from a change.
    VoteDeleted {
        /// Affected change.
        change: ChangeAttribute,
        /// Patch set the vote was on.
        patch_set: u32,
        /// Account whose vote was removed.
        reviewer: u32,
        /// Account that removed it.
        remover: u32,
        /// Label of the vote.
        label: String,
    },
    /// The work-in-progress flag of a change was toggled.
    WorkInProgressStateChanged {
        /// Affected change.
        change: ChangeAttribute,
        /// Account that toggled it.
        changer: u32,
        /// New value of the flag.
        work_in_progress: bool,
    },
    /// A project was created.
    ProjectCreated {
        /// New project name.
        project: String,
        /// Initial HEAD reference.
        head: String,
    },
    /// The HEAD of a project was moved.
    HeadUpdated {
        /// Affected project.
        project: String,
        /// HEAD before the move.
        old_head: String,
        /// HEAD after the move.
        new_head: String,
    },
    /// Garbage collection ran on a project's repository.
    GarbageCollected {
        /// Affected project.
        project: String,
        /// Account that triggered it, if any.
        account_id: Option<u32>,
    },
    /// Plugin-defined notification with an opaque body.
    PluginEvent {
        /// Plugin that emitted it.
        plugin: String,
        /// Plugin-specific event name.
        name: String,
        /// Project it concerns, if any.
        project: Option<String>,
        /// Opaque body.
        data: serde_json::Value,
    },
}

impl StreamEventKind {
    /// Simple type name, as matched by the replication skip-list.
    #[must_use]
    pub const fn simple_name(&self) -> &'static str {
        match self {
            Self::AgreementSignup { .. } => "AgreementSignup",
            Self::AssigneeChanged { .. } => "AssigneeChanged",
            Self::ChangeAbandoned { .. } => "ChangeAbandoned",
            Self::ChangeDeleted { .. } => "ChangeDeleted",
            Self::ChangeMerged { .. } => "ChangeMerged",
            Self::ChangeRestored { .. } => "ChangeRestored",
            Self::ChangeReverted { .. } => "ChangeReverted",
            Self::CommentAdded { .. } => "CommentAdded",
            Self::HashtagsEdited { .. } => "HashtagsEdited",
            Self::PrivateStateChanged { .. } => "PrivateStateChanged",
            Self::RefUpdated { .. } => "RefUpdated",
            Self::ReviewerAdded { .. } => "ReviewerAdded",
            Self::ReviewerDeleted { .. } => "ReviewerDeleted",
            Self::RevisionCreated { .. } => "RevisionCreated",
            Self::TopicEdited { .. } => "TopicEdited",
            Self::VoteDeleted { .. } => "VoteDeleted",
            Self::WorkInProgressStateChanged { .. } => "WorkInProgressStateChanged",
            Self::ProjectCreated { .. } => "ProjectCreated",
            Self::HeadUpdated { .. } => "HeadUpdated",
            Self::GarbageCollected { .. } => "GarbageCollected",
            Self::PluginEvent { .. } => "PluginEvent",
        }
    }

    /// Kinds that describe node-local work and are never replicated.
    #[must_use]
    pub const fn never_replicate(&self) -> bool {
        matches!(self, Self::GarbageCollected { .. })
    }

    /// Change the notification is about, if any.
    #[must_use]
    pub const fn change(&self) -> Option<&ChangeAttribute> {
        match self {
            Self::AssigneeChanged { change, .. }
            | Self::ChangeAbandoned { change, .. }
            | Self::ChangeDeleted { change, .. }
            | Self::ChangeMerged { change, .. }
            | Self::ChangeRestored { change, .. }
            | Self::ChangeReverted { change, .. }
            | Self::CommentAdded { change, .. }
            | Self::HashtagsEdited { change, .. }
            | Self::PrivateStateChanged { change, .. }
            | Self::ReviewerAdded { change, .. }
            | Self::ReviewerDeleted { change, .. }
            | Self::RevisionCreated { change, .. }
            | Self::TopicEdited { change, .. }
            | Self::VoteDeleted { change, .. }
            | Self::WorkInProgressStateChanged { change, .. } => Some(change),
            _ => None,
        }
    }

    /// Project the notification belongs to, if any.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        if let Some(change) = self.change() {
            return Some(&change.project);
        }
        match self {
            Self::RefUpdated { project, .. }
            | Self::ProjectCreated { project, .. }
            | Self::HeadUpdated { project, .. }
            | Self::GarbageCollected { project, .. } => Some(project),
            Self::PluginEvent { project, .. } => project.as_deref(),
            _ => None,
        }
    }

    /// Fully qualified reference the notification concerns, if it is ref-scoped.
    #[must_use]
    pub fn ref_name(&self) -> Option<String> {
        match self {
            Self::RefUpdated { ref_name, .. } => Some(ref_name.clone()),
            _ => self.change().map(|change| format!("refs/heads/{}", change.branch)),
        }
    }
}

/// Replicated activity stream notification.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StreamEvent {
    /// Stamping metadata.
    pub meta: EventMeta,
    /// What happened.
    pub kind: StreamEventKind,
}

impl StreamEvent {
    /// Creates a new notification.
    #[must_use]
    pub const fn new(meta: EventMeta, kind: StreamEventKind) -> Self {
        Self { meta, kind }
    }

    /// Destination the notification is staged under.
    #[must_use]
    pub fn destination(&self) -> &str {
        self.kind.project().unwrap_or(ALL_PROJECTS)
    }
}

impl_occurrence!(StreamEvent);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplicatedOccurrence;

    fn change() -> ChangeAttribute {
        ChangeAttribute {
            project: "ProjectA".to_string(),
            branch: "main".to_string(),
            number: 42,
            id: "I0123456789abcdef".to_string(),
            subject: "Fix the frobnicator".to_string(),
            topic: None,
        }
    }

    #[test]
    fn test_change_scoped_accessors() {
        let kind = StreamEventKind::ReviewerAdded { change: change(), reviewer: 1000 };

        assert_eq!(kind.simple_name(), "ReviewerAdded");
        assert_eq!(kind.project(), Some("ProjectA"));
        assert_eq!(kind.ref_name().as_deref(), Some("refs/heads/main"));
        assert!(!kind.never_replicate());
    }

    #[test]
    fn test_projectless_kind_goes_to_all_projects() {
        let event = StreamEvent::new(
            EventMeta::new("node-1", 1, 1),
            StreamEventKind::AgreementSignup { account_id: 7, agreement: "Individual".to_string() },
        );

        assert_eq!(event.destination(), ALL_PROJECTS);
        assert_eq!(event.kind.ref_name(), None);
    }

    #[test]
    fn test_garbage_collection_is_never_replicated() {
        let kind = StreamEventKind::GarbageCollected {
            project: "ProjectA".to_string(),
            account_id: None,
        };
        assert!(kind.never_replicate());
    }

    #[test]
    fn test_wire_shape_is_tagged() {
        let mut event = StreamEvent::new(
            EventMeta::new("node-1", 10, 20),
            StreamEventKind::HeadUpdated {
                project: "ProjectA".to_string(),
                old_head: "refs/heads/master".to_string(),
                new_head: "refs/heads/main".to_string(),
            },
        );
        event.set_already_replicated(true);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"]["type"], "HeadUpdated");
        assert_eq!(value["meta"]["already_replicated"], true);
    }
}
