use replication_events::{StreamEvent, StreamEventKind};

use crate::Result;

/// Identity a user-scoped listener acts on behalf of.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Principal {
    /// The server itself.
    Internal,
    /// A registered account.
    User {
        /// Account id.
        account_id: u32,
    },
}

/// What a notification must be visible through before a user-scoped listener sees it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventScope {
    /// A change.
    Change {
        /// Project of the change.
        project: String,
        /// Change number.
        number: u32,
    },
    /// A branch or other reference.
    Branch {
        /// Project of the reference.
        project: String,
        /// Fully qualified reference name.
        ref_name: String,
    },
    /// A whole project.
    Project(String),
    /// Nothing to check.
    None,
}

impl EventScope {
    /// Derives the narrowest scope a notification is about.
    #[must_use]
    pub fn of(event: &StreamEvent) -> Self {
        if let Some(change) = event.kind.change() {
            return Self::Change {
                project: change.project.clone(),
                number: change.number,
            };
        }
        if let StreamEventKind::RefUpdated { project, ref_name, .. } = &event.kind {
            return Self::Branch {
                project: project.clone(),
                ref_name: ref_name.clone(),
            };
        }
        event
            .kind
            .project()
            .map_or(Self::None, |project| Self::Project(project.to_string()))
    }
}

/// Authorisation decisions, supplied by the application.
pub trait PermissionBackend: Send + Sync {
    /// Whether `principal` may read `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be made.
    fn can_read_project(&self, principal: &Principal, project: &str) -> Result<bool>;

    /// Whether `principal` may read change `number` of `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be made.
    fn can_read_change(&self, principal: &Principal, project: &str, number: u32) -> Result<bool>;

    /// Whether `principal` may read `ref_name` of `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be made.
    fn can_read_ref(&self, principal: &Principal, project: &str, ref_name: &str) -> Result<bool>;
}

/// Answers every check with `true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PermissionBackend for AllowAll {
    fn can_read_project(&self, _principal: &Principal, _project: &str) -> Result<bool> {
        Ok(true)
    }

    fn can_read_change(
        &self,
        _principal: &Principal,
        _project: &str,
        _number: u32,
    ) -> Result<bool> {
        Ok(true)
    }

    fn can_read_ref(
        &self,
        _principal: &Principal,
        _project: &str,
        _ref_name: &str,
    ) -> Result<bool> {
        Ok(true)
    }
}

pub(crate) fn is_visible(
    backend: &dyn PermissionBackend,
    principal: &Principal,
    scope: &EventScope,
) -> Result<bool> {
    match scope {
        EventScope::Change { project, number } => {
            backend.can_read_change(principal, project, *number)
        }
        EventScope::Branch { project, ref_name } => {
            backend.can_read_ref(principal, project, ref_name)
        }
        EventScope::Project(project) => backend.can_read_project(principal, project),
        EventScope::None => Ok(true),
    }
}
