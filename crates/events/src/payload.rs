use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{
    ALL_PROJECTS, ALL_USERS, AccountIndexEvent, CacheEvent, ChangeIndexEvent,
    DeleteProjectChangesEvent, DeleteProjectEvent, DeleteProjectMessage, Error, EventMeta,
    GroupIndexEvent, Origin, ProjectIndexEvent, ReplicatedOccurrence, Result, StreamEvent,
};

/// Every replicated payload, keyed by its concrete shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplicatedEvent {
    /// Activity stream notification.
    Stream(StreamEvent),
    /// Cache eviction or operation.
    Cache(CacheEvent),
    /// Change index update.
    ChangeIndex(ChangeIndexEvent),
    /// Account index update.
    AccountIndex(AccountIndexEvent),
    /// Group index update.
    GroupIndex(GroupIndexEvent),
    /// Project index update.
    ProjectIndex(ProjectIndexEvent),
    /// Project deletion.
    DeleteProject(DeleteProjectEvent),
    /// Deletion of a project's changes.
    DeleteProjectChanges(DeleteProjectChangesEvent),
    /// Deletion completed.
    DeleteProjectMessage(DeleteProjectMessage),
}

impl ReplicatedEvent {
    /// Origin the payload is routed by.
    #[must_use]
    pub const fn origin(&self) -> Origin {
        match self {
            Self::Stream(_) => Origin::StreamEvent,
            Self::Cache(_) => Origin::CacheEvent,
            Self::ChangeIndex(_) => Origin::IndexEvent,
            Self::AccountIndex(_) => Origin::AccountUserIndexEvent,
            Self::GroupIndex(_) => Origin::AccountGroupIndexEvent,
            Self::ProjectIndex(_) => Origin::ProjectsIndexEvent,
            Self::DeleteProject(_) | Self::DeleteProjectChanges(_) => Origin::DeleteProjectEvent,
            Self::DeleteProjectMessage(_) => Origin::DeleteProjectMessageEvent,
        }
    }

    /// Payload type name written into the envelope.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Stream(_) => "StreamEvent",
            Self::Cache(_) => "CacheEvent",
            Self::ChangeIndex(_) => "ChangeIndexEvent",
            Self::AccountIndex(_) => "AccountIndexEvent",
            Self::GroupIndex(_) => "GroupIndexEvent",
            Self::ProjectIndex(_) => "ProjectIndexEvent",
            Self::DeleteProject(_) => "DeleteProjectEvent",
            Self::DeleteProjectChanges(_) => "DeleteProjectChangesEvent",
            Self::DeleteProjectMessage(_) => "DeleteProjectMessage",
        }
    }

    /// Destination project, or `None` for events with no single-project scope.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Stream(event) => Some(event.destination()),
            Self::Cache(event) => Some(event.destination()),
            Self::ChangeIndex(event) => Some(&event.project),
            Self::AccountIndex(_) | Self::GroupIndex(_) => None,
            Self::ProjectIndex(_) => Some(ALL_PROJECTS),
            Self::DeleteProject(event) => Some(&event.project),
            Self::DeleteProjectChanges(event) => Some(&event.project),
            Self::DeleteProjectMessage(event) => Some(&event.project),
        }
    }

    /// Destination the event is staged under, with project-less events
    /// collapsed onto the shared account destination.
    #[must_use]
    pub fn staging_destination(&self) -> &str {
        self.destination().unwrap_or(ALL_USERS)
    }

    pub(crate) fn payload_json(&self) -> Result<String> {
        fn encode<T: Serialize>(value: &T) -> Result<String> {
            serde_json::to_string(value)
                .map_err(|e| Error::Serialize("failed to serialise payload", e))
        }

        match self {
            Self::Stream(event) => encode(event),
            Self::Cache(event) => encode(event),
            Self::ChangeIndex(event) => encode(event),
            Self::AccountIndex(event) => encode(event),
            Self::GroupIndex(event) => encode(event),
            Self::ProjectIndex(event) => encode(event),
            Self::DeleteProject(event) => encode(event),
            Self::DeleteProjectChanges(event) => encode(event),
            Self::DeleteProjectMessage(event) => encode(event),
        }
    }

    /// Rebuilds a typed payload from its origin, type name and JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPayloadType`] when the type name is not valid
    /// for the origin and [`Error::Payload`] when the body does not decode.
    pub fn decode(origin: Origin, type_name: &str, payload: &str) -> Result<Self> {
        fn parse<T: DeserializeOwned>(type_name: &str, payload: &str) -> Result<T> {
            serde_json::from_str(payload).map_err(|source| Error::Payload {
                type_name: type_name.to_string(),
                source,
            })
        }

        match (origin, type_name) {
            (Origin::StreamEvent, "StreamEvent") => parse(type_name, payload).map(Self::Stream),
            (Origin::CacheEvent, "CacheEvent") => parse(type_name, payload).map(Self::Cache),
            (Origin::IndexEvent, "ChangeIndexEvent") => {
                parse(type_name, payload).map(Self::ChangeIndex)
            }
            (Origin::AccountUserIndexEvent, "AccountIndexEvent") => {
                parse(type_name, payload).map(Self::AccountIndex)
            }
            (Origin::AccountGroupIndexEvent, "GroupIndexEvent") => {
                parse(type_name, payload).map(Self::GroupIndex)
            }
            (Origin::ProjectsIndexEvent, "ProjectIndexEvent") => {
                parse(type_name, payload).map(Self::ProjectIndex)
            }
            (Origin::DeleteProjectEvent, "DeleteProjectEvent") => {
                parse(type_name, payload).map(Self::DeleteProject)
            }
            (Origin::DeleteProjectEvent, "DeleteProjectChangesEvent") => {
                parse(type_name, payload).map(Self::DeleteProjectChanges)
            }
            (Origin::DeleteProjectMessageEvent, "DeleteProjectMessage") => {
                parse(type_name, payload).map(Self::DeleteProjectMessage)
            }
            _ => Err(Error::UnknownPayloadType {
                origin,
                type_name: type_name.to_string(),
            }),
        }
    }

    fn occurrence(&self) -> &dyn ReplicatedOccurrence {
        match self {
            Self::Stream(event) => event,
            Self::Cache(event) => event,
            Self::ChangeIndex(event) => event,
            Self::AccountIndex(event) => event,
            Self::GroupIndex(event) => event,
            Self::ProjectIndex(event) => event,
            Self::DeleteProject(event) => event,
            Self::DeleteProjectChanges(event) => event,
            Self::DeleteProjectMessage(event) => event,
        }
    }

    fn occurrence_mut(&mut self) -> &mut dyn ReplicatedOccurrence {
        match self {
            Self::Stream(event) => event,
            Self::Cache(event) => event,
            Self::ChangeIndex(event) => event,
            Self::AccountIndex(event) => event,
            Self::GroupIndex(event) => event,
            Self::ProjectIndex(event) => event,
            Self::DeleteProject(event) => event,
            Self::DeleteProjectChanges(event) => event,
            Self::DeleteProjectMessage(event) => event,
        }
    }
}

impl ReplicatedOccurrence for ReplicatedEvent {
    fn meta(&self) -> &EventMeta {
        self.occurrence().meta()
    }

    fn meta_mut(&mut self) -> &mut EventMeta {
        self.occurrence_mut().meta_mut()
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for ReplicatedEvent {
                fn from(event: $ty) -> Self {
                    Self::$variant(event)
                }
            }
        )+
    };
}

impl_from_payload!(
    Stream(StreamEvent),
    Cache(CacheEvent),
    ChangeIndex(ChangeIndexEvent),
    AccountIndex(AccountIndexEvent),
    GroupIndex(GroupIndexEvent),
    ProjectIndex(ProjectIndexEvent),
    DeleteProject(DeleteProjectEvent),
    DeleteProjectChanges(DeleteProjectChangesEvent),
    DeleteProjectMessage(DeleteProjectMessage),
);

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn meta() -> EventMeta {
        EventMeta::new("node-1", 1_700_000_000_000, 5)
    }

    #[test]
    fn test_decode_rejects_type_from_other_origin() {
        let event = ReplicatedEvent::from(AccountIndexEvent { meta: meta(), account_id: 9 });
        let payload = event.payload_json().unwrap();

        assert_matches!(
            ReplicatedEvent::decode(Origin::IndexEvent, "AccountIndexEvent", &payload),
            Err(Error::UnknownPayloadType { origin: Origin::IndexEvent, .. })
        );
    }

    #[test]
    fn test_decode_reports_bad_body() {
        assert_matches!(
            ReplicatedEvent::decode(Origin::IndexEvent, "ChangeIndexEvent", "{\"project\": 3}"),
            Err(Error::Payload { type_name, .. }) if type_name == "ChangeIndexEvent"
        );
    }

    #[test]
    fn test_one_origin_two_payload_shapes() {
        let changes = ReplicatedEvent::from(DeleteProjectChangesEvent {
            meta: meta(),
            project: "ProjectA".to_string(),
            change_ids: vec![1, 2, 3],
        });
        let payload = changes.payload_json().unwrap();

        let decoded =
            ReplicatedEvent::decode(Origin::DeleteProjectEvent, changes.type_name(), &payload)
                .unwrap();
        assert_eq!(decoded, changes);
        assert_eq!(decoded.origin(), Origin::DeleteProjectEvent);
    }

    #[test]
    fn test_account_and_group_events_have_no_destination() {
        let group = ReplicatedEvent::from(GroupIndexEvent {
            meta: meta(),
            group_uuid: "abc".to_string(),
        });
        assert_eq!(group.destination(), None);
        assert_eq!(group.staging_destination(), ALL_USERS);
    }

    #[test]
    fn test_replicated_flag_through_sum_type() {
        let mut event = ReplicatedEvent::from(ProjectIndexEvent {
            meta: meta(),
            project: "ProjectA".to_string(),
            deleted: false,
        });
        assert!(!event.already_replicated());

        event.set_already_replicated(true);
        assert!(event.already_replicated());
        assert_eq!(event.destination(), Some(ALL_PROJECTS));
    }
}
