use crate::Principal;

/// Request context passed explicitly along the firing and replay call chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventContext {
    /// Identity the notification is being delivered under.
    pub principal: Principal,
    /// Node the notification was replayed from, `None` for local notifications.
    pub replayed_from: Option<String>,
}

impl EventContext {
    /// Context for a notification fired by local request handling.
    #[must_use]
    pub const fn local(principal: Principal) -> Self {
        Self {
            principal,
            replayed_from: None,
        }
    }

    /// Context for a notification replayed from another node. Replays run as the server.
    pub fn replayed(from_node: impl Into<String>) -> Self {
        Self {
            principal: Principal::Internal,
            replayed_from: Some(from_node.into()),
        }
    }

    /// Whether the notification came from another node.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        self.replayed_from.is_some()
    }
}
