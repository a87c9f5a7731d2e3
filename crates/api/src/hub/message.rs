//! Hub wire messages and events.

use serde::{Deserialize, Serialize};

use widget_store_core::UserId;

/// What a client asked for. Anything unrecognized decodes as `Unknown` and
/// is ignored by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ClientAction {
    #[serde(rename = "deleteUser", alias = "delete-user")]
    DeleteUser,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A JSON text frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientPayload {
    #[serde(default)]
    pub action: ClientAction,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub user_id: UserId,
}

impl ClientPayload {
    /// The server event this payload triggers, if any.
    #[must_use]
    pub const fn event(&self) -> Option<HubEvent> {
        match self.action {
            ClientAction::DeleteUser => Some(HubEvent::UserDeleted {
                user_id: self.user_id,
            }),
            ClientAction::Unknown => None,
        }
    }
}

/// Events broadcast to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubEvent {
    /// The user's account is gone; their dashboard sessions should log out.
    UserDeleted { user_id: UserId },
}

impl HubEvent {
    #[must_use]
    pub fn to_message(self) -> ServerMessage {
        match self {
            Self::UserDeleted { user_id } => ServerMessage {
                action: "logout".to_owned(),
                message: "Your account has been deleted".to_owned(),
                user_id,
            },
        }
    }
}

/// A JSON text frame sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerMessage {
    pub action: String,
    pub message: String,
    pub user_id: UserId,
}

impl ServerMessage {
    /// Acknowledgement sent to a connection right after it registers.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            action: String::new(),
            message: "Connected to server".to_owned(),
            user_id: UserId::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_user_wire_names() {
        for raw in [
            r#"{"action":"deleteUser","user_id":3}"#,
            r#"{"action":"delete-user","user_id":3}"#,
        ] {
            let payload: ClientPayload = serde_json::from_str(raw).unwrap();
            assert_eq!(
                payload.event(),
                Some(HubEvent::UserDeleted {
                    user_id: UserId::new(3)
                })
            );
        }
    }

    #[test]
    fn test_unknown_action_is_a_no_op() {
        let payload: ClientPayload =
            serde_json::from_str(r#"{"action":"dance","message":"hi"}"#).unwrap();
        assert_eq!(payload.action, ClientAction::Unknown);
        assert_eq!(payload.event(), None);
    }

    #[test]
    fn test_missing_action_is_unknown() {
        let payload: ClientPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.action, ClientAction::Unknown);
    }

    #[test]
    fn test_logout_message_shape() {
        let msg = HubEvent::UserDeleted {
            user_id: UserId::new(9),
        }
        .to_message();
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({
                "action": "logout",
                "message": "Your account has been deleted",
                "user_id": 9
            })
        );
    }

    #[test]
    fn test_connected_ack_shape() {
        assert_eq!(
            serde_json::to_value(ServerMessage::connected()).unwrap(),
            serde_json::json!({"action": "", "message": "Connected to server", "user_id": 0})
        );
    }
}
