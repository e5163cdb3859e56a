//! Wire envelope and payload types.
//!
//! Everything here mirrors the server's JSON contract field-for-field.
//! Renames are explicit rather than relying on `rename_all` so that a
//! refactor of a Rust identifier can never silently change the wire.

use serde::{Deserialize, Serialize};

/// A chat message as carried on the wire and delivered to applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned message id. Absent on outbound frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Room the message belongs to.
    pub room_id: String,
    /// Sender's stable identifier.
    pub user_id: String,
    /// Sender's display name at send time.
    pub username: String,
    /// Message text.
    pub message: String,
    /// Sender-side timestamp, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A single wire frame, tagged by its `type` field.
///
/// Client-to-server variants: [`Authenticate`](Envelope::Authenticate),
/// [`JoinRoom`](Envelope::JoinRoom), [`LeaveRoom`](Envelope::LeaveRoom),
/// [`Message`](Envelope::Message). The rest flow server-to-client, though
/// the codec does not enforce direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Authentication request, sent once immediately after connecting.
    #[serde(rename = "authenticate")]
    Authenticate {
        /// Opaque bearer credential.
        token: String,
        /// Stable user identifier.
        user_id: String,
        /// Display name.
        username: String,
    },

    /// Authentication accepted.
    // Struct variant rather than unit so extra fields a server might
    // attach are tolerated on decode.
    #[serde(rename = "authenticated")]
    Authenticated {},

    /// Authentication rejected.
    #[serde(rename = "authentication_failed")]
    AuthenticationFailed {
        /// Server-supplied rejection reason, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Request to join a room.
    #[serde(rename = "join_room")]
    JoinRoom {
        /// Target room.
        room_id: String,
    },

    /// Request to leave a room.
    #[serde(rename = "leave_room")]
    LeaveRoom {
        /// Target room.
        room_id: String,
    },

    /// Join confirmed by the server.
    #[serde(rename = "room_joined")]
    RoomJoined {
        /// The room that was joined.
        room_id: String,
    },

    /// Server-reported error, optionally scoped to a room.
    #[serde(rename = "error")]
    Error {
        /// Room the error relates to, when scoped.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        /// Human-readable reason, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A chat message, in either direction.
    #[serde(rename = "message")]
    Message(ChatMessage),

    /// Presence: a user entered a room.
    #[serde(rename = "user_joined")]
    UserJoined {
        /// Room the user entered.
        room_id: String,
        /// Entering user's identifier.
        user_id: String,
        /// Entering user's display name.
        username: String,
    },

    /// Presence: a user left a room.
    #[serde(rename = "user_left")]
    UserLeft {
        /// Room the user left.
        room_id: String,
        /// Leaving user's identifier.
        user_id: String,
        /// Leaving user's display name.
        username: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip_preserves_id() {
        let msg = ChatMessage {
            id: Some("m-1".into()),
            room_id: "global".into(),
            user_id: "u1".into(),
            username: "ada".into(),
            message: "hello".into(),
            timestamp: 1_700_000_000_000,
        };
        let frame = serde_json::to_string(&Envelope::Message(msg.clone())).unwrap();
        match serde_json::from_str(&frame).unwrap() {
            Envelope::Message(decoded) => assert_eq!(decoded, msg),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_outbound_message_omits_absent_id() {
        let msg = ChatMessage {
            id: None,
            room_id: "global".into(),
            user_id: "u1".into(),
            username: "ada".into(),
            message: "hello".into(),
            timestamp: 0,
        };
        let frame = serde_json::to_string(&Envelope::Message(msg)).unwrap();
        assert!(!frame.contains("\"id\""));
    }

    #[test]
    fn test_authenticated_tolerates_extra_fields() {
        let frame = r#"{"type":"authenticated","session_ttl":3600}"#;
        match serde_json::from_str(frame).unwrap() {
            Envelope::Authenticated {} => {}
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_error_fields_are_optional() {
        match serde_json::from_str(r#"{"type":"error"}"#).unwrap() {
            Envelope::Error { room_id, reason } => {
                assert!(room_id.is_none());
                assert!(reason.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}
