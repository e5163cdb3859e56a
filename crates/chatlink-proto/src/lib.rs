//! # chatlink-proto
//!
//! Wire protocol types and JSON codec for the chatlink messaging client.
//!
//! Every frame on the wire is a single JSON object carrying a `type` tag
//! that selects the payload shape. This crate owns the [`Envelope`] enum
//! modeling that contract, the [`ChatMessage`] payload, and the
//! [`encode`]/[`decode`] entry points. Field names are part of the server
//! contract and must never change.
//!
//! ## Quick Start
//!
//! ```rust
//! use chatlink_proto::{decode, encode, Envelope};
//!
//! let frame = encode(&Envelope::JoinRoom { room_id: "global".into() }).unwrap();
//! assert_eq!(frame, r#"{"type":"join_room","room_id":"global"}"#);
//!
//! match decode(r#"{"type":"room_joined","room_id":"global"}"#).unwrap() {
//!     Envelope::RoomJoined { room_id } => assert_eq!(room_id, "global"),
//!     other => panic!("unexpected envelope: {other:?}"),
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;

pub use envelope::{ChatMessage, Envelope};
pub use error::{ProtocolError, Result};

/// Serialize an envelope to its single-frame JSON wire form.
pub fn encode(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(envelope).map_err(ProtocolError::encode)
}

/// Parse a single JSON frame into an [`Envelope`].
///
/// Unknown `type` tags, missing required fields, and malformed JSON all
/// surface as [`ProtocolError::Decode`]; callers decide whether a bad
/// frame is fatal (for this client it never is).
pub fn decode(frame: &str) -> Result<Envelope> {
    serde_json::from_str(frame).map_err(|cause| ProtocolError::decode(frame, cause))
}
