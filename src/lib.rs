//! # chatlink
//!
//! A real-time chat messaging client over WebSocket.
//!
//! The client keeps a persistent connection to a chat backend, speaks the
//! JSON wire protocol from [`chatlink_proto`], and hides connection churn
//! from the application: it authenticates on connect, rejoins rooms after
//! a reconnect, suppresses redelivered messages, and backs off
//! exponentially between dial attempts.
//!
//! ```no_run
//! use chatlink::{ChatClient, ClientConfig, Credentials, EventKind};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let client = ChatClient::new(ClientConfig::new("wss://chat.example.net/ws"))?;
//! client.on(EventKind::Message, |event| println!("{event:?}"));
//! client.connect(Credentials {
//!     token: "tok".into(),
//!     user_id: "u1".into(),
//!     username: "ada".into(),
//! })?;
//! client.join("global")?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod rooms;
pub mod session;
pub mod transport;

pub use client::ChatClient;
pub use config::{BackoffConfig, ClientConfig, ConfigError, DedupConfig};
pub use error::{ClientError, ClientResult, TransportError};
pub use events::{ClientEvent, EventKind, HandlerId};
pub use rooms::Room;
pub use session::{ConnectionState, Credentials, Session};

pub use chatlink_proto::ChatMessage;
