//! Connection state machine and session identity.

use std::fmt;

/// Connection lifecycle states.
///
/// Transitions are driven exclusively by the worker task; the public
/// handle only observes them through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no pending work.
    Disconnected,
    /// Socket dial in progress.
    Connecting,
    /// Socket open, waiting for the server's auth verdict.
    Authenticating,
    /// Authenticated and live.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
    /// Terminal: the server rejected the credentials. No automatic retry.
    Failed,
}

impl ConnectionState {
    /// Whether outbound sends are currently accepted.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Credentials presented during the auth handshake.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Opaque bearer credential.
    pub token: String,
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// An authenticated session.
///
/// Only ever constructed by the worker after the server confirms auth,
/// so holding a `Session` implies the handshake succeeded.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// The credential the session was established with.
    pub token: String,
}

impl Session {
    /// Promote credentials into a session once the server confirms them.
    pub fn establish(credentials: &Credentials) -> Self {
        Self {
            user_id: credentials.user_id.clone(),
            username: credentials.username.clone(),
            token: credentials.token.clone(),
        }
    }
}
