//! Unified error handling for the chatlink client.
//!
//! Errors split into two classes that drive reconnection: transport-class
//! failures are retryable with backoff, protocol rejections are terminal.
//! [`ClientError::is_retryable`] encodes that split in one place.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Transport Errors (socket layer)
// ============================================================================

/// Failures at the socket boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed by peer")]
    Closed,
}

// ============================================================================
// Client Errors (public API surface)
// ============================================================================

/// Errors surfaced by the client API and its event stream.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("wire protocol error: {0}")]
    Protocol(#[from] chatlink_proto::ProtocolError),

    /// Dial did not produce an open socket in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Server did not answer the auth request in time.
    #[error("authentication timed out after {0:?}")]
    AuthTimeout(Duration),

    /// Server explicitly rejected the credentials. Never retried.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Operation requires an authenticated connection.
    #[error("not connected")]
    NotConnected,

    #[error("message too long: {actual} chars (limit: {limit})")]
    MessageTooLong { actual: usize, limit: usize },

    /// The worker task is gone; the client handle is unusable.
    #[error("client is closed")]
    Closed,
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Protocol(_) => "protocol_error",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::AuthTimeout(_) => "auth_timeout",
            Self::AuthRejected(_) => "auth_rejected",
            Self::NotConnected => "not_connected",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::Closed => "client_closed",
        }
    }

    /// Whether the reconnection controller should retry after this error.
    ///
    /// Transport drops and timeouts are transient; everything the
    /// server said on purpose is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectTimeout(_) | Self::AuthTimeout(_)
        )
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
