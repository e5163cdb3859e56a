//! Error types for the wire codec.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors produced while encoding or decoding wire frames.
///
/// Both variants wrap [`serde_json::Error`]; they are kept separate because
/// the client treats them very differently (an encode failure is a local
/// bug, a decode failure is a bad inbound frame to drop and log).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Failed to serialize an outbound envelope.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to parse an inbound frame.
    ///
    /// Carries a truncated copy of the offending frame for log context.
    #[error("decode error in frame {frame:?}: {cause}")]
    Decode {
        /// The inbound frame, truncated for logging.
        frame: String,
        /// The underlying JSON error.
        #[source]
        cause: serde_json::Error,
    },
}

// Frames can be arbitrarily large; cap what we keep for error context.
const FRAME_CONTEXT_LIMIT: usize = 256;

impl ProtocolError {
    pub(crate) fn encode(cause: serde_json::Error) -> Self {
        ProtocolError::Encode(cause)
    }

    pub(crate) fn decode(frame: &str, cause: serde_json::Error) -> Self {
        let end = frame
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= FRAME_CONTEXT_LIMIT)
            .last()
            .unwrap_or(0);
        ProtocolError::Decode {
            frame: frame[..end].to_string(),
            cause,
        }
    }
}
