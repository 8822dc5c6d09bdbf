//! Error taxonomy for the realtime session engine.
//!
//! Three families, mirroring how failures propagate:
//! - connection errors (transport-level, may trigger reconnection),
//! - protocol decode errors (per-frame, never fatal to the session),
//! - domain errors (returned synchronously to the calling operation).

use thiserror::Error;

/// Top-level error type for every fallible engine operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // ── Connection ────────────────────────────────────────────────
    /// An operation required an open socket and none exists.
    #[error("not connected to the realtime service")]
    NotConnected,

    /// The WebSocket session object (request or socket) could not be built.
    #[error("failed to create realtime session: {0}")]
    SessionCreationFailed(String),

    /// A frame could not be written to the socket.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The socket failed while receiving.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Reconnection gave up after the maximum number of attempts.
    #[error("maximum reconnect attempts reached, connection abandoned")]
    MaxReconnectAttemptsReached,

    /// The session never became ready within the readiness window.
    #[error("timed out waiting for session readiness")]
    ConnectionTimeout,

    // ── Protocol ──────────────────────────────────────────────────
    /// An inbound frame failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An outbound command failed to serialize.
    #[error("failed to encode command: {0}")]
    Encode(String),

    // ── Domain ────────────────────────────────────────────────────
    /// An operation requires a confirmed session and the state machine
    /// is not `Ready`.
    #[error("session is not ready for this operation")]
    SessionNotReady,

    /// A commit was attempted under the minimum-duration floor.
    /// Carries everything the caller needs for an actionable message.
    #[error(
        "audio buffer too small to commit: measured {duration_ms:.1}ms of audio, \
         {minimum_ms}ms minimum required ({bytes} bytes staged)"
    )]
    BufferTooSmall {
        duration_ms: f64,
        bytes: u64,
        minimum_ms: u64,
    },

    /// A configuration value was rejected before ever reaching the wire.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Why a single inbound frame failed to decode.
///
/// Decode failures carry the offending field path and, where feasible, the
/// raw payload. They are surfaced as discrete events and logged; they never
/// abort the receive loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// A required field was absent.
    #[error("missing field `{path}`")]
    MissingField { path: String },

    /// A field held a value of the wrong type.
    #[error("invalid type at `{path}`: {detail}")]
    TypeMismatch { path: String, detail: String },

    /// A field was explicitly null where a value was required.
    #[error("null value for required field `{path}`")]
    NullValue { path: String },

    /// The payload was structurally unusable (bad JSON, contradictory
    /// discriminants, unrecognized secondary tags).
    #[error("corrupted payload: {detail}")]
    Corrupted { detail: String, raw: String },
}

impl DecodeError {
    /// Shorthand for a corruption error with its raw payload attached.
    pub fn corrupted(detail: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Corrupted {
            detail: detail.into(),
            raw: raw.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_too_small_message_is_actionable() {
        let err = Error::BufferTooSmall {
            duration_ms: 83.3,
            bytes: 2000,
            minimum_ms: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("83.3ms"));
        assert!(msg.contains("100ms minimum"));
        assert!(msg.contains("2000 bytes"));
    }

    #[test]
    fn decode_errors_carry_field_paths() {
        let err = DecodeError::MissingField {
            path: "session.id".into(),
        };
        assert!(err.to_string().contains("`session.id`"));

        let err = DecodeError::NullValue {
            path: "item.role".into(),
        };
        assert!(err.to_string().contains("`item.role`"));
    }
}
