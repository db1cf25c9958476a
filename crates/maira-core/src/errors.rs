//! Error hierarchy for the session link.
//!
//! [`LinkError`] covers every failure the link can observe at its transport
//! boundary. Each variant is classified by [`ErrorCategory`] and
//! [`ErrorSeverity`] so callers can decide between logging, notifying the
//! user and retrying without matching on variants themselves.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Error category for classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad configuration or missing runtime support.
    Configuration,
    /// Network connectivity issues.
    Network,
    /// Malformed or unexpected wire data.
    Protocol,
    /// The session object has been shut down.
    Closed,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Network => write!(f, "network"),
            Self::Protocol => write!(f, "protocol"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Error severity levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Terminal for the current connection episode; needs a user decision.
    Fatal,
    /// Standard error, reported but not retried by this layer.
    Error,
    /// Temporary issue, handled by the reconnect policy.
    Transient,
}

// ─────────────────────────────────────────────────────────────────────────────
// LinkError
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the session link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The transport object could not be created (bad address, no runtime).
    #[error("transport construction failed: {message}")]
    TransportConstruction {
        /// Human-readable cause.
        message: String,
    },

    /// A single connection attempt failed.
    #[error("connect attempt {attempt} failed: {message}")]
    Connect {
        /// 1-based attempt number within the current episode.
        attempt: u32,
        /// Human-readable cause.
        message: String,
    },

    /// The reconnect budget was used up.
    #[error("reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// A transmit on the live transport failed; the message was not delivered.
    #[error("send of '{event}' failed: {message}")]
    Send {
        /// Outbound event name.
        event: String,
        /// Human-readable cause.
        message: String,
    },

    /// The transport's local outbound buffer is full; nothing was written.
    #[error("outbound buffer full, '{event}' not accepted")]
    Backpressure {
        /// Outbound event name.
        event: String,
    },

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The session (or its event loop) is gone.
    #[error("session link is closed")]
    Closed,
}

impl LinkError {
    /// Shorthand for a [`LinkError::TransportConstruction`].
    #[must_use]
    pub fn construction(message: impl Into<String>) -> Self {
        Self::TransportConstruction {
            message: message.into(),
        }
    }

    /// Shorthand for a [`LinkError::Send`].
    #[must_use]
    pub fn send(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`LinkError::Backpressure`].
    #[must_use]
    pub fn backpressure(event: impl Into<String>) -> Self {
        Self::Backpressure {
            event: event.into(),
        }
    }

    /// Whether the transport only refused for lack of buffer space and will
    /// accept again once it has flushed.
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Backpressure { .. })
    }

    /// Error category for classification.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TransportConstruction { .. } => ErrorCategory::Configuration,
            Self::Connect { .. }
            | Self::ReconnectExhausted { .. }
            | Self::Send { .. }
            | Self::Backpressure { .. } => ErrorCategory::Network,
            Self::Codec(_) => ErrorCategory::Protocol,
            Self::Closed => ErrorCategory::Closed,
        }
    }

    /// Error severity level.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ReconnectExhausted { .. } => ErrorSeverity::Fatal,
            Self::TransportConstruction { .. } | Self::Codec(_) | Self::Closed => {
                ErrorSeverity::Error
            }
            Self::Connect { .. } | Self::Send { .. } | Self::Backpressure { .. } => {
                ErrorSeverity::Transient
            }
        }
    }

    /// Whether the reconnect policy should keep trying after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Transient
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransportConstruction { .. } => "TRANSPORT_CONSTRUCTION",
            Self::Connect { .. } => "CONNECT_ERROR",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::Send { .. } => "SEND_FAILURE",
            Self::Backpressure { .. } => "BACKPRESSURE",
            Self::Codec(_) => "CODEC_ERROR",
            Self::Closed => "CLOSED",
        }
    }
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn construction_display() {
        let err = LinkError::construction("malformed address 'ht!tp'");
        assert_eq!(
            err.to_string(),
            "transport construction failed: malformed address 'ht!tp'"
        );
        assert_eq!(err.code(), "TRANSPORT_CONSTRUCTION");
    }

    #[test]
    fn construction_is_not_retryable() {
        let err = LinkError::construction("no runtime");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.is_retryable());
    }

    #[test]
    fn connect_is_transient() {
        let err = LinkError::Connect {
            attempt: 2,
            message: "refused".into(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Transient);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("attempt 2"));
    }

    #[test]
    fn exhausted_is_fatal() {
        let err = LinkError::ReconnectExhausted { attempts: 10 };
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn send_helper() {
        let err = LinkError::send("mensajeChat", "channel full");
        assert_matches!(err, LinkError::Send { ref event, .. } if event == "mensajeChat");
        assert_eq!(err.code(), "SEND_FAILURE");
    }

    #[test]
    fn backpressure_is_distinct_from_send_failure() {
        let err = LinkError::backpressure("mensajeChat");
        assert!(err.is_backpressure());
        assert!(err.is_retryable());
        assert_eq!(err.code(), "BACKPRESSURE");
        assert!(!LinkError::send("mensajeChat", "transport closed").is_backpressure());
    }

    #[test]
    fn codec_category() {
        let err = LinkError::Codec("bad packet type".into());
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::Network.to_string(), "network");
        assert_eq!(ErrorCategory::Closed.to_string(), "closed");
    }

    #[test]
    fn severity_serde() {
        let json = serde_json::to_string(&ErrorSeverity::Transient).unwrap();
        assert_eq!(json, "\"transient\"");
    }
}
