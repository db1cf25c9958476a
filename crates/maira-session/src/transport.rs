//! The seam between the session core and a concrete duplex transport.

use maira_core::{ElementId, LinkError, OperationId};
use serde_json::Value;

/// A live, named-event duplex transport.
///
/// Implementations must not block: `emit` hands the frame to the I/O side and
/// returns. An `Err` means the frame was not accepted and must be treated as
/// undelivered.
pub trait Transport: Send {
    /// Send one named event.
    fn emit(&mut self, event: &str, payload: &Value) -> Result<(), LinkError>;

    /// Tear the transport down. Events it still produces carry its old
    /// generation and are discarded by the owner.
    fn close(&mut self);
}

/// Where to connect and as whom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Collaboration server address.
    pub server_url: String,
    /// Operation to join.
    pub operation_id: OperationId,
    /// Element the participant is working as.
    pub working_element_id: ElementId,
}

/// Creates transports.
pub trait TransportFactory: Send {
    /// Open a transport for `target`, tagging its events with `generation`.
    ///
    /// Fails only when the transport object itself cannot be built (bad
    /// address, no runtime). Connection failures arrive later as events.
    fn open(
        &mut self,
        generation: u64,
        target: &ConnectTarget,
    ) -> Result<Box<dyn Transport>, LinkError>;
}

/// Lifecycle and message events reported by a transport.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Connected (initially or after a reconnect).
    Connect,
    /// A connection attempt failed.
    ConnectError(String),
    /// The connection closed.
    Disconnect {
        /// Why it closed; `"io client disconnect"` marks a local teardown.
        reason: String,
    },
    /// A reconnect attempt is about to start.
    ReconnectAttempt {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Reconnected after `attempt` attempts. Always followed by [`Self::Connect`].
    Reconnect {
        /// Attempts it took.
        attempt: u32,
    },
    /// A reconnect attempt failed.
    ReconnectError(String),
    /// The reconnect budget is used up.
    ReconnectFailed,
    /// Server-initiated liveness probe.
    Ping(Value),
    /// Generic transport error.
    Error(String),
    /// Application-level inbound event.
    Message {
        /// Event name.
        event: String,
        /// Payload (first argument).
        payload: Value,
    },
}

impl TransportEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Connect => "connect",
            Self::ConnectError(_) => "connect_error",
            Self::Disconnect { .. } => "disconnect",
            Self::ReconnectAttempt { .. } => "reconnect_attempt",
            Self::Reconnect { .. } => "reconnect",
            Self::ReconnectError(_) => "reconnect_error",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Ping(_) => "ping",
            Self::Error(_) => "error",
            Self::Message { event, .. } => event,
        }
    }
}
