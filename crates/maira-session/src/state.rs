//! Connection lifecycle state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifecycle state of the duplex connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport, or explicitly torn down.
    #[default]
    Disconnected,
    /// A transport exists and its first connection attempt is in flight.
    Connecting,
    /// The transport is connected; outbound messages are sent immediately.
    Connected,
    /// The connection dropped involuntarily and the transport is retrying.
    Reconnecting,
    /// The retry budget is exhausted. Terminal until `connect()` is called.
    Failed,
}

impl ConnectionState {
    /// Whether `self → to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Failed, Reconnecting};
        match (self, to) {
            // Explicit teardown and explicit (re)connect are always allowed.
            (_, Disconnected | Connecting) => true,
            (Connecting | Connected | Reconnecting, Connected) => true,
            (Connecting | Connected | Reconnecting, Reconnecting) => true,
            (Connecting | Reconnecting, Failed) => true,
            _ => false,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the connection, for diagnostics and UI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    /// Current state.
    pub state: ConnectionState,
    /// When the connection last entered `Connected`.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Reconnect attempts in the current episode.
    pub retry_count: u32,
    /// Connect errors observed since the last successful connection.
    pub connect_errors: u32,
    /// Messages waiting in the outbound queue, all categories.
    pub queued: usize,
    /// Generation of the live transport (0 before the first `connect()`).
    pub generation: u64,
}

/// Owns the current [`ConnectionState`] and its diagnostics.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: ConnectionState,
    last_connected_at: Option<DateTime<Utc>>,
    retry_count: u32,
}

impl StateMachine {
    /// A machine in `Disconnected`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// When the connection last entered `Connected`.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        self.last_connected_at
    }

    /// Reconnect attempts in the current episode.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Move to `to` if legal. Returns whether the transition happened.
    pub fn transition(&mut self, to: ConnectionState) -> bool {
        let from = self.state;
        if !from.can_transition_to(to) {
            debug!(%from, %to, "ignoring illegal connection state transition");
            return false;
        }
        if from != to {
            debug!(%from, %to, "connection state transition");
        }
        self.state = to;
        true
    }

    /// Enter `Connecting` for a fresh transport.
    pub fn begin_connect(&mut self) -> bool {
        let moved = self.transition(ConnectionState::Connecting);
        if moved {
            self.retry_count = 0;
        }
        moved
    }

    /// Enter `Connected`, recording the timestamp and resetting the retry counter.
    pub fn connected(&mut self, at: DateTime<Utc>) -> bool {
        let moved = self.transition(ConnectionState::Connected);
        if moved {
            self.last_connected_at = Some(at);
            self.retry_count = 0;
        }
        moved
    }

    /// Enter `Reconnecting`, optionally recording the attempt number.
    pub fn reconnecting(&mut self, attempt: Option<u32>) -> bool {
        let moved = self.transition(ConnectionState::Reconnecting);
        if moved {
            if let Some(attempt) = attempt {
                self.retry_count = attempt;
            }
        }
        moved
    }

    /// Enter the terminal `Failed` state.
    pub fn failed(&mut self) -> bool {
        self.transition(ConnectionState::Failed)
    }

    /// Enter `Disconnected` after an explicit teardown.
    pub fn disconnected(&mut self) -> bool {
        self.transition(ConnectionState::Disconnected)
    }
}
