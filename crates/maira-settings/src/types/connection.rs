//! Server, transport, session and logging settings.

use maira_core::ReconnectPolicy;
use maira_core::retry::{
    DEFAULT_RANDOMIZATION_FACTOR, DEFAULT_RECONNECTION_ATTEMPTS, DEFAULT_RECONNECTION_DELAY_MAX_MS,
    DEFAULT_RECONNECTION_DELAY_MS, DEFAULT_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};

/// Collaboration server address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Base URL (`http`, `https`, `ws` or `wss`).
    pub url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Transport tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Initial reconnect delay in milliseconds.
    pub reconnection_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub reconnection_delay_max_ms: u64,
    /// Reconnect attempts before giving up.
    pub reconnection_attempts: u32,
    /// Per-attempt connect timeout in milliseconds.
    pub timeout_ms: u64,
    /// Backoff jitter factor (0.0–1.0).
    pub randomization_factor: f64,
    /// Capacity of the outbound frame channel feeding the socket writer.
    pub outbound_frame_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            reconnection_delay_ms: DEFAULT_RECONNECTION_DELAY_MS,
            reconnection_delay_max_ms: DEFAULT_RECONNECTION_DELAY_MAX_MS,
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            outbound_frame_capacity: 256,
        }
    }
}

impl TransportSettings {
    /// The reconnect policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            reconnection_attempts: self.reconnection_attempts,
            reconnection_delay_ms: self.reconnection_delay_ms,
            reconnection_delay_max_ms: self.reconnection_delay_max_ms,
            timeout_ms: self.timeout_ms,
            randomization_factor: self.randomization_factor,
        }
    }
}

/// Session-level behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Maximum queued messages per category while disconnected (drop-oldest beyond).
    pub queue_capacity_per_category: usize,
    /// Keep-alive interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Capacity of the notification channel handed to the application.
    pub notification_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_capacity_per_category: 1000,
            heartbeat_interval_ms: 30_000,
            notification_capacity: 64,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
