//! Settings types.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! settings file only needs the keys it overrides.

mod connection;
mod participant;

pub use connection::{LoggingSettings, ServerSettings, SessionSettings, TransportSettings};
pub use participant::ParticipantSettings;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the session link.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkSettings {
    /// Collaboration server address.
    pub server: ServerSettings,
    /// Local participant identity.
    pub participant: ParticipantSettings,
    /// Transport tuning (reconnect policy, timeouts, buffers).
    pub transport: TransportSettings,
    /// Session-level behaviour (queues, keep-alive, notifications).
    pub session: SessionSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl LinkSettings {
    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("server.url must not be empty".into()));
        }
        let t = &self.transport;
        if t.reconnection_attempts == 0 {
            return Err(SettingsError::InvalidValue(
                "transport.reconnectionAttempts must be at least 1".into(),
            ));
        }
        if t.reconnection_delay_max_ms < t.reconnection_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "transport.reconnectionDelayMaxMs ({}) is below reconnectionDelayMs ({})",
                t.reconnection_delay_max_ms, t.reconnection_delay_ms
            )));
        }
        if t.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "transport.timeoutMs must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&t.randomization_factor) {
            return Err(SettingsError::InvalidValue(format!(
                "transport.randomizationFactor ({}) must be within 0.0..=1.0",
                t.randomization_factor
            )));
        }
        if t.outbound_frame_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "transport.outboundFrameCapacity must be positive".into(),
            ));
        }
        let s = &self.session;
        if s.queue_capacity_per_category == 0 {
            return Err(SettingsError::InvalidValue(
                "session.queueCapacityPerCategory must be positive".into(),
            ));
        }
        if s.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.heartbeatIntervalMs must be positive".into(),
            ));
        }
        Ok(())
    }
}
