//! Presence announcement and roster refresh.
//!
//! On every (re)connection the local participant is announced on each
//! presence channel the server family has ever listened on, then the roster
//! is requested on each roster channel. Fire-and-forget: a failed emit is
//! logged and the remaining channels are still tried.

use chrono::{DateTime, Utc};
use maira_core::ParticipantIdentity;
use maira_core::protocol::events::{PRESENCE_CHANNELS, ROSTER_CHANNELS};
use serde_json::Value;
use tracing::{debug, warn};

use crate::transport::Transport;

/// Emits counted by one [`SessionAnnouncer::announce`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    /// Emits accepted by the transport.
    pub sent: usize,
    /// Emits rejected by the transport.
    pub failed: usize,
}

/// Announces the local participant.
#[derive(Clone, Debug)]
pub struct SessionAnnouncer {
    client_agent: String,
}

impl SessionAnnouncer {
    /// Announcer reporting `client_agent` in presence payloads.
    pub fn new(client_agent: impl Into<String>) -> Self {
        Self {
            client_agent: client_agent.into(),
        }
    }

    /// Client agent string sent as `navegador`.
    #[must_use]
    pub fn client_agent(&self) -> &str {
        &self.client_agent
    }

    /// Announce `identity` and request the roster, timestamped now.
    pub fn announce(
        &self,
        identity: &ParticipantIdentity,
        transport: &mut dyn Transport,
    ) -> AnnounceReport {
        self.announce_at(identity, transport, Utc::now())
    }

    /// Announce `identity` and request the roster with an explicit timestamp.
    pub fn announce_at(
        &self,
        identity: &ParticipantIdentity,
        transport: &mut dyn Transport,
        at: DateTime<Utc>,
    ) -> AnnounceReport {
        let mut report = AnnounceReport::default();
        let presence = to_value(identity.presence(&self.client_agent, at));
        for channel in PRESENCE_CHANNELS {
            emit(transport, channel, &presence, &mut report);
        }
        let roster = to_value(identity.roster_request());
        for channel in ROSTER_CHANNELS {
            emit(transport, channel, &roster, &mut report);
        }
        debug!(
            participant = %identity.id,
            operation = %identity.operation_id,
            sent = report.sent,
            failed = report.failed,
            "presence announced"
        );
        report
    }
}

fn to_value<T: serde::Serialize>(payload: T) -> Value {
    // Payload structs hold only strings and bools.
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn emit(transport: &mut dyn Transport, channel: &str, payload: &Value, report: &mut AnnounceReport) {
    match transport.emit(channel, payload) {
        Ok(()) => report.sent += 1,
        Err(e) => {
            report.failed += 1;
            warn!(channel, error = %e, "announce emit failed");
        }
    }
}
