//! Wire vocabulary shared with the collaboration server.
//!
//! Event names and field names are fixed by the server and kept verbatim
//! (they are Spanish). Rust-side names are English and mapped with serde.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::CLIENT_ROLE;
use crate::ids::{ElementId, OperationId, ParticipantId};

/// Outbound and inbound event names.
pub mod events {
    /// Presence announcement (current servers).
    pub const ANNOUNCE_ELEMENT: &str = "anunciarElemento";
    /// Presence announcement (legacy servers).
    pub const NEW_ELEMENT: &str = "nuevoElemento";
    /// Presence announcement (legacy servers).
    pub const ELEMENT_CONNECTED: &str = "elementoConectado";
    /// Presence announcement (oldest servers).
    pub const CONNECTED: &str = "conectado";

    /// Roster refresh request (current servers).
    pub const REQUEST_ELEMENTS: &str = "solicitarElementos";
    /// Roster refresh request backed by the server database.
    pub const REQUEST_ELEMENTS_DB: &str = "solicitarElementosDB";
    /// Roster refresh request (legacy servers).
    pub const LIST_ELEMENTS: &str = "listaElementos";

    /// Chat message.
    pub const CHAT_MESSAGE: &str = "mensajeChat";
    /// Position update.
    pub const POSITION_UPDATE: &str = "actualizarPosicionGB";
    /// Periodic keep-alive.
    pub const HEARTBEAT: &str = "heartbeat";
    /// Server-initiated liveness probe.
    pub const PING: &str = "ping";
    /// Reply to [`PING`].
    pub const PONG: &str = "pong";

    /// Every channel a presence payload is sent on, in send order.
    pub const PRESENCE_CHANNELS: [&str; 4] =
        [ANNOUNCE_ELEMENT, NEW_ELEMENT, ELEMENT_CONNECTED, CONNECTED];

    /// Every channel a roster request is sent on, in send order.
    pub const ROSTER_CHANNELS: [&str; 3] = [REQUEST_ELEMENTS, REQUEST_ELEMENTS_DB, LIST_ELEMENTS];
}

/// Format a timestamp the way every payload carries it.
#[must_use]
pub fn wire_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Message categories
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of outbound domain messages; each has its own FIFO queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    /// Chat messages.
    Chat,
    /// Position updates.
    Position,
    /// Entity (element) announcements.
    ///
    /// These go out on [`events::NEW_ELEMENT`], the same channel presence uses
    /// for legacy servers. The server upserts an element either way; a
    /// presence payload is the one carrying `tipo: "cliente"`.
    Entity,
}

impl MessageCategory {
    /// All categories, in drain order.
    pub const ALL: [Self; 3] = [Self::Chat, Self::Position, Self::Entity];

    /// Outbound event name used to transmit messages of this category.
    #[must_use]
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Chat => events::CHAT_MESSAGE,
            Self::Position => events::POSITION_UPDATE,
            Self::Entity => events::NEW_ELEMENT,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Position => "position",
            Self::Entity => "entity",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// The local participant as announced to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    /// Participant ID.
    pub id: ParticipantId,
    /// Name shown to other participants.
    pub display_name: String,
    /// Element the participant is working as.
    pub working_element_id: ElementId,
    /// Operation the participant has joined.
    pub operation_id: OperationId,
}

impl ParticipantIdentity {
    /// Build the presence payload announced on every (re)connection.
    #[must_use]
    pub fn presence(&self, client_agent: &str, at: DateTime<Utc>) -> PresencePayload {
        PresencePayload {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            element: self.working_element_id.clone(),
            operation: self.operation_id.clone(),
            timestamp: wire_timestamp(at),
            connected: true,
            client_agent: client_agent.to_owned(),
            role: CLIENT_ROLE.to_owned(),
        }
    }

    /// Build the roster refresh request.
    #[must_use]
    pub fn roster_request(&self) -> RosterRequest {
        RosterRequest {
            operation: self.operation_id.clone(),
            requester: self.id.clone(),
        }
    }

    /// Build a keep-alive payload.
    #[must_use]
    pub fn heartbeat(&self, at: DateTime<Utc>) -> HeartbeatPayload {
        HeartbeatPayload {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            operation: self.operation_id.clone(),
            timestamp: wire_timestamp(at),
        }
    }

    /// Build the reply to a server `ping`.
    #[must_use]
    pub fn pong(&self, at: DateTime<Utc>) -> PongPayload {
        PongPayload {
            id: self.id.clone(),
            timestamp: wire_timestamp(at),
            operation: self.operation_id.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Presence announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// Participant ID.
    pub id: ParticipantId,
    /// Display name.
    #[serde(rename = "usuario")]
    pub display_name: String,
    /// Working element.
    #[serde(rename = "elemento")]
    pub element: ElementId,
    /// Operation.
    #[serde(rename = "operacion")]
    pub operation: OperationId,
    /// Client timestamp (RFC 3339).
    pub timestamp: String,
    /// Always `true` for an announcement.
    #[serde(rename = "conectado")]
    pub connected: bool,
    /// Client agent string.
    #[serde(rename = "navegador")]
    pub client_agent: String,
    /// Fixed role marker, `"cliente"`.
    #[serde(rename = "tipo")]
    pub role: String,
}

/// Roster refresh request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRequest {
    /// Operation whose roster is requested.
    #[serde(rename = "operacion")]
    pub operation: OperationId,
    /// Requesting participant.
    #[serde(rename = "solicitante")]
    pub requester: ParticipantId,
}

/// Periodic keep-alive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Participant ID.
    pub id: ParticipantId,
    /// Display name.
    #[serde(rename = "usuario")]
    pub display_name: String,
    /// Operation.
    #[serde(rename = "operacion")]
    pub operation: OperationId,
    /// Client timestamp (RFC 3339).
    pub timestamp: String,
}

/// Reply to a server-initiated `ping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongPayload {
    /// Participant ID.
    pub id: ParticipantId,
    /// Client timestamp (RFC 3339).
    pub timestamp: String,
    /// Operation.
    #[serde(rename = "operacion")]
    pub operation: OperationId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> ParticipantIdentity {
        ParticipantIdentity {
            id: ParticipantId::from("u-1"),
            display_name: "Capitán Ruiz".into(),
            working_element_id: ElementId::from("cia-2"),
            operation_id: OperationId::from("op-alfa"),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn presence_wire_shape() {
        let payload = identity().presence("maira-link/0.1.0", fixed_time());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["id"], "u-1");
        assert_eq!(value["usuario"], "Capitán Ruiz");
        assert_eq!(value["elemento"], "cia-2");
        assert_eq!(value["operacion"], "op-alfa");
        assert_eq!(value["timestamp"], "2026-03-01T12:30:00.000Z");
        assert_eq!(value["conectado"], true);
        assert_eq!(value["navegador"], "maira-link/0.1.0");
        assert_eq!(value["tipo"], "cliente");
        assert_eq!(value.as_object().unwrap().len(), 8);
    }

    #[test]
    fn roster_request_wire_shape() {
        let value = serde_json::to_value(identity().roster_request()).unwrap();
        assert_eq!(value, serde_json::json!({"operacion": "op-alfa", "solicitante": "u-1"}));
    }

    #[test]
    fn heartbeat_wire_shape() {
        let value = serde_json::to_value(identity().heartbeat(fixed_time())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "u-1",
                "usuario": "Capitán Ruiz",
                "operacion": "op-alfa",
                "timestamp": "2026-03-01T12:30:00.000Z",
            })
        );
    }

    #[test]
    fn pong_wire_shape() {
        let value = serde_json::to_value(identity().pong(fixed_time())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "u-1",
                "timestamp": "2026-03-01T12:30:00.000Z",
                "operacion": "op-alfa",
            })
        );
    }

    #[test]
    fn category_event_names() {
        assert_eq!(MessageCategory::Chat.event_name(), "mensajeChat");
        assert_eq!(MessageCategory::Position.event_name(), "actualizarPosicionGB");
        assert_eq!(MessageCategory::Entity.event_name(), "nuevoElemento");
    }

    #[test]
    fn entity_shares_new_element_channel_with_presence() {
        assert!(events::PRESENCE_CHANNELS.contains(&MessageCategory::Entity.event_name()));
        let presence = serde_json::to_value(identity().presence("agent", Utc::now())).unwrap();
        assert_eq!(presence["tipo"], CLIENT_ROLE);
        assert_eq!(presence["conectado"], true);
    }

    #[test]
    fn category_serde_lowercase() {
        let json = serde_json::to_string(&MessageCategory::Position).unwrap();
        assert_eq!(json, "\"position\"");
        let back: MessageCategory = serde_json::from_str("\"entity\"").unwrap();
        assert_eq!(back, MessageCategory::Entity);
    }

    #[test]
    fn presence_channels_order() {
        assert_eq!(
            events::PRESENCE_CHANNELS,
            ["anunciarElemento", "nuevoElemento", "elementoConectado", "conectado"]
        );
        assert_eq!(events::ROSTER_CHANNELS[0], "solicitarElementos");
    }

    #[test]
    fn identity_serde_camel_case() {
        let value = serde_json::to_value(identity()).unwrap();
        assert_eq!(value["displayName"], "Capitán Ruiz");
        assert_eq!(value["workingElementId"], "cia-2");
        assert_eq!(value["operationId"], "op-alfa");
    }
}
