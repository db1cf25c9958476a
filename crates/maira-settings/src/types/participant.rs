//! Local participant identity.

use maira_core::constants::default_client_agent;
use maira_core::{ElementId, OperationId, ParticipantId, ParticipantIdentity};
use serde::{Deserialize, Serialize};

/// Identity fields supplied at initialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantSettings {
    /// Participant ID. Empty means "generate one for this process".
    pub id: String,
    /// Name shown to other participants.
    pub display_name: String,
    /// Element the participant works as.
    pub working_element_id: String,
    /// Operation to join.
    pub operation_id: String,
    /// Client agent string sent with presence announcements.
    pub client_agent: String,
}

impl Default for ParticipantSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            display_name: "anonymous".to_string(),
            working_element_id: String::new(),
            operation_id: "default".to_string(),
            client_agent: default_client_agent(),
        }
    }
}

impl ParticipantSettings {
    /// Build the identity announced to the server.
    #[must_use]
    pub fn identity(&self) -> ParticipantIdentity {
        let id = if self.id.is_empty() {
            ParticipantId::generate()
        } else {
            ParticipantId::from(self.id.as_str())
        };
        ParticipantIdentity {
            id,
            display_name: self.display_name.clone(),
            working_element_id: ElementId::from(self.working_element_id.as_str()),
            operation_id: OperationId::from(self.operation_id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_generates_one() {
        let settings = ParticipantSettings::default();
        let identity = settings.identity();
        assert!(!identity.id.is_empty());
        assert_eq!(identity.operation_id.as_str(), "default");
    }

    #[test]
    fn explicit_id_kept() {
        let settings = ParticipantSettings {
            id: "u-9".into(),
            display_name: "Sgto. Díaz".into(),
            working_element_id: "sec-3".into(),
            operation_id: "op-bravo".into(),
            ..ParticipantSettings::default()
        };
        let identity = settings.identity();
        assert_eq!(identity.id.as_str(), "u-9");
        assert_eq!(identity.display_name, "Sgto. Díaz");
        assert_eq!(identity.working_element_id.as_str(), "sec-3");
        assert_eq!(identity.operation_id.as_str(), "op-bravo");
    }

    #[test]
    fn default_client_agent_set() {
        assert!(ParticipantSettings::default().client_agent.starts_with("maira-link/"));
    }
}
