use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::room::RoomId;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_ACCURACY_SCORE: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Active,
    #[default]
    Inactive,
}

/// A configured agent as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: AgentId,
    pub name: String,
    pub role: String,
    pub avatar: String,
    /// `<backend-prefix>:<model-id>` or a bare hosted model identifier
    pub model_route: String,
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub relay_enabled: bool,
    pub relay_token: Option<String>,
    pub learning_enabled: bool,
    pub web_search_enabled: bool,
    pub file_access_enabled: bool,
    pub cabinet_access_enabled: bool,
    pub state: AgentState,
    pub conversation_count: u64,
    pub accuracy_score: u8,
}

impl AgentConfig {
    pub fn is_active(&self) -> bool {
        self.state == AgentState::Active
    }

    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// The relay token, only when the integration is switched on and a
    /// non-blank token is present.
    pub fn relay_token(&self) -> Option<&str> {
        if !self.relay_enabled {
            return None;
        }
        self.relay_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Whether a running poller spawned from `self` would behave differently
    /// if spawned from `other`.
    pub fn relay_settings_differ(&self, other: &AgentConfig) -> bool {
        self.relay_token() != other.relay_token()
            || self.model_route != other.model_route
            || self.system_prompt != other.system_prompt
            || self.temperature != other.temperature
            || self.max_tokens != other.max_tokens
    }
}

/// User supplied fields for creating or editing an agent.
///
/// Identity, lifecycle state and counters are owned by the store and never
/// taken from a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDraft {
    pub name: String,
    pub role: String,
    pub avatar: String,
    pub model_route: String,
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub relay_enabled: bool,
    pub relay_token: Option<String>,
    pub learning_enabled: Option<bool>,
    pub web_search_enabled: bool,
    pub file_access_enabled: bool,
    pub cabinet_access_enabled: bool,
}

impl AgentDraft {
    /// Checks the fields the core relies on. Numeric ranges are a form
    /// concern and are deliberately passed through untouched.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("agent name is required".to_string());
        }
        if self.model_route.trim().is_empty() {
            return Err("model route is required".to_string());
        }
        Ok(())
    }

    /// The relay token this draft would enable, if any.
    pub fn relay_token(&self) -> Option<&str> {
        if !self.relay_enabled {
            return None;
        }
        self.relay_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn into_config(self, id: AgentId) -> AgentConfig {
        AgentConfig {
            id,
            name: self.name,
            role: self.role,
            avatar: self.avatar,
            model_route: self.model_route.trim().to_string(),
            system_prompt: self.system_prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            relay_enabled: self.relay_enabled,
            relay_token: self.relay_token,
            learning_enabled: self.learning_enabled.unwrap_or(true),
            web_search_enabled: self.web_search_enabled,
            file_access_enabled: self.file_access_enabled,
            cabinet_access_enabled: self.cabinet_access_enabled,
            state: AgentState::Inactive,
            conversation_count: 0,
            accuracy_score: DEFAULT_ACCURACY_SCORE,
        }
    }

    /// Produce the edited version of `existing`, keeping its identity,
    /// state and counters.
    pub fn apply_to(self, existing: &AgentConfig) -> AgentConfig {
        let learning_enabled = self.learning_enabled.unwrap_or(existing.learning_enabled);
        AgentConfig {
            state: existing.state,
            conversation_count: existing.conversation_count,
            accuracy_score: existing.accuracy_score,
            learning_enabled,
            ..self.into_config(existing.id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Relay,
    Room,
}

/// One exchange between a user and an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub agent_id: AgentId,
    pub room_id: Option<RoomId>,
    pub user: String,
    pub user_message: String,
    pub agent_reply: String,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(
        agent_id: AgentId,
        channel: Channel,
        user: impl Into<String>,
        user_message: impl Into<String>,
        agent_reply: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            room_id: None,
            user: user.into(),
            user_message: user_message.into(),
            agent_reply: agent_reply.into(),
            channel,
            timestamp: Utc::now(),
        }
    }

    pub fn in_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> AgentDraft {
        AgentDraft {
            name: "Analyst".to_string(),
            model_route: "ollama:mistral".to_string(),
            system_prompt: "You analyse things.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_agent_defaults() {
        let agent = draft().into_config(AgentId(7));
        assert_eq!(agent.state, AgentState::Inactive);
        assert_eq!(agent.conversation_count, 0);
        assert_eq!(agent.accuracy_score, DEFAULT_ACCURACY_SCORE);
        assert!(agent.learning_enabled);
        assert_eq!(agent.temperature_or_default(), DEFAULT_TEMPERATURE);
        assert_eq!(agent.max_tokens_or_default(), DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_out_of_range_values_are_not_clamped() {
        let mut d = draft();
        d.temperature = Some(5.0);
        d.max_tokens = Some(90_000);
        let agent = d.into_config(AgentId(1));
        assert_eq!(agent.temperature_or_default(), 5.0);
        assert_eq!(agent.max_tokens_or_default(), 90_000);
    }

    #[test]
    fn test_apply_keeps_identity_and_counters() {
        let mut existing = draft().into_config(AgentId(3));
        existing.state = AgentState::Active;
        existing.conversation_count = 12;

        let mut edit = draft();
        edit.name = "Renamed".to_string();
        let updated = edit.apply_to(&existing);

        assert_eq!(updated.id, AgentId(3));
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.state, AgentState::Active);
        assert_eq!(updated.conversation_count, 12);
    }

    #[test]
    fn test_relay_token_requires_flag_and_content() {
        let mut d = draft();
        d.relay_token = Some("  ".to_string());
        d.relay_enabled = true;
        assert_eq!(d.relay_token(), None);

        d.relay_token = Some("123:abc".to_string());
        assert_eq!(d.relay_token(), Some("123:abc"));

        d.relay_enabled = false;
        assert_eq!(d.clone().into_config(AgentId(1)).relay_token(), None);
    }

    #[test]
    fn test_validate() {
        assert!(draft().validate().is_ok());
        let mut d = draft();
        d.model_route = " ".to_string();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let agent = draft().into_config(AgentId(9));
        let value = serde_json::to_value(&agent).unwrap();
        assert_eq!(value["id"], json!(9));
        assert_eq!(value["modelRoute"], json!("ollama:mistral"));
        assert_eq!(value["state"], json!("inactive"));
        assert_eq!(value["conversationCount"], json!(0));
    }
}
