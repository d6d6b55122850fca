use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Executive,
    Creative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub id: u64,
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_route: Option<String>,
    /// False when `text` is a generation failure rendered for display
    #[serde(default = "default_true")]
    pub ok: bool,
}

fn default_true() -> bool {
    true
}

impl RoomMessage {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: MessageKind::User,
            agent_id: None,
            text: text.into(),
            timestamp: Utc::now(),
            model_route: None,
            ok: true,
        }
    }

    pub fn agent(id: u64, agent_id: AgentId, model_route: &str, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: MessageKind::Agent,
            agent_id: Some(agent_id),
            text: text.into(),
            timestamp: Utc::now(),
            model_route: Some(model_route.to_string()),
            ok: true,
        }
    }

    pub fn failed(mut self) -> Self {
        self.ok = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomKind,
    /// Members in the order they were called into the room
    pub active_agent_ids: Vec<AgentId>,
    pub messages: Vec<RoomMessage>,
    pub created_at: DateTime<Utc>,
}

impl RoomState {
    pub fn has_agent(&self, agent_id: AgentId) -> bool {
        self.active_agent_ids.contains(&agent_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomDraft {
    pub name: String,
    pub kind: RoomKind,
    pub agent_ids: Vec<AgentId>,
}

/// The downloadable snapshot of a room.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomExport {
    pub room: String,
    pub kind: RoomKind,
    pub members: Vec<AgentId>,
    pub messages: Vec<RoomMessage>,
    pub exported_at: DateTime<Utc>,
    #[serde(skip)]
    pub file_name: String,
}

impl RoomExport {
    pub fn from_room(room: &RoomState, exported_at: DateTime<Utc>) -> Self {
        let safe_name: String = room
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        Self {
            room: room.name.clone(),
            kind: room.kind,
            members: room.active_agent_ids.clone(),
            messages: room.messages.clone(),
            exported_at,
            file_name: format!("room_{}_{}.json", safe_name, exported_at.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_export_file_name() {
        let room = RoomState {
            id: RoomId(1),
            name: "Board room/2".to_string(),
            kind: RoomKind::Executive,
            active_agent_ids: vec![AgentId(4)],
            messages: vec![RoomMessage::user(1, "hello")],
            created_at: Utc::now(),
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let export = RoomExport::from_room(&room, at);
        assert_eq!(export.file_name, "room_Board_room_2_2024-03-09.json");
        assert_eq!(export.messages.len(), 1);

        let value = serde_json::to_value(&export).unwrap();
        assert!(value.get("fileName").is_none());
        assert_eq!(value["room"], "Board room/2");
    }
}
