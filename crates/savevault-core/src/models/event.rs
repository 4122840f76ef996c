use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Backup,
    Restore,
    Error,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Backup => write!(f, "backup"),
            EventType::Restore => write!(f, "restore"),
            EventType::Error => write!(f, "error"),
        }
    }
}

/// Append-only log entry; the index keeps a bounded ring of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    pub id: String,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
