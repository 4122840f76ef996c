use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Protection status of a registered game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Protected,
    Warning,
    Error,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Protected => write!(f, "protected"),
            GameStatus::Warning => write!(f, "warning"),
            GameStatus::Error => write!(f, "error"),
        }
    }
}

/// A game registered for save protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub install_path: PathBuf,
    pub exe_path: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub status: GameStatus,
    /// Filesystem-safe derivation of `name`, unique within the storage root.
    pub folder_name: String,
}

/// Row returned by `list_games`, enriched with derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub id: String,
    pub name: String,
    pub status: GameStatus,
    pub last_backup_at: Option<DateTime<Utc>>,
    pub snapshot_count: usize,
    /// Error events among this game's last 20 log entries.
    pub issue_count: usize,
    pub running: bool,
}

/// Full per-game view returned by `get_game_detail`.
#[derive(Debug, Clone, Serialize)]
pub struct GameDetail {
    pub game: Game,
    pub locations: Vec<super::location::SaveLocation>,
    pub snapshots: Vec<super::snapshot::Snapshot>,
    pub recent_events: Vec<super::event::EventLog>,
    pub exe_exists: bool,
}
