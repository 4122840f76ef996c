use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a save location points at a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    File,
    Folder,
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationKind::File => write!(f, "file"),
            LocationKind::Folder => write!(f, "folder"),
        }
    }
}

impl std::str::FromStr for LocationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(LocationKind::File),
            "folder" => Ok(LocationKind::Folder),
            _ => Err(format!("unknown location kind: {s}")),
        }
    }
}

/// A save location attached to a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveLocation {
    pub id: String,
    pub game_id: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub auto_detected: bool,
    pub enabled: bool,
    /// Derived at read time, never persisted.
    #[serde(skip)]
    pub exists: bool,
}

impl SaveLocation {
    pub fn refresh_exists(&mut self) {
        self.exists = self.path.exists();
    }
}
