use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use savevault_core::config::{write_json_atomic, AppPaths, Settings};
use savevault_core::models::event::{EventLog, EventType};
use savevault_core::models::game::{Game, GameDetail, GameStatus, GameSummary};
use savevault_core::models::location::{LocationKind, SaveLocation};
use savevault_core::models::snapshot::{Snapshot, SnapshotFile};
use savevault_core::models::new_id;
use savevault_core::VaultError;
use savevault_fs::{path_key, remove_dir_safe};

use crate::naming::derive_folder_name;
use crate::session::SessionProbe;

/// Oldest entries beyond this are dropped from the event ring.
const EVENT_RING_CAP: usize = 500;

/// Event-log window consulted for a game's issue count.
const ISSUE_WINDOW: usize = 20;

/// On-disk shape of `library.json`. Unknown fields are tolerated.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LibraryDoc {
    games: Vec<Game>,
    locations: Vec<SaveLocation>,
    snapshots: Vec<Snapshot>,
    snapshot_files: Vec<SnapshotFile>,
    events: Vec<EventLog>,
}

/// The authoritative in-memory library state, persisted as one JSON
/// document. Rows reference each other by id, never by pointer, so the
/// scanner can rebuild any subset from disk.
pub struct LibraryIndex {
    paths: AppPaths,
    settings: Settings,
    games: Vec<Game>,
    locations: Vec<SaveLocation>,
    snapshots: Vec<Snapshot>,
    snapshot_files: Vec<SnapshotFile>,
    events: Vec<EventLog>,
}

impl LibraryIndex {
    /// Open the index under a data root, creating the layout on first run.
    /// An unreachable data root puts the system in recovery mode.
    pub fn open(data_root: PathBuf) -> Result<Self, VaultError> {
        if std::fs::create_dir_all(&data_root).is_err() {
            return Err(VaultError::RecoveryMode);
        }

        let settings = Settings::load_from(&data_root.join("AppState").join("settings.json"))?;
        let paths = AppPaths::new(data_root, &settings);

        let library_path = paths.library_path();
        let doc = if library_path.exists() {
            let content = std::fs::read_to_string(&library_path)?;
            serde_json::from_str(&content)?
        } else {
            LibraryDoc::default()
        };

        Ok(Self {
            paths,
            settings,
            games: doc.games,
            locations: doc.locations,
            snapshots: doc.snapshots,
            snapshot_files: doc.snapshot_files,
            events: doc.events,
        })
    }

    /// Persist the whole index atomically (write-temp + rename).
    pub fn save(&self) -> Result<(), VaultError> {
        let doc = LibraryDoc {
            games: self.games.clone(),
            locations: self.locations.clone(),
            snapshots: self.snapshots.clone(),
            snapshot_files: self.snapshot_files.clone(),
            events: self.events.clone(),
        };
        write_json_atomic(&self.paths.library_path(), &doc)
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate and persist new settings. Storage migration is the
    /// caller's job; this only records the outcome.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), VaultError> {
        settings.validate()?;
        settings.save_to(&self.paths.settings_path())?;
        self.paths = AppPaths::new(self.paths.data_root.clone(), &settings);
        self.settings = settings;
        Ok(())
    }

    // ── Games ──

    pub fn game(&self, id: &str) -> Result<&Game, VaultError> {
        self.games
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| VaultError::GameNotFound { id: id.to_string() })
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn game_by_folder(&self, folder_name: &str) -> Option<&Game> {
        self.games
            .iter()
            .find(|g| g.folder_name.eq_ignore_ascii_case(folder_name))
    }

    pub fn add_game(
        &mut self,
        name: &str,
        exe_path: &Path,
        install_path: &Path,
    ) -> Result<Game, VaultError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::invalid_input("game name must not be empty"));
        }
        if exe_path.as_os_str().is_empty() || install_path.as_os_str().is_empty() {
            return Err(VaultError::invalid_input(
                "executable and install paths must not be empty",
            ));
        }

        let taken: Vec<String> = self.games.iter().map(|g| g.folder_name.clone()).collect();
        let folder_name = derive_folder_name(name, &taken);

        let game = Game {
            id: new_id(),
            name: name.to_string(),
            install_path: install_path.to_path_buf(),
            exe_path: exe_path.to_path_buf(),
            created_at: Utc::now(),
            last_seen_at: None,
            status: GameStatus::Warning,
            folder_name,
        };
        self.write_sidecar(&game)?;
        self.games.push(game.clone());
        self.save()?;
        tracing::info!("game added: {} ({})", game.name, game.id);
        Ok(game)
    }

    /// The sidecar is the only ground truth the scanner reads when the
    /// index is lost; keep it current on every game mutation.
    pub fn write_sidecar(&self, game: &Game) -> Result<(), VaultError> {
        let path = self.paths.game_dir(&game.folder_name).join("metadata.json");
        write_json_atomic(&path, game)
    }

    /// Remove a game, cascading to locations, snapshots, snapshot files
    /// and event logs, and delete its on-disk folder.
    pub fn remove_game(&mut self, id: &str) -> Result<(), VaultError> {
        let game = self.game(id)?.clone();
        let snapshot_ids: Vec<String> = self
            .snapshots
            .iter()
            .filter(|s| s.game_id == id)
            .map(|s| s.id.clone())
            .collect();

        self.games.retain(|g| g.id != id);
        self.locations.retain(|l| l.game_id != id);
        self.snapshots.retain(|s| s.game_id != id);
        self.snapshot_files
            .retain(|f| !snapshot_ids.contains(&f.snapshot_id));
        self.events.retain(|e| e.game_id.as_deref() != Some(id));

        remove_dir_safe(&self.paths.game_dir(&game.folder_name))?;
        self.save()?;
        tracing::info!("game removed: {} ({})", game.name, id);
        Ok(())
    }

    pub fn update_status(&mut self, id: &str, status: GameStatus) -> Result<(), VaultError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| VaultError::GameNotFound { id: id.to_string() })?;
        game.status = status;
        Ok(())
    }

    pub fn touch_last_seen(&mut self, id: &str) -> Result<(), VaultError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| VaultError::GameNotFound { id: id.to_string() })?;
        game.last_seen_at = Some(Utc::now());
        Ok(())
    }

    /// Insert a game row recovered from a sidecar verbatim (scanner path).
    pub fn insert_game_row(&mut self, game: Game) {
        self.games.push(game);
    }

    /// Re-point a game at the folder its payload actually lives under.
    pub fn set_game_folder(&mut self, id: &str, folder_name: &str) -> Result<(), VaultError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| VaultError::GameNotFound { id: id.to_string() })?;
        game.folder_name = folder_name.to_string();
        Ok(())
    }

    pub fn list_games(&self, probe: &dyn SessionProbe) -> Vec<GameSummary> {
        self.games
            .iter()
            .map(|game| {
                let snapshots = self.snapshots_for_game(&game.id);
                let issue_count = self
                    .recent_events(Some(&game.id), ISSUE_WINDOW)
                    .iter()
                    .filter(|e| e.kind == EventType::Error)
                    .count();
                GameSummary {
                    id: game.id.clone(),
                    name: game.name.clone(),
                    status: game.status,
                    last_backup_at: snapshots.first().map(|s| s.created_at),
                    snapshot_count: snapshots.len(),
                    issue_count,
                    running: probe.is_running(game),
                }
            })
            .collect()
    }

    pub fn get_game_detail(&mut self, id: &str) -> Result<GameDetail, VaultError> {
        let game = self.game(id)?.clone();
        let exe_exists = game.exe_path.exists();
        if !exe_exists {
            self.log_event(
                Some(id),
                EventType::Error,
                "Game executable is missing.".to_string(),
            );
        }
        Ok(GameDetail {
            locations: self.locations_for_game(id),
            snapshots: self.snapshots_for_game(id),
            recent_events: self.recent_events(Some(id), ISSUE_WINDOW),
            exe_exists,
            game,
        })
    }

    // ── Save locations ──

    pub fn location(&self, id: &str) -> Result<&SaveLocation, VaultError> {
        self.locations
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| VaultError::LocationNotFound { id: id.to_string() })
    }

    /// Locations for a game, with the derived `exists` flag refreshed.
    pub fn locations_for_game(&self, game_id: &str) -> Vec<SaveLocation> {
        self.locations
            .iter()
            .filter(|l| l.game_id == game_id)
            .cloned()
            .map(|mut l| {
                l.refresh_exists();
                l
            })
            .collect()
    }

    pub fn enabled_locations(&self, game_id: &str) -> Vec<SaveLocation> {
        self.locations_for_game(game_id)
            .into_iter()
            .filter(|l| l.enabled)
            .collect()
    }

    pub fn add_location(
        &mut self,
        game_id: &str,
        path: &Path,
        kind: LocationKind,
        auto_detected: bool,
    ) -> Result<SaveLocation, VaultError> {
        self.game(game_id)?;
        if path.as_os_str().is_empty() {
            return Err(VaultError::invalid_input("location path must not be empty"));
        }
        let mut location = SaveLocation {
            id: new_id(),
            game_id: game_id.to_string(),
            path: path.to_path_buf(),
            kind,
            auto_detected,
            enabled: true,
            exists: false,
        };
        location.refresh_exists();
        self.locations.push(location.clone());
        self.save()?;
        Ok(location)
    }

    pub fn toggle_location(&mut self, id: &str) -> Result<bool, VaultError> {
        let location = self
            .locations
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| VaultError::LocationNotFound { id: id.to_string() })?;
        location.enabled = !location.enabled;
        let enabled = location.enabled;
        self.save()?;
        Ok(enabled)
    }

    /// Detach a location. Historical snapshot rows keep referencing its id
    /// logically; verify/restore silently skip them.
    pub fn remove_location(&mut self, id: &str) -> Result<(), VaultError> {
        self.location(id)?;
        self.locations.retain(|l| l.id != id);
        self.save()?;
        Ok(())
    }

    /// Insert a recovered or seed location row verbatim (scanner path).
    pub fn insert_location_row(&mut self, location: SaveLocation) {
        self.locations.push(location);
    }

    // ── Snapshots ──

    pub fn snapshot(&self, id: &str) -> Result<&Snapshot, VaultError> {
        self.snapshots
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| VaultError::SnapshotNotFound { id: id.to_string() })
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn snapshots_for_game(&self, game_id: &str) -> Vec<Snapshot> {
        let mut snapshots: Vec<Snapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.game_id == game_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    pub fn files_for_snapshot(&self, snapshot_id: &str) -> Vec<SnapshotFile> {
        self.snapshot_files
            .iter()
            .filter(|f| f.snapshot_id == snapshot_id)
            .cloned()
            .collect()
    }

    pub fn snapshot_id_taken(&self, id: &str) -> bool {
        self.snapshots.iter().any(|s| s.id == id)
    }

    pub fn has_snapshot_at(&self, storage_path: &Path) -> bool {
        let key = path_key(storage_path);
        self.snapshots.iter().any(|s| path_key(&s.storage_path) == key)
    }

    pub fn insert_snapshot(&mut self, snapshot: Snapshot, files: Vec<SnapshotFile>) {
        self.snapshots.push(snapshot);
        self.snapshot_files.extend(files);
    }

    /// Remove a snapshot's rows (file rows cascade). Disk cleanup is the
    /// caller's responsibility and must happen first.
    pub fn remove_snapshot_rows(&mut self, id: &str) {
        self.snapshots.retain(|s| s.id != id);
        self.snapshot_files.retain(|f| f.snapshot_id != id);
    }

    // ── Event log ──

    pub fn log_event(&mut self, game_id: Option<&str>, kind: EventType, message: String) {
        self.events.push(EventLog {
            id: new_id(),
            game_id: game_id.map(str::to_string),
            kind,
            message,
            created_at: Utc::now(),
        });
        if self.events.len() > EVENT_RING_CAP {
            let excess = self.events.len() - EVENT_RING_CAP;
            self.events.drain(..excess);
        }
    }

    /// Most recent events first, optionally filtered to a game.
    pub fn recent_events(&self, game_id: Option<&str>, limit: usize) -> Vec<EventLog> {
        self.events
            .iter()
            .rev()
            .filter(|e| match game_id {
                Some(id) => e.game_id.as_deref() == Some(id),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect()
    }
}
