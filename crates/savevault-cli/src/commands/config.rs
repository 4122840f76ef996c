use clap::Subcommand;
use std::path::PathBuf;

use savevault_core::config;
use savevault_fs::migrate_storage_root;

use crate::app;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the active settings and resolved paths
    Show,
    /// Change backup frequency and retention
    Set {
        /// Minutes between automatic backups (min 1)
        #[arg(long)]
        frequency: Option<u32>,
        /// Snapshots to keep per game (min 1)
        #[arg(long)]
        retention: Option<u32>,
    },
    /// Move the storage root, migrating existing backups
    SetStorageRoot {
        /// New storage root directory
        path: PathBuf,
    },
    /// Point the application at a different data root
    SetDataRoot {
        /// New data root directory
        path: PathBuf,
    },
}

pub fn run(action: ConfigAction, json: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let app = app::open_app()?;
            if json {
                println!("{}", serde_json::to_string_pretty(app.index.settings())?);
            } else {
                let settings = app.index.settings();
                let paths = app.index.paths();
                println!("backup frequency: every {} min", settings.backup_frequency_minutes);
                println!("retention:        {} snapshot(s) per game", settings.retention_count);
                println!("data root:        {}", paths.data_root.display());
                println!("storage root:     {}", paths.storage_root.display());
                println!(
                    "compression:      {} (reserved)",
                    if settings.compression_enabled { "on" } else { "off" }
                );
            }
            Ok(())
        }
        ConfigAction::Set {
            frequency,
            retention,
        } => {
            let mut app = app::open_app()?;
            let mut settings = app.index.settings().clone();
            if let Some(frequency) = frequency {
                settings.backup_frequency_minutes = frequency;
            }
            if let Some(retention) = retention {
                settings.retention_count = retention;
            }
            app.index.update_settings(settings)?;
            println!("Settings updated.");
            Ok(())
        }
        ConfigAction::SetStorageRoot { path } => {
            let mut app = app::open_app()?;
            let old = app.index.paths().storage_root.clone();
            migrate_storage_root(&old, &path)?;

            let mut settings = app.index.settings().clone();
            settings.storage_root = Some(path.clone());
            app.index.update_settings(settings)?;
            println!("Storage root moved to {}.", path.display());
            Ok(())
        }
        ConfigAction::SetDataRoot { path } => {
            // Deliberately does not open the index: this is the one path
            // that must keep working while in recovery mode.
            std::fs::create_dir_all(&path)?;
            config::write_bootstrap(&path)?;
            println!("Data root set to {}.", path.display());
            Ok(())
        }
    }
}
