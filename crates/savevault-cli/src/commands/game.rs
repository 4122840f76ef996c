use clap::Subcommand;
use std::path::PathBuf;

use savevault_index::NoopSessionProbe;

use crate::app;

#[derive(Subcommand)]
pub enum GameAction {
    /// Register a game for save protection
    Add {
        /// Display name of the game
        name: String,
        /// Path to the game executable
        #[arg(long)]
        exe: PathBuf,
        /// Path to the install directory
        #[arg(long)]
        install: PathBuf,
    },
    /// Remove a game and its on-disk backups
    Remove {
        /// Game id
        id: String,
    },
    /// List registered games
    List,
    /// Show one game in detail
    Show {
        /// Game id
        id: String,
    },
}

pub fn run(action: GameAction, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;

    match action {
        GameAction::Add { name, exe, install } => {
            let game = app.index.add_game(&name, &exe, &install)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&game)?);
            } else {
                println!("Added {} ({})", game.name, game.id);
                println!("Backups will be stored under '{}'.", game.folder_name);
            }
            Ok(())
        }
        GameAction::Remove { id } => {
            let game = app.index.game(&id)?.clone();
            app.index.remove_game(&id)?;
            println!("Removed {} and its backups.", game.name);
            Ok(())
        }
        GameAction::List => {
            let summaries = app.index.list_games(&NoopSessionProbe);
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                return Ok(());
            }
            if summaries.is_empty() {
                println!("No games registered.");
                return Ok(());
            }
            println!(
                "{:<36} {:<28} {:<10} {:>9} {:>7} {:<20}",
                "ID", "NAME", "STATUS", "SNAPSHOTS", "ISSUES", "LAST BACKUP"
            );
            for summary in &summaries {
                println!(
                    "{:<36} {:<28} {:<10} {:>9} {:>7} {:<20}",
                    summary.id,
                    summary.name,
                    summary.status.to_string(),
                    summary.snapshot_count,
                    summary.issue_count,
                    summary
                        .last_backup_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
            }
            Ok(())
        }
        GameAction::Show { id } => {
            let detail = app.index.get_game_detail(&id)?;
            app.index.save()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }
            println!("{} ({})", detail.game.name, detail.game.id);
            println!("  status:   {}", detail.game.status);
            println!("  exe:      {}{}", detail.game.exe_path.display(),
                if detail.exe_exists { "" } else { "  [missing]" });
            println!("  install:  {}", detail.game.install_path.display());
            println!("  locations:");
            for location in &detail.locations {
                println!(
                    "    {} [{}{}{}] {}",
                    location.id,
                    location.kind,
                    if location.enabled { "" } else { ", disabled" },
                    if location.exists { "" } else { ", missing" },
                    location.path.display()
                );
            }
            println!("  snapshots:");
            for snapshot in &detail.snapshots {
                println!(
                    "    {} {} {} ({} bytes)",
                    snapshot.id,
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.reason,
                    snapshot.size_bytes
                );
            }
            Ok(())
        }
    }
}
