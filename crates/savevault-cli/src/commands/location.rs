use clap::Subcommand;
use std::path::PathBuf;
use std::str::FromStr;

use savevault_core::models::location::LocationKind;

use crate::app;

#[derive(Subcommand)]
pub enum LocationAction {
    /// Attach a save location to a game
    Add {
        /// Game id
        game_id: String,
        /// Path of the save file or folder
        path: PathBuf,
        /// Location kind: file or folder
        #[arg(long, default_value = "folder")]
        kind: String,
    },
    /// Enable or disable a location
    Toggle {
        /// Location id
        id: String,
    },
    /// Detach a location (historical snapshots keep their rows)
    Remove {
        /// Location id
        id: String,
    },
}

pub fn run(action: LocationAction, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;

    match action {
        LocationAction::Add {
            game_id,
            path,
            kind,
        } => {
            let kind = LocationKind::from_str(&kind).map_err(|e| anyhow::anyhow!(e))?;
            let location = app.index.add_location(&game_id, &path, kind, false)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&location)?);
            } else {
                println!(
                    "Added {} location {} at {}{}",
                    location.kind,
                    location.id,
                    location.path.display(),
                    if location.exists { "" } else { " (does not exist yet)" }
                );
            }
            Ok(())
        }
        LocationAction::Toggle { id } => {
            let enabled = app.index.toggle_location(&id)?;
            println!(
                "Location {} is now {}.",
                id,
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        LocationAction::Remove { id } => {
            app.index.remove_location(&id)?;
            println!("Location {id} removed.");
            Ok(())
        }
    }
}
