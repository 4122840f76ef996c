use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::str::FromStr;

use savevault_core::models::snapshot::SnapshotReason;
use savevault_snapshot::{backup, BackupOptions, BackupProgress};

use crate::app;

#[derive(Args)]
pub struct BackupArgs {
    /// Game id
    game_id: String,
    /// Why this snapshot is taken: auto or manual
    #[arg(long, default_value = "manual")]
    reason: String,
}

pub fn run(args: BackupArgs, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;
    let reason = SnapshotReason::from_str(&args.reason).map_err(|e| anyhow::anyhow!(e))?;

    let pb = if json {
        None
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let mut on_progress = |p: &BackupProgress| {
        if let Some(ref pb) = pb {
            if pb.length() != Some(p.total as u64) {
                pb.set_length(p.total as u64);
            }
            pb.set_position(p.processed as u64);
            pb.set_message(p.current_file.clone());
        }
    };

    let result = backup(
        &mut app.index,
        &app.inflight,
        &args.game_id,
        reason,
        &BackupOptions::default(),
        Some(&mut on_progress),
    )?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    match result {
        Some(snapshot) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!(
                    "Snapshot {} created: {} bytes at {}",
                    snapshot.id,
                    snapshot.size_bytes,
                    snapshot.storage_path.display()
                );
            }
        }
        None => {
            if json {
                println!("null");
            } else {
                println!("Backup skipped; see the game's event log for the reason.");
            }
        }
    }
    Ok(())
}
