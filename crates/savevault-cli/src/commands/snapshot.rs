use clap::{Args, Subcommand};

use savevault_snapshot::{delete_snapshot, restore, verify};

use crate::app;

#[derive(Args)]
pub struct RestoreArgs {
    /// Snapshot id
    snapshot_id: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Snapshot id
    snapshot_id: String,
}

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// List a game's snapshots
    List {
        /// Game id
        game_id: String,
    },
    /// Delete a snapshot and its payload
    Delete {
        /// Snapshot id
        snapshot_id: String,
    },
}

pub fn run_restore(args: RestoreArgs, _json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;
    restore(&mut app.index, &app.inflight, &args.snapshot_id)?;
    println!("Snapshot {} restored.", args.snapshot_id);
    Ok(())
}

pub fn run_verify(args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let app = app::open_app()?;
    let report = verify(&app.index, &args.snapshot_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.ok {
        println!("Snapshot {} verified: all checksums match.", args.snapshot_id);
    } else {
        println!(
            "Snapshot {} has {} issue(s): missing or modified files.",
            args.snapshot_id, report.issues
        );
    }
    Ok(())
}

pub fn run(action: SnapshotAction, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;

    match action {
        SnapshotAction::List { game_id } => {
            app.index.game(&game_id)?;
            let snapshots = app.index.snapshots_for_game(&game_id);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
                return Ok(());
            }
            if snapshots.is_empty() {
                println!("No snapshots.");
                return Ok(());
            }
            println!(
                "{:<36} {:<20} {:<12} {:>12}",
                "ID", "CREATED", "REASON", "SIZE"
            );
            for snapshot in &snapshots {
                println!(
                    "{:<36} {:<20} {:<12} {:>12}",
                    snapshot.id,
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.reason.to_string(),
                    snapshot.size_bytes
                );
            }
            Ok(())
        }
        SnapshotAction::Delete { snapshot_id } => {
            delete_snapshot(&mut app.index, &snapshot_id, true)?;
            println!("Snapshot {snapshot_id} deleted.");
            Ok(())
        }
    }
}
