pub mod backup;
pub mod config;
pub mod detect;
pub mod game;
pub mod location;
pub mod scan;
pub mod snapshot;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Manage registered games
    Game {
        #[command(subcommand)]
        action: game::GameAction,
    },
    /// Manage save locations
    Location {
        #[command(subcommand)]
        action: location::LocationAction,
    },
    /// Create a snapshot of a game's save locations
    Backup(backup::BackupArgs),
    /// Restore a snapshot to its origin locations
    Restore(snapshot::RestoreArgs),
    /// Verify a snapshot against its recorded checksums
    Verify(snapshot::VerifyArgs),
    /// Manage snapshots
    Snapshot {
        #[command(subcommand)]
        action: snapshot::SnapshotAction,
    },
    /// Rebuild index rows from the on-disk storage root
    Scan(scan::ScanArgs),
    /// Detect save locations for a game from a catalog
    Detect(detect::DetectArgs),
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
}

pub fn run(cmd: Command, json: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Game { action } => game::run(action, json),
        Command::Location { action } => location::run(action, json),
        Command::Backup(args) => backup::run(args, json),
        Command::Restore(args) => snapshot::run_restore(args, json),
        Command::Verify(args) => snapshot::run_verify(args, json),
        Command::Snapshot { action } => snapshot::run(action, json),
        Command::Scan(args) => scan::run(args, json),
        Command::Detect(args) => detect::run(args, json),
        Command::Config { action } => config::run(action, json),
    }
}
