pub mod builder;
pub mod inflight;
pub mod manifest;
pub mod recover;
pub mod restore;
pub mod retention;

#[cfg(test)]
mod testutil;

pub use builder::{backup, BackupOptions, BackupProgress};
pub use inflight::InflightBackups;
pub use recover::{scan_snapshots_from_disk, ScanReport};
pub use restore::{delete_snapshot, restore, verify, VerifyReport};
