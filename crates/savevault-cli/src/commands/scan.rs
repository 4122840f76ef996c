use clap::Args;

use savevault_snapshot::scan_snapshots_from_disk;

use crate::app;

#[derive(Args)]
pub struct ScanArgs {}

pub fn run(_args: ScanArgs, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;
    let report = scan_snapshots_from_disk(&mut app.index)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Scan complete: {} snapshot(s) added, {} removed ({} file rows), {} unknown game folder(s), {} invalid manifest(s).",
            report.added,
            report.removed,
            report.removed_files,
            report.skipped_unknown_games,
            report.skipped_invalid
        );
    }
    Ok(())
}
