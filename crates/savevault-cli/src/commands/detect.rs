use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use savevault_catalog::{detect_save_paths, get_adapters, CatalogStore, DetectionRequest};
use savevault_catalog::detector::DetectionProgress;

use crate::app;

#[derive(Args)]
pub struct DetectArgs {
    /// Game id
    game_id: String,
    /// Path to the save-location catalog (JSON)
    #[arg(long)]
    catalog: PathBuf,
    /// Attach the detected candidates as auto-detected save locations
    #[arg(long)]
    apply: bool,
}

pub fn run(args: DetectArgs, json: bool) -> anyhow::Result<()> {
    let mut app = app::open_app()?;
    let game = app.index.game(&args.game_id)?.clone();

    let store = CatalogStore::new();
    let adapters = get_adapters();
    let request = DetectionRequest {
        catalog_path: &args.catalog,
        game_name: &game.name,
        exe_path: &game.exe_path,
        install_path: &game.install_path,
    };

    let pb = if json {
        None
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    };
    let mut on_progress = |p: &DetectionProgress| {
        if let Some(ref pb) = pb {
            pb.set_position(p.percent as u64);
            pb.set_message(p.message.clone());
        }
    };

    let result = detect_save_paths(&store, &adapters, &request, Some(&mut on_progress))?;
    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Status: {}", result.status);
        if let Some(title) = &result.matched_title {
            println!(
                "Matched catalog title: {title} (score {:.2}{})",
                result.match_score,
                if result.title_ambiguous {
                    ", ambiguous"
                } else {
                    ""
                }
            );
        }
        for warning in &result.warnings {
            println!("Warning: {warning}");
        }
        if result.candidates.is_empty() {
            println!("No candidate save locations found.");
        } else {
            println!("{:<6} {:<8} {:<60} REASONS", "SCORE", "KIND", "PATH");
            for candidate in &result.candidates {
                println!(
                    "{:<6.2} {:<8} {:<60} {}",
                    candidate.score,
                    candidate.kind.to_string(),
                    candidate.path.display(),
                    candidate.reasons.join(", ")
                );
            }
        }
    }

    if args.apply {
        let mut applied = 0usize;
        for candidate in &result.candidates {
            app.index
                .add_location(&game.id, &candidate.path, candidate.kind, true)?;
            applied += 1;
        }
        if !json {
            println!("Attached {applied} auto-detected location(s).");
        }
    }
    Ok(())
}
