//! Offline replay of a recorded detection log.
//!
//! ```text
//! skicam-replay <log.json> [--config framing.json] [--plan plan.json] [--quiet]
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use skicam_framing::config::FramingConfig;
use skicam_framing::detection::load_replay_log;
use skicam_framing::replay::ReplayRunner;
use skicam_worker::telemetry;

#[derive(Parser, Debug)]
#[command(name = "skicam-replay")]
#[command(about = "Replay a recorded detection log through the framing pipeline")]
#[command(version)]
struct Args {
    /// Recorded detection log (JSON)
    log: PathBuf,

    /// Framing config (JSON); SKICAM_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the crop plan to this path
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Only print the summary line
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;

    let config = match &args.config {
        Some(path) => FramingConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?
            .with_env_overrides(),
        None => FramingConfig::from_env(),
    };
    config.validate()?;
    let target = config.controller.target_height_ratio;

    let log = load_replay_log(&args.log)
        .with_context(|| format!("loading log {}", args.log.display()))?;
    info!(
        frames = log.frames.len(),
        fps = log.fps,
        "Replaying {}",
        args.log.display()
    );

    let outcome = ReplayRunner::new(config).run(log)?;

    if !args.quiet {
        for snapshot in &outcome.snapshots {
            println!("{}", snapshot.debug_line(target));
        }
    }

    if let Some(path) = &args.plan {
        outcome
            .plan
            .write_json(path)
            .with_context(|| format!("writing plan {}", path.display()))?;
        info!("Crop plan written to {}", path.display());
    }

    let with_subject = outcome
        .snapshots
        .iter()
        .filter(|s| s.subject.is_some())
        .count();
    println!(
        "Replayed {} frames, subject framed in {}, {} tracks created",
        outcome.snapshots.len(),
        with_subject,
        outcome.tracker.total_tracks_created
    );
    Ok(())
}
