//! Drives a live framing session against a simulated skier.
//!
//! ```text
//! skicam-session-demo [--seconds 12] [--seed 42]
//! ```
//!
//! The run zooms in manually between 3 s and 4 s, resumes auto framing at
//! 6 s, and prints the session report and Prometheus exposition at the end.

use clap::Parser;
use std::time::Duration;
use tracing::info;

use skicam_framing::actuator::SimulatedActuator;
use skicam_framing::config::FramingConfig;
use skicam_framing::detection::CameraFrame;
use skicam_framing::pipeline::ControlCommand;
use skicam_framing::session::FramingSession;
use skicam_worker::simulation::{SimulatedDetector, SkierScene};
use skicam_worker::telemetry;

/// Scripted button presses: (time in seconds, command)
const SCRIPT: &[(f64, ControlCommand)] = &[
    (3.0, ControlCommand::ZoomIn),
    (4.0, ControlCommand::StopZoom),
    (6.0, ControlCommand::ResumeAuto),
];

#[derive(Parser, Debug)]
#[command(name = "skicam-session-demo")]
#[command(about = "Run a live framing session against a simulated skier")]
#[command(version)]
struct Args {
    /// Length of the run in seconds
    #[arg(long, default_value = "12")]
    seconds: f64,

    /// Seed for detector noise
    #[arg(long, default_value = "42")]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Args { seconds, seed } = Args::parse();
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;
    let prometheus = telemetry::init_metrics()?;

    let config = FramingConfig::from_env();
    config.validate()?;
    let fps = config.pipeline.nominal_fps;
    let target = config.controller.target_height_ratio;

    let detector = SimulatedDetector::new(SkierScene::default(), seed);
    let handle = FramingSession::start(config, detector, SimulatedActuator::new(20.0))?;
    info!(session_id = handle.session_id(), seconds, "Demo session started");

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps));
    let total_frames = (seconds * fps) as u64;
    let mut script = SCRIPT.iter().peekable();

    for sequence in 0..total_frames {
        ticker.tick().await;
        let t = sequence as f64 / fps;

        while let Some((_, command)) = script.next_if(|(at, _)| *at <= t) {
            info!(?command, t, "Scripted command");
            handle.send_command(*command).await?;
        }

        handle.submit_frame(CameraFrame::metadata_only(sequence, t))?;

        if sequence % fps.max(1.0) as u64 == 0 {
            println!("{}", handle.latest_snapshot().debug_line(target));
        }
    }

    let report = handle.shutdown().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", prometheus.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["skicam-session-demo"]).unwrap();
        assert_eq!(args.seconds, 12.0);
        assert_eq!(args.seed, 42);
    }

    #[test]
    fn test_rejects_bad_seconds() {
        assert!(Args::try_parse_from(["skicam-session-demo", "--seconds", "soon"]).is_err());
    }
}
