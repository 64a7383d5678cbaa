//! Async framing session.
//!
//! A session runs two tasks:
//!
//! - the **analysis task** owns the [`FramingPipeline`]. It takes the latest
//!   admitted camera frame, runs the detector under a deadline, and processes
//!   control commands in order with frames;
//! - the **actuator task** owns the zoom device. It executes the latest
//!   [`ActuatorCommand`](crate::actuator::ActuatorCommand), advances ramps
//!   on a fixed tick, acknowledges each command it ran, and publishes the
//!   zoom readout.
//!
//! Frame admission is keep-latest: a frame submitted while analysis is busy
//! replaces any frame still waiting, and replaced frames are counted as
//! dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

use skicam_models::{FrameSnapshot, RawDetection, ZoomMode};

use crate::actuator::{execute_command, ActuatorState, IssuedCommand, RemoteActuator, ZoomActuator};
use crate::config::FramingConfig;
use crate::detection::{CameraFrame, SubjectDetector};
use crate::error::{FramingError, FramingResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::pipeline::{ControlCommand, FramingPipeline};
use crate::tracking::TrackerStats;

/// Capacity of the control command queue.
const CONTROL_QUEUE_CAPACITY: usize = 32;

/// Actuator ticks to wait for a command acknowledgement before resyncing anyway.
const ACK_TIMEOUT_TICKS: u32 = 4;

/// Analysed frames between progress log lines.
const PROGRESS_INTERVAL_FRAMES: u64 = 300;

/// Summary returned when a session shuts down.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Frames handed to `submit_frame`
    pub frames_submitted: u64,
    /// Frames that passed the analysis stride
    pub frames_admitted: u64,
    pub frames_analysed: u64,
    /// Admitted frames replaced before analysis picked them up
    pub frames_dropped: u64,
    pub detector_timeouts: u64,
    pub detector_errors: u64,
    pub actuation_failures: u64,
    pub tracker: TrackerStats,
    pub final_zoom_factor: f64,
    pub final_mode: ZoomMode,
}

#[derive(Debug, Default)]
struct SessionCounters {
    frames_submitted: AtomicU64,
    frames_admitted: AtomicU64,
    frames_analysed: AtomicU64,
    frames_dropped: AtomicU64,
    detector_timeouts: AtomicU64,
    detector_errors: AtomicU64,
}

impl SessionCounters {
    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct AdmittedFrame {
    /// 1-based admission number
    admission: u64,
    frame: CameraFrame,
}

/// What the analysis task hands back on exit.
struct AnalysisOutcome {
    tracker: TrackerStats,
    mode: ZoomMode,
    actuation_failures: u64,
}

/// Entry point for live framing sessions.
pub struct FramingSession;

impl FramingSession {
    /// Start a session on the current tokio runtime.
    ///
    /// The detector and actuator are moved into the session's tasks.
    pub fn start<D, A>(
        config: FramingConfig,
        detector: D,
        actuator: A,
    ) -> FramingResult<SessionHandle>
    where
        D: SubjectDetector + 'static,
        A: ZoomActuator + 'static,
    {
        let logger = SessionLogger::new("live_framing");
        let (shutdown_tx, _) = watch::channel(false);

        let state = Arc::new(ActuatorState::new(
            actuator.current_zoom_factor(),
            actuator.max_zoom_factor(),
        ));
        let (command_tx, command_rx) = watch::channel(None);
        let remote = RemoteActuator::new(command_tx, Arc::clone(&state));

        let stride = u64::from(config.pipeline.analysis_stride.max(1));
        let detector_timeout = config.pipeline.detector_timeout();
        let tick = config.pipeline.actuator_tick();
        let pipeline = FramingPipeline::new(config, remote)?;

        let (frame_tx, frame_rx) = watch::channel(None);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(FrameSnapshot::idle());
        let counters = Arc::new(SessionCounters::default());

        let actuator_task = tokio::spawn(
            run_actuator(
                actuator,
                command_rx,
                Arc::clone(&state),
                tick,
                shutdown_tx.subscribe(),
            )
            .instrument(logger.create_span()),
        );

        let analysis = AnalysisTask {
            pipeline,
            detector,
            detector_timeout,
            ack_timeout: tick * ACK_TIMEOUT_TICKS,
            frames: frame_rx,
            control: control_rx,
            snapshots: snapshot_tx,
            shutdown: shutdown_tx.subscribe(),
            counters: Arc::clone(&counters),
            logger: logger.clone(),
            last_admission: 0,
        };
        let analysis_task = tokio::spawn(analysis.run().instrument(logger.create_span()));

        logger.log_start(&format!(
            "stride {}, detector timeout {:?}",
            stride, detector_timeout
        ));

        Ok(SessionHandle {
            logger,
            started_at: Utc::now(),
            stride,
            frames: frame_tx,
            control: control_tx,
            snapshots: snapshot_rx,
            shutdown: shutdown_tx,
            counters,
            state,
            analysis_task,
            actuator_task,
        })
    }
}

/// Client handle for a running session.
pub struct SessionHandle {
    logger: SessionLogger,
    started_at: DateTime<Utc>,
    stride: u64,
    frames: watch::Sender<Option<AdmittedFrame>>,
    control: mpsc::Sender<ControlCommand>,
    snapshots: watch::Receiver<FrameSnapshot>,
    shutdown: watch::Sender<bool>,
    counters: Arc<SessionCounters>,
    state: Arc<ActuatorState>,
    analysis_task: JoinHandle<AnalysisOutcome>,
    actuator_task: JoinHandle<f64>,
}

impl SessionHandle {
    /// Offer a camera frame. Returns whether it was admitted for analysis.
    ///
    /// Never blocks: an admitted frame replaces any frame still waiting.
    pub fn submit_frame(&self, frame: CameraFrame) -> FramingResult<bool> {
        let submitted = self.counters.frames_submitted.fetch_add(1, Ordering::Relaxed);
        if submitted % self.stride != 0 {
            return Ok(false);
        }

        let admission = self.counters.frames_admitted.fetch_add(1, Ordering::Relaxed) + 1;
        self.frames
            .send(Some(AdmittedFrame { admission, frame }))
            .map_err(|_| FramingError::SessionClosed)?;
        Ok(true)
    }

    /// Queue a control command behind any frames already being analysed.
    pub async fn send_command(&self, command: ControlCommand) -> FramingResult<()> {
        self.control
            .send(command)
            .await
            .map_err(|_| FramingError::SessionClosed)
    }

    /// Subscribe to per-frame snapshots.
    pub fn snapshots(&self) -> watch::Receiver<FrameSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest_snapshot(&self) -> FrameSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Latest zoom factor read back from the device.
    pub fn zoom_factor(&self) -> f64 {
        self.state.zoom_factor()
    }

    pub fn session_id(&self) -> &str {
        self.logger.session_id()
    }

    /// Stop both tasks and summarize the session.
    pub async fn shutdown(self) -> FramingResult<SessionReport> {
        self.shutdown.send_replace(true);

        let outcome = self
            .analysis_task
            .await
            .map_err(|e| FramingError::TaskFailed(e.to_string()))?;
        let final_zoom_factor = self
            .actuator_task
            .await
            .map_err(|e| FramingError::TaskFailed(e.to_string()))?;

        let counters = &self.counters;
        let report = SessionReport {
            session_id: self.logger.session_id().to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            frames_submitted: SessionCounters::get(&counters.frames_submitted),
            frames_admitted: SessionCounters::get(&counters.frames_admitted),
            frames_analysed: SessionCounters::get(&counters.frames_analysed),
            frames_dropped: SessionCounters::get(&counters.frames_dropped),
            detector_timeouts: SessionCounters::get(&counters.detector_timeouts),
            detector_errors: SessionCounters::get(&counters.detector_errors),
            actuation_failures: outcome.actuation_failures + self.state.failures(),
            tracker: outcome.tracker,
            final_zoom_factor,
            final_mode: outcome.mode,
        };

        self.logger.log_completion(&format!(
            "{} frames analysed, {} dropped",
            report.frames_analysed, report.frames_dropped
        ));
        Ok(report)
    }
}

struct AnalysisTask<D> {
    pipeline: FramingPipeline<RemoteActuator>,
    detector: D,
    detector_timeout: std::time::Duration,
    ack_timeout: std::time::Duration,
    frames: watch::Receiver<Option<AdmittedFrame>>,
    control: mpsc::Receiver<ControlCommand>,
    snapshots: watch::Sender<FrameSnapshot>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<SessionCounters>,
    logger: SessionLogger,
    last_admission: u64,
}

impl<D: SubjectDetector> AnalysisTask<D> {
    async fn run(mut self) -> AnalysisOutcome {
        let mut control_open = true;

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("Analysis task stopping");
                        break;
                    }
                }
                command = self.control.recv(), if control_open => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => control_open = false,
                    }
                }
                changed = self.frames.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let admitted = self.frames.borrow_and_update().clone();
                    if let Some(admitted) = admitted {
                        self.analyse(admitted).await;
                    }
                }
            }
        }

        AnalysisOutcome {
            tracker: self.pipeline.tracker_stats(),
            mode: self.pipeline.mode(),
            actuation_failures: self.pipeline.actuation_failures(),
        }
    }

    async fn handle_command(&mut self, command: ControlCommand) {
        let before = self.pipeline.mode();
        if let Err(e) = self.pipeline.apply_command(command) {
            self.logger
                .log_warning(&format!("command {command:?} failed: {e}"));
        }
        if command == ControlCommand::ResumeAuto {
            self.resync_after_ack().await;
        }
        let after = self.pipeline.mode();
        if before != after {
            self.logger.log_mode_change(before, after);
        }
    }

    /// The readout seen while applying a command can trail the device by a
    /// tick. Wait for the device task to execute what was sent, then resync
    /// the controller from the fresh readout.
    async fn resync_after_ack(&mut self) {
        let ack = self.pipeline.actuator().acknowledged();
        let acked = tokio::time::timeout(self.ack_timeout, ack).await;
        match acked {
            Ok(Ok(())) => self.pipeline.resync_to_actuator(),
            Ok(Err(e)) => self.logger.log_warning(&format!("resync skipped: {e}")),
            Err(_) => self.logger.log_warning(&format!(
                "actuator did not acknowledge within {:?}, resynced from last readout",
                self.ack_timeout
            )),
        }
    }

    async fn analyse(&mut self, admitted: AdmittedFrame) {
        let dropped = admitted.admission.saturating_sub(self.last_admission + 1);
        self.last_admission = admitted.admission;
        if dropped > 0 {
            debug!(dropped, "Frames replaced while analysis was busy");
            SessionCounters::add(&self.counters.frames_dropped, dropped);
            metrics::record_frames_dropped(dropped);
        }

        let frame = admitted.frame;
        let raw = self.detect(&frame).await;
        let snapshot = self.pipeline.process(frame.sequence, frame.timestamp, &raw);

        let analysed = self.counters.frames_analysed.fetch_add(1, Ordering::Relaxed) + 1;
        if analysed % PROGRESS_INTERVAL_FRAMES == 0 {
            self.logger.log_progress(&format!(
                "{analysed} frames analysed, zoom {:.2}x",
                snapshot.zoom_factor
            ));
        }
        self.snapshots.send_replace(snapshot);
    }

    /// Run the detector under its deadline. Failures become "no detection".
    async fn detect(&self, frame: &CameraFrame) -> Vec<RawDetection> {
        let view = self.pipeline.current_crop();
        let name = self.detector.name();
        let call = self.detector.detect(frame, &view);

        let error = match tokio::time::timeout(self.detector_timeout, call).await {
            Ok(Ok(detections)) => return detections,
            Ok(Err(e)) => {
                metrics::record_detector_error(name);
                SessionCounters::add(&self.counters.detector_errors, 1);
                e
            }
            Err(_) => {
                metrics::record_detector_timeout(name);
                SessionCounters::add(&self.counters.detector_timeouts, 1);
                FramingError::DetectorTimeout(self.detector_timeout)
            }
        };

        if error.is_recoverable() {
            warn!(detector = name, error = %error, sequence = frame.sequence, "Detector failed");
        } else {
            self.logger.log_error(&format!(
                "detector {name} failed on frame {}: {error}",
                frame.sequence
            ));
        }
        Vec::new()
    }
}

/// Owns the device: executes commands and advances ramps until shutdown.
/// Returns the final zoom factor.
async fn run_actuator<A: ZoomActuator>(
    mut device: A,
    mut commands: watch::Receiver<Option<IssuedCommand>>,
    state: Arc<ActuatorState>,
    tick: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> f64 {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = tokio::time::Instant::now();
    let mut commands_open = true;

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            changed = commands.changed(), if commands_open => {
                if changed.is_err() {
                    commands_open = false;
                } else if let Some(issued) = *commands.borrow_and_update() {
                    execute_command(&mut device, issued.command, &state);
                    state.acknowledge(issued.seq);
                }
            }
            now = interval.tick() => {
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;
                device.advance(dt);
                state.publish(&device);
            }
        }
    }

    let factor = device.current_zoom_factor();
    info!(zoom_factor = factor, "Actuator task stopped");
    factor
}
