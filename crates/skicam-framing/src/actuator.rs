//! Zoom actuation boundary.
//!
//! The physical zoom is an external device reached through [`ZoomActuator`].
//! When the device lives on another task, the analysis side talks to it
//! through [`RemoteActuator`], which only ever publishes the latest
//! [`ActuatorCommand`] and reads back a shared [`ActuatorState`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{FramingError, FramingResult};
use crate::metrics;

/// Hardware zoom interface.
pub trait ZoomActuator: Send {
    /// Apply a zoom factor (1.0 = no zoom). The device clamps to its range.
    fn apply_zoom(&mut self, factor: f64) -> FramingResult<()>;

    /// Current zoom factor readout.
    fn current_zoom_factor(&self) -> f64;

    /// Largest supported zoom factor.
    fn max_zoom_factor(&self) -> f64;

    /// Start a smooth ramp toward `target` at `rate` doublings per second.
    fn ramp_zoom(&mut self, target: f64, rate: f64) -> FramingResult<()>;

    /// Stop an in-flight ramp at the current factor.
    fn cancel_ramp(&mut self);

    /// Whether a ramp is in progress.
    fn is_ramping(&self) -> bool;

    /// Advance software ramps by `dt` seconds. Devices with hardware ramps
    /// can ignore this.
    fn advance(&mut self, _dt: f64) {}
}

/// Exponential zoom ramp, as camera hardware performs it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRamp {
    pub target: f64,
    /// Doublings per second
    pub rate: f64,
}

impl ZoomRamp {
    /// Step `current` toward the target; returns the new factor and whether
    /// the target was reached.
    pub fn step(&self, current: f64, dt: f64) -> (f64, bool) {
        let multiplier = (self.rate.abs() * dt.max(0.0)).exp2();
        if current < self.target {
            let next = (current * multiplier).min(self.target);
            (next, next >= self.target)
        } else {
            let next = (current / multiplier).max(self.target);
            (next, next <= self.target)
        }
    }
}

/// In-process zoom device for tests, replays and demos.
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    factor: f64,
    max_factor: f64,
    ramp: Option<ZoomRamp>,
    fail_remaining: u32,
    applied: Vec<f64>,
}

impl SimulatedActuator {
    pub fn new(max_factor: f64) -> Self {
        Self {
            factor: 1.0,
            max_factor: max_factor.max(1.0),
            ramp: None,
            fail_remaining: 0,
            applied: Vec::new(),
        }
    }

    /// Reject the next `count` zoom commands.
    pub fn fail_next(&mut self, count: u32) {
        self.fail_remaining = count;
    }

    /// Factors successfully applied, in order.
    pub fn applied(&self) -> &[f64] {
        &self.applied
    }

    fn clamp(&self, factor: f64) -> f64 {
        factor.clamp(1.0, self.max_factor)
    }
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl ZoomActuator for SimulatedActuator {
    fn apply_zoom(&mut self, factor: f64) -> FramingResult<()> {
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(FramingError::actuator_failed(format!(
                "device rejected zoom factor {factor:.3}"
            )));
        }
        self.ramp = None;
        self.factor = self.clamp(factor);
        self.applied.push(self.factor);
        Ok(())
    }

    fn current_zoom_factor(&self) -> f64 {
        self.factor
    }

    fn max_zoom_factor(&self) -> f64 {
        self.max_factor
    }

    fn ramp_zoom(&mut self, target: f64, rate: f64) -> FramingResult<()> {
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(FramingError::actuator_failed("device rejected zoom ramp"));
        }
        self.ramp = Some(ZoomRamp {
            target: self.clamp(target),
            rate,
        });
        Ok(())
    }

    fn cancel_ramp(&mut self) {
        self.ramp = None;
    }

    fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }

    fn advance(&mut self, dt: f64) {
        if let Some(ramp) = self.ramp {
            let (next, done) = ramp.step(self.factor, dt);
            self.factor = next;
            if done {
                self.ramp = None;
            }
        }
    }
}

/// Single-message command for a device owned by another task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    SetZoom(f64),
    Ramp { target: f64, rate: f64 },
    CancelRamp,
}

/// A command tagged with its issue number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IssuedCommand {
    /// 1-based, increasing per command sent
    pub seq: u64,
    pub command: ActuatorCommand,
}

/// Device readout shared between the actuator task and its clients.
#[derive(Debug)]
pub struct ActuatorState {
    factor_bits: AtomicU64,
    max_bits: AtomicU64,
    failures: AtomicU64,
    ramping: AtomicU64,
    issued: AtomicU64,
    /// Sequence number of the last command the device task executed
    acknowledged: watch::Sender<u64>,
}

impl ActuatorState {
    pub fn new(factor: f64, max_factor: f64) -> Self {
        let (acknowledged, _) = watch::channel(0);
        Self {
            factor_bits: AtomicU64::new(factor.to_bits()),
            max_bits: AtomicU64::new(max_factor.to_bits()),
            failures: AtomicU64::new(0),
            ramping: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            acknowledged,
        }
    }

    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Sequence number of the last command sent to the device task.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    /// Mark every command up to `seq` as executed and published.
    pub fn acknowledge(&self, seq: u64) {
        self.acknowledged.send_if_modified(|acked| {
            if seq > *acked {
                *acked = seq;
                true
            } else {
                false
            }
        });
    }

    pub fn acknowledged(&self) -> u64 {
        *self.acknowledged.borrow()
    }

    /// Publish the device readout.
    pub fn publish<A: ZoomActuator + ?Sized>(&self, actuator: &A) {
        self.factor_bits
            .store(actuator.current_zoom_factor().to_bits(), Ordering::Release);
        self.ramping
            .store(u64::from(actuator.is_ramping()), Ordering::Release);
    }

    pub fn zoom_factor(&self) -> f64 {
        f64::from_bits(self.factor_bits.load(Ordering::Acquire))
    }

    pub fn max_zoom_factor(&self) -> f64 {
        f64::from_bits(self.max_bits.load(Ordering::Acquire))
    }

    pub fn is_ramping(&self) -> bool {
        self.ramping.load(Ordering::Acquire) != 0
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Execute one command against a device, logging and counting failures.
///
/// A rejected command is not retried and nothing is rolled back.
pub fn execute_command<A: ZoomActuator + ?Sized>(
    actuator: &mut A,
    command: ActuatorCommand,
    state: &ActuatorState,
) {
    let result = match command {
        ActuatorCommand::SetZoom(factor) => actuator.apply_zoom(factor),
        ActuatorCommand::Ramp { target, rate } => actuator.ramp_zoom(target, rate),
        ActuatorCommand::CancelRamp => {
            actuator.cancel_ramp();
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(error = %e, command = ?command, "Zoom actuation failed");
        metrics::record_actuation_failure();
        state.record_failure();
    }
    state.publish(actuator);
}

/// Client half of a device owned by another task.
///
/// Commands are latest-wins: a command not yet picked up by the device task
/// is replaced by the next one.
#[derive(Debug, Clone)]
pub struct RemoteActuator {
    commands: watch::Sender<Option<IssuedCommand>>,
    state: Arc<ActuatorState>,
}

impl RemoteActuator {
    pub fn new(commands: watch::Sender<Option<IssuedCommand>>, state: Arc<ActuatorState>) -> Self {
        Self { commands, state }
    }

    fn send(&self, command: ActuatorCommand) -> FramingResult<()> {
        let seq = self.state.next_seq();
        self.commands
            .send(Some(IssuedCommand { seq, command }))
            .map_err(|_| FramingError::ActuatorUnavailable)
    }

    pub fn state(&self) -> &Arc<ActuatorState> {
        &self.state
    }

    /// Wait until the device task has executed every command sent so far,
    /// so the readout reflects them.
    pub async fn acknowledged(&self) -> FramingResult<()> {
        let issued = self.state.issued();
        let mut acks = self.state.acknowledged.subscribe();
        acks.wait_for(|&acked| acked >= issued)
            .await
            .map(|_| ())
            .map_err(|_| FramingError::ActuatorUnavailable)
    }
}

impl ZoomActuator for RemoteActuator {
    fn apply_zoom(&mut self, factor: f64) -> FramingResult<()> {
        self.send(ActuatorCommand::SetZoom(factor))
    }

    fn current_zoom_factor(&self) -> f64 {
        self.state.zoom_factor()
    }

    fn max_zoom_factor(&self) -> f64 {
        self.state.max_zoom_factor()
    }

    fn ramp_zoom(&mut self, target: f64, rate: f64) -> FramingResult<()> {
        debug!(target, rate, "Requesting zoom ramp");
        self.send(ActuatorCommand::Ramp { target, rate })
    }

    fn cancel_ramp(&mut self) {
        if self.send(ActuatorCommand::CancelRamp).is_err() {
            debug!("Cancel ramp dropped, actuator task gone");
        }
    }

    fn is_ramping(&self) -> bool {
        self.state.is_ramping()
    }
}
