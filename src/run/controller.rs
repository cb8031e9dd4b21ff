//! Run controller.
//!
//! Owns both devices for the length of a run. The start-up move happens
//! here, synchronously, before anything listens; then the listener and the
//! coordinator run as two tokio tasks. Whatever ends the run (one-shot
//! completion, an external shutdown request, a failure in either task) the
//! controller stops both tasks and waits for them before returning.
//!
//! # Shutdown Sequence
//!
//! 1. The first terminal event is recorded (completion, cancel, or error).
//! 2. The internal stop signal is raised; a blocked read or settle wait
//!    returns immediately, a stage command already issued is awaited.
//! 3. Both tasks are joined. Each task owns its device, so the serial line
//!    and the stage are dropped exactly once, inside the task, on every path.
//!    If `run` itself is dropped, the `JoinSet` aborts both tasks, which
//!    drops the devices the same way.

use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::shutdown::{shutdown_pair, Shutdown};
use crate::actuation::{ActuationCoordinator, Mode, RepeatPolicy, Schedule};
use crate::config::Settings;
use crate::error::{AppResult, ZTriggerError};
use crate::hardware::{Actuator, SignalSource};
use crate::trigger::{TriggerGate, TriggerListener};

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// One-shot cycle finished
    Completed,
    /// Shutdown was requested
    Cancelled,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Operating mode of the run
    pub mode: Mode,
    /// Completed move sequences
    pub cycles: u64,
    /// Completion or cancellation
    pub exit: RunExit,
}

enum Finished {
    Listener(AppResult<()>),
    Coordinator(AppResult<u64>),
}

/// Top-level orchestration of one run.
#[derive(Debug)]
pub struct RunController {
    mode: Mode,
    schedule: Schedule,
    policy: RepeatPolicy,
    marker: u8,
    rest_slot: u8,
    startup_settle: Duration,
    gate: TriggerGate,
}

impl RunController {
    /// Build a controller from validated settings.
    ///
    /// # Errors
    /// `ZTriggerError::Configuration` if the settings are invalid. Nothing
    /// has touched a device at that point.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        settings.validate()?;
        let (rest_slot, _) = settings.slots();
        Ok(Self {
            mode: settings.run.mode,
            schedule: settings.schedule(),
            policy: settings.repeat_policy(),
            marker: settings.signal.trigger_marker,
            rest_slot,
            startup_settle: settings.startup_settle(),
            gate: TriggerGate::new(),
        })
    }

    /// Handle on the run's gate, for observers.
    pub fn gate(&self) -> TriggerGate {
        self.gate.clone()
    }

    /// Schedule executed on each trigger.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run until the one-shot cycle completes, `cancel` fires, or a device
    /// fails.
    ///
    /// # Errors
    /// The first fatal error of the run: `SignalLost`, `Actuator`, or
    /// `TaskFailed`. Both devices have been released when this returns.
    pub async fn run(
        self,
        source: Box<dyn SignalSource>,
        mut actuator: Box<dyn Actuator>,
        mut cancel: Shutdown,
    ) -> AppResult<RunReport> {
        info!(
            mode = %self.mode,
            source = %source.describe(),
            stage = %actuator.describe(),
            "Run starting"
        );

        if !self.prepare(actuator.as_mut(), &mut cancel).await? {
            info!("Shutdown requested before listening");
            return Ok(RunReport {
                mode: self.mode,
                cycles: 0,
                exit: RunExit::Cancelled,
            });
        }
        info!("Waiting trigger...");

        let (stop, stop_rx) = shutdown_pair();
        let listener = TriggerListener::new(source, self.gate.clone(), self.marker, self.policy);
        let coordinator =
            ActuationCoordinator::new(actuator, self.gate.clone(), self.schedule, self.policy);

        let mut tasks = JoinSet::new();
        let rx = stop_rx.clone();
        tasks.spawn(async move { Finished::Listener(listener.listen(rx).await) });
        tasks.spawn(async move { Finished::Coordinator(coordinator.run(stop_rx).await) });

        let mut first_error: Option<ZTriggerError> = None;
        let mut cycles = 0;
        let mut exit = RunExit::Completed;
        let mut stopping = false;

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.wait(), if !stopping => {
                    info!("Shutdown requested");
                    exit = RunExit::Cancelled;
                    stopping = true;
                    stop.trigger();
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let failure = match joined {
                        Ok(Finished::Listener(Ok(()))) => {
                            debug!("Listener finished");
                            None
                        }
                        Ok(Finished::Coordinator(Ok(done))) => {
                            cycles = done;
                            debug!(cycles, "Coordinator finished");
                            if !stopping {
                                stopping = true;
                                stop.trigger();
                            }
                            None
                        }
                        Ok(Finished::Listener(Err(err))) | Ok(Finished::Coordinator(Err(err))) => {
                            Some(err)
                        }
                        Err(join_err) => Some(ZTriggerError::TaskFailed(join_err.to_string())),
                    };

                    if let Some(err) = failure {
                        if !stopping {
                            stopping = true;
                            stop.trigger();
                        }
                        record(&mut first_error, err);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            error!("Run failed: {}", err);
            return Err(err);
        }

        info!(cycles, ?exit, "Run finished");
        Ok(RunReport {
            mode: self.mode,
            cycles,
            exit,
        })
    }

    /// Bring the stage to a known state before listening. Returns `false`
    /// if shutdown was requested during the settle delay.
    async fn prepare(&self, actuator: &mut dyn Actuator, cancel: &mut Shutdown) -> AppResult<bool> {
        let axis = self.schedule.axis;
        if self.mode.is_pair_move() {
            actuator
                .approach_stored_position(axis, self.rest_slot)
                .await
                .map_err(ZTriggerError::actuator)?;
            info!(axis, slot = self.rest_slot, "Stage at rest position");
            return Ok(!cancel.is_triggered());
        }

        let position = actuator
            .query_position(axis)
            .await
            .map_err(ZTriggerError::actuator)?;
        info!(axis, position, "Start position");

        tokio::select! {
            biased;
            _ = cancel.wait() => Ok(false),
            _ = sleep(self.startup_settle) => Ok(true),
        }
    }
}

fn record(slot: &mut Option<ZTriggerError>, err: ZTriggerError) {
    match slot {
        None => *slot = Some(err),
        Some(_) => warn!("Additional failure during teardown: {}", err),
    }
}
