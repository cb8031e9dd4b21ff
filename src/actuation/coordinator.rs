//! Actuation coordinator.
//!
//! Waits for the gate to be armed, takes it, runs the schedule against the
//! stage, then reopens the gate (repeating) or closes it for good (one-shot).
//! A failed stage command ends the run: resuming a half-finished sequence
//! from an unknown physical position is not safe.

use tokio::time::sleep;
use tracing::{debug, info, info_span, Instrument};

use super::sequence::{MoveStep, RepeatPolicy, Schedule};
use crate::error::{AppResult, ZTriggerError};
use crate::hardware::Actuator;
use crate::run::Shutdown;
use crate::trigger::TriggerGate;

/// Outcome of a single step.
enum Flow {
    Continue,
    Cancelled,
}

/// Owns the stage for the duration of a run.
pub struct ActuationCoordinator {
    actuator: Box<dyn Actuator>,
    gate: TriggerGate,
    schedule: Schedule,
    policy: RepeatPolicy,
}

impl ActuationCoordinator {
    /// Create a coordinator serving `gate` with `schedule`.
    pub fn new(
        actuator: Box<dyn Actuator>,
        gate: TriggerGate,
        schedule: Schedule,
        policy: RepeatPolicy,
    ) -> Self {
        Self {
            actuator,
            gate,
            schedule,
            policy,
        }
    }

    /// Serve triggers until the one-shot cycle completes or shutdown is
    /// requested. Returns the number of completed cycles.
    ///
    /// The stage is dropped when this future completes or is dropped.
    ///
    /// # Errors
    /// `ZTriggerError::Actuator` on the first failed stage command.
    pub async fn run(self, mut shutdown: Shutdown) -> AppResult<u64> {
        let Self {
            mut actuator,
            gate,
            schedule,
            policy,
        } = self;
        let mut cycles = 0u64;

        loop {
            let taken = tokio::select! {
                biased;
                _ = shutdown.wait() => false,
                taken = gate.take_next() => taken,
            };
            if !taken {
                debug!(cycles, "Coordinator stopping");
                return Ok(cycles);
            }

            let cycle = cycles + 1;
            let span = info_span!("cycle", cycle, axis = schedule.axis);
            let flow = run_sequence(actuator.as_mut(), &schedule, &mut shutdown)
                .instrument(span)
                .await?;

            if let Flow::Cancelled = flow {
                info!(cycle, "Sequence interrupted by shutdown");
                return Ok(cycles);
            }
            cycles = cycle;

            match policy {
                RepeatPolicy::OneShot => {
                    gate.finish();
                    info!("Sequence complete");
                    return Ok(cycles);
                }
                RepeatPolicy::Repeating => {
                    gate.reopen();
                    info!("Waiting trigger...");
                }
            }
        }
    }
}

async fn run_sequence(
    actuator: &mut dyn Actuator,
    schedule: &Schedule,
    shutdown: &mut Shutdown,
) -> AppResult<Flow> {
    let axis = schedule.axis;
    for step in &schedule.steps {
        debug!(%step, "Executing step");
        match step {
            MoveStep::Wait(duration) => {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => return Ok(Flow::Cancelled),
                    _ = sleep(*duration) => {}
                }
            }
            MoveStep::ApproachStored { slot } => {
                actuator
                    .approach_stored_position(axis, *slot)
                    .await
                    .map_err(ZTriggerError::actuator)?;
                info!(axis, slot, "Moved to stored position");
            }
            MoveStep::MoveRelative {
                delta,
                direction,
                speed,
            } => {
                actuator
                    .move_relative(axis, *delta, *direction, *speed)
                    .await
                    .map_err(ZTriggerError::actuator)?;
                info!(axis, delta, ?direction, "Stepped");
            }
            MoveStep::QueryPosition => {
                let position = actuator
                    .query_position(axis)
                    .await
                    .map_err(ZTriggerError::actuator)?;
                info!(axis, position, "Position");
            }
        }
    }
    Ok(Flow::Continue)
}
