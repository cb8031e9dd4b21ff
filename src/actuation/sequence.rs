//! Declarative move schedules.
//!
//! The stage gives no feedback when a move has physically settled, so every
//! schedule interleaves commands with fixed waits that were characterized on
//! the rig. A [`Schedule`] is a flat list of [`MoveStep`]s for one axis and is
//! always executed front to back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::hardware::{Direction, Speed};

/// Operating mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Serve exactly one trigger with a pair move, then finish.
    OneShotPair,
    /// Serve triggers forever with a pair move per trigger.
    RepeatingPair,
    /// Serve triggers forever with one relative step per trigger (Z stack).
    RepeatingStep,
}

impl Mode {
    /// Whether the coordinator loops after a cycle.
    pub fn repeat_policy(self) -> RepeatPolicy {
        match self {
            Mode::OneShotPair => RepeatPolicy::OneShot,
            Mode::RepeatingPair | Mode::RepeatingStep => RepeatPolicy::Repeating,
        }
    }

    /// Pair modes park the stage on a stored rest slot before listening.
    pub fn is_pair_move(self) -> bool {
        matches!(self, Mode::OneShotPair | Mode::RepeatingPair)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneShotPair => write!(f, "one_shot_pair"),
            Self::RepeatingPair => write!(f, "repeating_pair"),
            Self::RepeatingStep => write!(f, "repeating_step"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_shot_pair" => Ok(Self::OneShotPair),
            "repeating_pair" => Ok(Self::RepeatingPair),
            "repeating_step" => Ok(Self::RepeatingStep),
            other => Err(format!(
                "unknown mode '{}' (one_shot_pair, repeating_pair, repeating_step)",
                other
            )),
        }
    }
}

/// What happens after a move sequence completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Close the gate for good and finish the run.
    OneShot,
    /// Reopen the gate and wait for the next trigger.
    Repeating,
}

/// One unit of a schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveStep {
    /// Wall-clock delay.
    Wait(Duration),
    /// Approach a position pre-programmed in the stage controller.
    ApproachStored {
        /// Stored-position slot
        slot: u8,
    },
    /// Relative move from the current position.
    MoveRelative {
        /// Magnitude in position units
        delta: f64,
        /// Travel direction
        direction: Direction,
        /// Speed profile
        speed: Speed,
    },
    /// Read back the current position.
    QueryPosition,
}

impl fmt::Display for MoveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wait(d) => write!(f, "wait {:?}", d),
            Self::ApproachStored { slot } => write!(f, "approach stored position {}", slot),
            Self::MoveRelative {
                delta,
                direction,
                speed,
            } => write!(f, "move relative {} ({:?}, {:?})", delta, direction, speed),
            Self::QueryPosition => write!(f, "query position"),
        }
    }
}

/// Fixed step list executed against a single axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Stage axis every step addresses
    pub axis: u8,
    /// Steps in execution order
    pub steps: Vec<MoveStep>,
}

impl Schedule {
    /// Round trip: dwell, go to `target`, dwell plus `gap`, come back to `rest`.
    pub fn pair_move(axis: u8, rest: u8, target: u8, dwell: Duration, gap: Duration) -> Self {
        Self {
            axis,
            steps: vec![
                MoveStep::Wait(dwell),
                MoveStep::ApproachStored { slot: target },
                MoveStep::Wait(dwell.saturating_add(gap)),
                MoveStep::ApproachStored { slot: rest },
            ],
        }
    }

    /// Single Z-stack step: read position, short settle, relative move, pause.
    pub fn relative_step(
        axis: u8,
        delta: f64,
        direction: Direction,
        speed: Speed,
        settle: Duration,
        pause: Duration,
    ) -> Self {
        Self {
            axis,
            steps: vec![
                MoveStep::QueryPosition,
                MoveStep::Wait(settle),
                MoveStep::MoveRelative {
                    delta,
                    direction,
                    speed,
                },
                MoveStep::Wait(pause),
            ],
        }
    }

    /// Sum of all waits in one cycle.
    pub fn total_wait(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                MoveStep::Wait(d) => *d,
                _ => Duration::ZERO,
            })
            .sum()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "axis {}:", self.axis)?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        Ok(())
    }
}
