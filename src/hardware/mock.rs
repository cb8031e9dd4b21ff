//! Simulated Hardware Implementations
//!
//! Provides stand-ins for the pulse controller and the Z stage so a run can
//! be rehearsed without physical hardware (`ztrigger run --simulate`).
//! All simulated devices use async-safe operations (tokio::time::sleep, not
//! std::thread::sleep), so they also behave under a paused test clock.
//!
//! # Available Simulators
//!
//! - `SimulatedStage` - stage controller with a stored-position table
//! - `PulseGenerator` - trigger line that emits the marker byte periodically
//!
//! # Performance Characteristics
//!
//! - SimulatedStage: 100 units/sec travel, 20ms command latency

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::time::{interval_at, sleep, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{Actuator, Direction, SignalSource, Speed};

// =============================================================================
// SimulatedStage - Stage controller with stored positions
// =============================================================================

/// Simulated stage controller.
///
/// Stored-position slots map to absolute positions; each axis starts at 0.0.
/// Motion takes `distance / speed` seconds, halved in [`Speed::Fast`] relative
/// to [`Speed::Slow`].
///
/// # Example
///
/// ```rust,ignore
/// let mut stage = SimulatedStage::new().with_stored_position(1, 0.0);
/// stage.approach_stored_position(15, 1).await?;
/// assert_eq!(stage.query_position(15).await?, 0.0);
/// ```
#[derive(Debug)]
pub struct SimulatedStage {
    stored: HashMap<u8, f64>,
    positions: HashMap<u8, f64>,
    speed_units_per_sec: f64,
}

impl SimulatedStage {
    /// Create a stage with slots 1 and 2 programmed at 0.0 and 100.0.
    pub fn new() -> Self {
        Self {
            stored: HashMap::from([(1, 0.0), (2, 100.0)]),
            positions: HashMap::new(),
            speed_units_per_sec: 100.0,
        }
    }

    /// Program (or overwrite) a stored-position slot.
    #[must_use]
    pub fn with_stored_position(mut self, slot: u8, position: f64) -> Self {
        self.stored.insert(slot, position);
        self
    }

    fn position(&self, axis: u8) -> f64 {
        self.positions.get(&axis).copied().unwrap_or(0.0)
    }

    async fn travel(&mut self, axis: u8, target: f64, speed: Speed) {
        let distance = (target - self.position(axis)).abs();
        let factor = match speed {
            Speed::Fast => 2.0,
            Speed::Slow => 1.0,
        };
        let secs = distance / (self.speed_units_per_sec * factor);

        sleep(Duration::from_millis(20)).await;
        sleep(Duration::from_secs_f64(secs)).await;

        self.positions.insert(axis, target);
        debug!(axis, position = target, "SimulatedStage: reached target");
    }
}

impl Default for SimulatedStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actuator for SimulatedStage {
    async fn approach_stored_position(&mut self, axis: u8, slot: u8) -> Result<()> {
        let target = *self
            .stored
            .get(&slot)
            .ok_or_else(|| anyhow!("No stored position in slot {}", slot))?;
        info!(axis, slot, target, "SimulatedStage: approaching stored position");
        self.travel(axis, target, Speed::Fast).await;
        Ok(())
    }

    async fn move_relative(
        &mut self,
        axis: u8,
        delta: f64,
        direction: Direction,
        speed: Speed,
    ) -> Result<()> {
        let signed = match direction {
            Direction::Forward => delta,
            Direction::Reverse => -delta,
        };
        let target = self.position(axis) + signed;
        info!(axis, delta = signed, ?speed, "SimulatedStage: relative move");
        self.travel(axis, target, speed).await;
        Ok(())
    }

    async fn query_position(&mut self, axis: u8) -> Result<f64> {
        sleep(Duration::from_millis(20)).await;
        let position = self.position(axis);
        info!(axis, position, "SimulatedStage: position");
        Ok(position)
    }

    fn describe(&self) -> String {
        "simulated stage".to_string()
    }
}

impl Drop for SimulatedStage {
    fn drop(&mut self) {
        debug!("SimulatedStage: released");
    }
}

// =============================================================================
// PulseGenerator - Simulated trigger line
// =============================================================================

/// Simulated pulse controller.
///
/// Emits `marker` once per `period`, the first one a full period after
/// creation. Never fails.
#[derive(Debug)]
pub struct PulseGenerator {
    marker: u8,
    period: Duration,
    ticker: Interval,
}

impl PulseGenerator {
    /// Create a generator emitting `marker` every `period`.
    pub fn new(marker: u8, period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            marker,
            period,
            ticker,
        }
    }
}

#[async_trait]
impl SignalSource for PulseGenerator {
    async fn read_byte(&mut self) -> Result<u8> {
        self.ticker.tick().await;
        Ok(self.marker)
    }

    fn describe(&self) -> String {
        format!("pulse generator (every {:?})", self.period)
    }
}
