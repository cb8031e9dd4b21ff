//! Trigger listener.
//!
//! Reads the signal source one byte at a time and arms the gate when the
//! marker byte arrives while the gate is `Idle`. Everything else is noise.
//! Filtering is by gate state only; there is no time-based debounce.

use tracing::{debug, info};

use super::gate::TriggerGate;
use crate::actuation::RepeatPolicy;
use crate::error::{AppResult, ZTriggerError};
use crate::hardware::SignalSource;
use crate::run::Shutdown;

/// Owns the signal source for the duration of a run.
pub struct TriggerListener {
    source: Box<dyn SignalSource>,
    gate: TriggerGate,
    marker: u8,
    policy: RepeatPolicy,
}

impl TriggerListener {
    /// Create a listener arming `gate` on `marker`.
    pub fn new(
        source: Box<dyn SignalSource>,
        gate: TriggerGate,
        marker: u8,
        policy: RepeatPolicy,
    ) -> Self {
        Self {
            source,
            gate,
            marker,
            policy,
        }
    }

    /// Read until cancelled.
    ///
    /// In one-shot mode this returns after the first accepted trigger. The
    /// signal source is dropped when this future completes or is dropped.
    ///
    /// # Errors
    /// `ZTriggerError::SignalLost` if the source fails or closes.
    pub async fn listen(mut self, mut shutdown: Shutdown) -> AppResult<()> {
        debug!(source = %self.source.describe(), "Listening for trigger");

        loop {
            let byte = tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    debug!("Listener cancelled");
                    return Ok(());
                }
                read = self.source.read_byte() => read.map_err(ZTriggerError::signal_lost)?,
            };

            if !self.on_byte(byte) {
                continue;
            }

            if self.policy == RepeatPolicy::OneShot {
                debug!("One-shot listener served its trigger");
                return Ok(());
            }
        }
    }

    /// Apply the gate policy to one byte. Returns whether it armed the gate.
    fn on_byte(&self, byte: u8) -> bool {
        if byte != self.marker {
            debug!(byte, "Ignoring non-trigger byte");
            return false;
        }

        if self.gate.try_arm() {
            info!("Trigger received");
            true
        } else {
            debug!(gate = %self.gate.state(), "Trigger dropped, gate not idle");
            false
        }
    }
}
