//! Device capability traits.
//!
//! The controller only ever talks to two devices: the trigger input (a byte
//! stream from the pulse controller) and the Z stage. Both are expressed as
//! small async capability traits so the run logic can be driven by real
//! hardware, the simulators in [`mock`], or the recording fakes used by the
//! integration tests.
//!
//! Releasing a device is tied to ownership: whoever owns the boxed device
//! drops it exactly once, and implementations close their connection in
//! `Drop` (a `tokio_serial::SerialStream` closes its file descriptor when
//! dropped).

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod mock;
#[cfg(feature = "tokio_serial")]
pub mod serial_trigger;

pub use mock::{PulseGenerator, SimulatedStage};
#[cfg(feature = "tokio_serial")]
pub use serial_trigger::SerialTriggerPort;

/// Byte-oriented trigger input.
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next byte on the line.
    ///
    /// # Errors
    /// Any error (including end of stream) means the source is gone; the
    /// listener treats it as fatal.
    async fn read_byte(&mut self) -> Result<u8>;

    /// Human-readable name used in log lines.
    fn describe(&self) -> String;
}

/// Direction of a relative move, as understood by the stage controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Positive travel
    Forward,
    /// Negative travel
    Reverse,
}

/// Speed profile of a relative move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    /// Normal (fast) positioning speed
    Fast,
    /// Slow positioning speed
    Slow,
}

/// Motorized stage controller.
///
/// Every call returns once the controller has accepted the command. The
/// controller offers no move-completion feedback, so callers separate
/// commands with fixed settle delays.
#[async_trait]
pub trait Actuator: Send {
    /// Drive `axis` to a position pre-programmed in the controller.
    async fn approach_stored_position(&mut self, axis: u8, slot: u8) -> Result<()>;

    /// Move `axis` by `delta` position units.
    async fn move_relative(
        &mut self,
        axis: u8,
        delta: f64,
        direction: Direction,
        speed: Speed,
    ) -> Result<()>;

    /// Ask the controller for the current position of `axis`.
    async fn query_position(&mut self, axis: u8) -> Result<f64>;

    /// Human-readable name used in log lines.
    fn describe(&self) -> String;
}
