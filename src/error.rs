//! Custom error types for the application.
//!
//! This module defines the primary error type, `ZTriggerError`, for the whole
//! controller. Every failure is a hard stop: nothing in the crate retries a
//! device operation, because an unverified stage position must not be acted
//! on again.
//!
//! ## Error Hierarchy
//!
//! - **`SignalLost`**: the trigger input (serial line from the pulse controller)
//!   closed or failed while the listener was reading from it.
//! - **`Actuator`**: a stage move or position query failed. The current cycle
//!   and the run are both aborted.
//! - **`Configuration`**: semantic errors in the run parameters (bad axis, slot,
//!   step size, ...). These are raised before any device is touched.
//! - **`Config`**: wraps `figment` load/parse errors.
//! - **`Io`**: wraps `std::io::Error`, mostly from opening the serial port.
//! - **`TaskFailed`**: a listener or coordinator task panicked or was aborted.
//!
//! Device implementations speak `anyhow::Result` (see [`crate::hardware`]);
//! the listener and coordinator fold those into the variants above so callers
//! can tell a lost signal source from a failed stage.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ZTriggerError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum ZTriggerError {
    #[error("Signal source lost: {0}")]
    SignalLost(String),

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<figment::Error> for ZTriggerError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl ZTriggerError {
    /// Wrap a device-level error from the signal source.
    pub fn signal_lost(err: anyhow::Error) -> Self {
        Self::SignalLost(format!("{err:#}"))
    }

    /// Wrap a device-level error from the stage.
    pub fn actuator(err: anyhow::Error) -> Self {
        Self::Actuator(format!("{err:#}"))
    }
}
