//! Core library for the ztrigger controller.
//!
//! Listens for a trigger byte from a pulse controller on a serial line and
//! drives a motorized Z stage through a fixed, timed move sequence each time
//! one arrives. Triggers that arrive while a sequence is running are dropped.
//!
//! - [`trigger`]: the single-slot gate and the listener that arms it
//! - [`actuation`]: move schedules and the coordinator that runs them
//! - [`run`]: start-up, concurrent execution, and teardown of a run
//! - [`hardware`]: device capability traits, serial input, simulators
//! - [`config`], [`logging`], [`error`]: ambient plumbing

pub mod actuation;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod run;
pub mod trigger;

pub use error::{AppResult, ZTriggerError};
