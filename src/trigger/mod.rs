//! Trigger detection: the single-slot gate and the listener that arms it.

pub mod gate;
pub mod listener;

pub use gate::{GateState, TriggerGate};
pub use listener::TriggerListener;
