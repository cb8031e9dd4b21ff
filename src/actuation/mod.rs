//! Stage actuation: declarative schedules and the coordinator that runs them.

pub mod coordinator;
pub mod sequence;

pub use coordinator::ActuationCoordinator;
pub use sequence::{Mode, MoveStep, RepeatPolicy, Schedule};
