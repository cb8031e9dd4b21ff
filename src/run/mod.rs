//! Run orchestration and cancellation.

pub mod controller;
pub mod shutdown;

pub use controller::{RunController, RunExit, RunReport};
pub use shutdown::{shutdown_pair, Shutdown, ShutdownHandle};
