//! Single-slot trigger gate.
//!
//! The gate is the only state shared between the listener and the
//! coordinator. It holds at most one pending trigger; a trigger that arrives
//! while one is pending or being served is dropped, never queued.
//!
//! ```text
//!  Idle ──[trigger byte]──▶ Armed ──[coordinator takes]──▶ Busy
//!   ▲                                                       │
//!   └──────────[sequence done, repeating]───────────────────┤
//!                                                           ▼
//!                                        [sequence done, one-shot] Done
//! ```
//!
//! Every transition is a compare-and-set on one `watch` cell, so the check
//! and the write happen under the same lock and exactly one side owns each
//! edge: the listener arms, the coordinator takes and releases.

use std::fmt;
use tokio::sync::watch;

/// State of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Ready to accept a trigger
    Idle,
    /// Trigger accepted, waiting for the coordinator
    Armed,
    /// Move sequence running
    Busy,
    /// One-shot run finished; no more triggers accepted
    Done,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Armed => write!(f, "Armed"),
            Self::Busy => write!(f, "Busy"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Shared handle to the gate. Clones observe and mutate the same cell.
#[derive(Debug, Clone)]
pub struct TriggerGate {
    tx: watch::Sender<GateState>,
}

impl TriggerGate {
    /// Create a gate in `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::Idle);
        Self { tx }
    }

    /// Current state snapshot.
    pub fn state(&self) -> GateState {
        *self.tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }

    /// `Idle -> Armed`. Returns `false` (and changes nothing) from any other
    /// state.
    pub fn try_arm(&self) -> bool {
        self.transition(GateState::Idle, GateState::Armed)
    }

    /// `Armed -> Busy`. Returns `false` if nothing is pending.
    pub fn try_take(&self) -> bool {
        self.transition(GateState::Armed, GateState::Busy)
    }

    /// `Busy -> Idle`.
    pub fn reopen(&self) -> bool {
        self.transition(GateState::Busy, GateState::Idle)
    }

    /// `Busy -> Done`.
    pub fn finish(&self) -> bool {
        self.transition(GateState::Busy, GateState::Done)
    }

    /// Suspend until a trigger is pending, then take it (`Armed -> Busy`).
    ///
    /// Returns `false` if the gate was closed for good or every handle that
    /// could arm it is gone.
    pub async fn take_next(&self) -> bool {
        let mut rx = self.tx.subscribe();
        loop {
            let waited = rx
                .wait_for(|s| matches!(s, GateState::Armed | GateState::Done))
                .await
                .map(|s| *s);
            match waited {
                Ok(GateState::Armed) => {
                    if self.try_take() {
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }

    fn transition(&self, from: GateState, to: GateState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self::new()
    }
}
