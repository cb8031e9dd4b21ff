//! Shared fakes for the run-level integration tests.
//!
//! `RecordingStage` logs every command with the (virtual) time it was issued
//! and can be told to fail or panic on a given call. `ChannelSource` is a
//! trigger line fed from the test through an mpsc channel; dropping the
//! sender looks like an unplugged board.
//!
//! Both count how many times they were released (dropped).

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use ztrigger::config::Settings;
use ztrigger::hardware::{Actuator, Direction, SignalSource, Speed};

/// A command the stage received.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Approach { axis: u8, slot: u8 },
    Relative { axis: u8, delta: f64, direction: Direction, speed: Speed },
    Query { axis: u8 },
}

/// Command with the instant it was issued.
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub command: Command,
}

/// Inspection side of a `RecordingStage`.
#[derive(Clone, Default)]
pub struct StageProbe {
    calls: Arc<Mutex<Vec<Call>>>,
    released: Arc<AtomicUsize>,
}

impl StageProbe {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

enum Fault {
    None,
    Fail(usize),
    Panic(usize),
}

pub struct RecordingStage {
    probe: StageProbe,
    fault: Fault,
    position: f64,
}

impl RecordingStage {
    pub fn new() -> (Self, StageProbe) {
        let probe = StageProbe::default();
        (
            Self {
                probe: probe.clone(),
                fault: Fault::None,
                position: 0.0,
            },
            probe,
        )
    }

    /// Fail the `n`th command (1-based).
    pub fn failing_on(n: usize) -> (Self, StageProbe) {
        let (mut stage, probe) = Self::new();
        stage.fault = Fault::Fail(n);
        (stage, probe)
    }

    /// Panic on the `n`th command (1-based).
    pub fn panicking_on(n: usize) -> (Self, StageProbe) {
        let (mut stage, probe) = Self::new();
        stage.fault = Fault::Panic(n);
        (stage, probe)
    }

    fn record(&mut self, command: Command) -> Result<()> {
        let n = {
            let mut calls = self.probe.calls.lock().unwrap();
            calls.push(Call {
                at: Instant::now(),
                command,
            });
            calls.len()
        };
        match self.fault {
            Fault::Fail(at) if at == n => bail!("stage not responding (call {})", n),
            Fault::Panic(at) if at == n => panic!("stage driver crashed"),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Actuator for RecordingStage {
    async fn approach_stored_position(&mut self, axis: u8, slot: u8) -> Result<()> {
        self.record(Command::Approach { axis, slot })
    }

    async fn move_relative(
        &mut self,
        axis: u8,
        delta: f64,
        direction: Direction,
        speed: Speed,
    ) -> Result<()> {
        self.record(Command::Relative {
            axis,
            delta,
            direction,
            speed,
        })?;
        self.position -= delta;
        Ok(())
    }

    async fn query_position(&mut self, axis: u8) -> Result<f64> {
        self.record(Command::Query { axis })?;
        Ok(self.position)
    }

    fn describe(&self) -> String {
        "recording stage".to_string()
    }
}

impl Drop for RecordingStage {
    fn drop(&mut self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Trigger line driven by the test.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<u8>,
    released: Arc<AtomicUsize>,
}

/// Test side of a `ChannelSource`.
pub struct Line {
    tx: Option<mpsc::UnboundedSender<u8>>,
    released: Arc<AtomicUsize>,
}

impl ChannelSource {
    pub fn new() -> (Self, Line) {
        let (tx, rx) = mpsc::unbounded_channel();
        let released = Arc::new(AtomicUsize::new(0));
        (
            Self {
                rx,
                released: released.clone(),
            },
            Line {
                tx: Some(tx),
                released,
            },
        )
    }
}

#[async_trait]
impl SignalSource for ChannelSource {
    async fn read_byte(&mut self) -> Result<u8> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("trigger line closed"))
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Line {
    /// Put bytes on the line. Ignored once the listener is gone.
    pub fn send(&self, bytes: &[u8]) {
        if let Some(tx) = &self.tx {
            for b in bytes {
                let _ = tx.send(*b);
            }
        }
    }

    /// Simulate the board being unplugged.
    pub fn unplug(&mut self) {
        self.tx = None;
    }

    /// Whether the listener side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub fn settings(mode: ztrigger::actuation::Mode) -> Settings {
    let mut settings = Settings::default();
    settings.run.mode = mode;
    settings
}

/// Assert `actual` is `expected` up to timer granularity.
pub fn assert_elapsed(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}
