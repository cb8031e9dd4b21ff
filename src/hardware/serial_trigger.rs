//! Serial trigger input from the pulse controller
//!
//! The pulse controller (an Arduino sketch) writes a single marker byte on
//! its USB serial line each time the acquisition hardware wants the stage to
//! move. Nothing else on the line is meaningful.
//!
//! # Example Usage
//!
//! ```no_run
//! use ztrigger::hardware::{SerialTriggerPort, SignalSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut port = SerialTriggerPort::open("/dev/ttyACM0", 9600)?;
//!     let byte = port.read_byte().await?;
//!     println!("Got {:#04x}", byte);
//!     Ok(())
//! }
//! ```

use super::SignalSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Trigger line opened on a real serial port.
///
/// The port closes when this value is dropped.
pub struct SerialTriggerPort {
    port: SerialStream,
    path: String,
    baud_rate: u32,
}

impl SerialTriggerPort {
    /// Open the trigger line.
    ///
    /// # Arguments
    /// * `port_path` - Serial port path (e.g., "/dev/ttyACM0" on Linux, "COM4" on Windows)
    /// * `baud_rate` - Line speed configured in the pulse controller sketch
    ///
    /// # Errors
    /// Returns error if serial port cannot be opened
    pub fn open(port_path: &str, baud_rate: u32) -> Result<Self> {
        // 8N1, no flow control: what the Arduino USB serial bridge speaks
        let port = tokio_serial::new(port_path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .with_context(|| format!("Failed to open trigger serial port: {}", port_path))?;

        debug!("Trigger port '{}' opened at {} baud", port_path, baud_rate);

        Ok(Self {
            port,
            path: port_path.to_string(),
            baud_rate,
        })
    }
}

#[async_trait]
impl SignalSource for SerialTriggerPort {
    async fn read_byte(&mut self) -> Result<u8> {
        // read_u8 maps end-of-stream (unplugged board) to UnexpectedEof
        self.port
            .read_u8()
            .await
            .with_context(|| format!("Failed to read from trigger port {}", self.path))
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.path, self.baud_rate)
    }
}

impl Drop for SerialTriggerPort {
    fn drop(&mut self) {
        debug!("Trigger port '{}' closed", self.path);
    }
}
