//! `ztrigger` command-line entry point.
//!
//! ```bash
//! ztrigger run --config config/ztrigger.toml
//! ztrigger run --mode repeating_step --port /dev/ttyACM1
//! ztrigger run --simulate          # pulse generator instead of the serial line
//! ztrigger check                   # print resolved settings and schedule
//! ztrigger ports                   # list serial ports
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use ztrigger::actuation::Mode;
use ztrigger::config::{Settings, DEFAULT_CONFIG_PATH};
use ztrigger::hardware::{Actuator, PulseGenerator, SignalSource, SimulatedStage};
use ztrigger::logging;
use ztrigger::run::{shutdown_pair, RunController, RunExit};

#[derive(Parser)]
#[command(
    name = "ztrigger",
    about = "Move a Z stage through a timed sequence on each external trigger pulse",
    version
)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Arm the trigger and drive the stage
    Run {
        /// Override the operating mode (one_shot_pair, repeating_pair, repeating_step)
        #[arg(long)]
        mode: Option<Mode>,

        /// Override the trigger serial port
        #[arg(long)]
        port: Option<String>,

        /// Use the simulated pulse generator instead of the serial line
        #[arg(long)]
        simulate: bool,
    },

    /// Validate configuration and show the move schedule
    Check,

    /// List serial ports visible to this host
    Ports,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            mode,
            port,
            simulate,
        } => {
            let mut settings = Settings::load(&cli.config)?;
            if let Some(mode) = mode {
                settings.run.mode = mode;
            }
            if let Some(port) = port {
                settings.signal.port = port;
            }
            settings.validate()?;
            logging::init(&settings.application.log_level);
            run(settings, simulate).await
        }
        Commands::Check => {
            let settings = Settings::load(&cli.config)?;
            let schedule = settings.schedule();
            println!("{}", settings.to_toml()?);
            println!("Schedule ({}):", settings.run.mode);
            print!("{}", schedule);
            println!("Total wait per cycle: {:?}", schedule.total_wait());
            Ok(())
        }
        Commands::Ports => list_ports(),
    }
}

async fn run(settings: Settings, simulate: bool) -> Result<()> {
    // Validates before any device is opened
    let controller = RunController::from_settings(&settings)?;

    let source: Box<dyn SignalSource> = if simulate {
        Box::new(PulseGenerator::new(
            settings.signal.trigger_marker,
            Duration::from_millis(settings.signal.simulate_period_ms),
        ))
    } else {
        open_serial(&settings)?
    };

    // The stage command protocol lives behind the Actuator trait; this
    // binary ships the simulator only.
    warn!("Driving the simulated stage");
    let stage: Box<dyn Actuator> = Box::new(SimulatedStage::new());

    let (handle, cancel) = shutdown_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            handle.trigger();
        }
    });

    let report = controller.run(source, stage, cancel).await?;
    match report.exit {
        RunExit::Completed => info!(cycles = report.cycles, "Done"),
        RunExit::Cancelled => info!(cycles = report.cycles, "Stopped"),
    }
    Ok(())
}

#[cfg(feature = "tokio_serial")]
fn open_serial(settings: &Settings) -> Result<Box<dyn SignalSource>> {
    let port = ztrigger::hardware::SerialTriggerPort::open(
        &settings.signal.port,
        settings.signal.baud_rate,
    )?;
    Ok(Box::new(port))
}

#[cfg(not(feature = "tokio_serial"))]
fn open_serial(_settings: &Settings) -> Result<Box<dyn SignalSource>> {
    anyhow::bail!("Serial support not enabled. Rebuild with --features tokio_serial or use --simulate")
}

#[cfg(feature = "instrument_serial")]
fn list_ports() -> Result<()> {
    use anyhow::Context;

    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => println!(
                "{}  USB {:04x}:{:04x} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}

#[cfg(not(feature = "instrument_serial"))]
fn list_ports() -> Result<()> {
    anyhow::bail!("Serial support not enabled. Rebuild with --features instrument_serial")
}
