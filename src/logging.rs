//! Console logging.
//!
//! Installs a `tracing` fmt subscriber whose lines read
//! `[YYYY/MM/DD HH:MM:SS] Trigger received`, local time, followed by any
//! structured fields. `RUST_LOG` takes precedence over the configured level.

use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use tracing::Subscriber;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime, MakeWriter};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Timestamp layout of every console line.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Local wall-clock timer in bracketed `YYYY/MM/DD HH:MM:SS` form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTime;

impl FormatTime for ConsoleTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", console_timestamp(&Local::now()))
    }
}

/// Render `at` the way console lines are stamped.
pub fn console_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("[{}]", at.format(TIMESTAMP_FORMAT))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, embedding).
pub fn init(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let ansi = std::env::var_os("NO_COLOR").is_none();

    console_subscriber(filter, std::io::stdout, ansi)
        .try_init()
        .is_ok()
}

/// Console subscriber writing to `writer`: timestamp, message, fields.
pub fn console_subscriber<W>(
    filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ConsoleTime)
        .with_level(false)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}
