//! Run configuration using Figment
//!
//! Settings are merged from, lowest to highest precedence:
//! 1. built-in defaults (the timings characterized on the rig)
//! 2. a TOML file (optional, `config/ztrigger.toml` by default)
//! 3. environment variables prefixed with `ZTRIGGER_`, sections split on `__`
//!
//! ```text
//! ZTRIGGER_RUN__MODE=repeating_step
//! ZTRIGGER_SIGNAL__PORT=/dev/ttyACM1
//! ZTRIGGER_TIMING__DWELL_SECS=12.5
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::actuation::{Mode, RepeatPolicy, Schedule};
use crate::error::{AppResult, ZTriggerError};
use crate::hardware::{Direction, Speed};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/ztrigger.toml";

/// Top-level run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Trigger input
    pub signal: SignalConfig,
    /// Stage addressing
    pub stage: StageConfig,
    /// Operating mode
    pub run: RunConfig,
    /// Settle delays
    pub timing: TimingConfig,
    /// Relative step parameters (Z stack)
    pub step: StepConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Trigger input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Serial port of the pulse controller (e.g., "/dev/ttyACM0", "COM4")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Byte value that means "move now"
    pub trigger_marker: u8,
    /// Pulse period of the simulated trigger line
    pub simulate_period_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            trigger_marker: 0x01,
            simulate_period_ms: 60_000,
        }
    }
}

/// Which stored slot is home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    /// Rest at `rest_slot`, visit `target_slot`
    Normal,
    /// Swap the two slots
    Reverse,
}

/// Stage addressing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Controller axis number of the Z drive
    pub axis: u8,
    /// Stored-position slot the stage rests on between triggers
    pub rest_slot: u8,
    /// Stored-position slot visited on each trigger
    pub target_slot: u8,
    /// Normal or reversed slot roles
    pub pairing: Pairing,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            axis: 15,
            rest_slot: 1,
            target_slot: 2,
            pairing: Pairing::Normal,
        }
    }
}

/// Operating mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// One-shot pair, repeating pair, or repeating step
    pub mode: Mode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::OneShotPair,
        }
    }
}

/// Settle delays, all wall-clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after a trigger before leaving the rest slot
    pub dwell_secs: f64,
    /// Extra time spent on the target slot on top of `dwell_secs`
    pub gap_secs: f64,
    /// Delay between position query and relative move
    pub step_settle_ms: u64,
    /// Wait after a relative move before re-arming
    pub step_pause_ms: u64,
    /// Delay after the start-up position query in step mode
    pub startup_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            dwell_secs: 20.0,
            gap_secs: 5.0,
            step_settle_ms: 10,
            step_pause_ms: 900,
            startup_settle_ms: 500,
        }
    }
}

/// Relative step parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Step magnitude in position units (µm on the Z drive)
    pub size: f64,
    /// Travel direction
    pub direction: Direction,
    /// Speed profile
    pub speed: Speed,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            size: 2.0,
            direction: Direction::Reverse,
            speed: Speed::Fast,
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment. A missing file is not an error.
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment value cannot be
    /// parsed, or if validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ZTRIGGER_").split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns `ZTriggerError::Configuration` describing the first violation.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.stage.axis == 0 {
            return Err(invalid("Stage axis must be >= 1".to_string()));
        }

        if self.run.mode.is_pair_move() {
            if self.stage.rest_slot == 0 || self.stage.target_slot == 0 {
                return Err(invalid("Stored position slots must be >= 1".to_string()));
            }
            if self.stage.rest_slot == self.stage.target_slot {
                return Err(invalid(format!(
                    "rest_slot and target_slot must differ (both {})",
                    self.stage.rest_slot
                )));
            }
            let dwell = positive_secs("dwell_secs", self.timing.dwell_secs)?;
            if !self.timing.gap_secs.is_finite() || self.timing.gap_secs < 0.0 {
                return Err(invalid(format!(
                    "gap_secs must be >= 0, got {}",
                    self.timing.gap_secs
                )));
            }
            let gap = duration("gap_secs", self.timing.gap_secs)?;
            if dwell.checked_add(gap).is_none() {
                return Err(invalid(format!(
                    "dwell_secs + gap_secs is too long ({} + {})",
                    self.timing.dwell_secs, self.timing.gap_secs
                )));
            }
        } else if !self.step.size.is_finite() || self.step.size <= 0.0 {
            return Err(invalid(format!(
                "Step size must be a positive number, got {}",
                self.step.size
            )));
        }

        if self.signal.baud_rate == 0 {
            return Err(invalid("Signal baud_rate must be > 0".to_string()));
        }
        if self.signal.simulate_period_ms == 0 {
            return Err(invalid("simulate_period_ms must be > 0".to_string()));
        }

        Ok(())
    }

    /// Rest and target slots after applying `pairing`.
    pub fn slots(&self) -> (u8, u8) {
        match self.stage.pairing {
            Pairing::Normal => (self.stage.rest_slot, self.stage.target_slot),
            Pairing::Reverse => (self.stage.target_slot, self.stage.rest_slot),
        }
    }

    /// Move schedule for the configured mode.
    pub fn schedule(&self) -> Schedule {
        let axis = self.stage.axis;
        if self.run.mode.is_pair_move() {
            let (rest, target) = self.slots();
            Schedule::pair_move(
                axis,
                rest,
                target,
                secs(self.timing.dwell_secs),
                secs(self.timing.gap_secs),
            )
        } else {
            Schedule::relative_step(
                axis,
                self.step.size,
                self.step.direction,
                self.step.speed,
                Duration::from_millis(self.timing.step_settle_ms),
                Duration::from_millis(self.timing.step_pause_ms),
            )
        }
    }

    /// Loop or stop after a cycle.
    pub fn repeat_policy(&self) -> RepeatPolicy {
        self.run.mode.repeat_policy()
    }

    /// Delay after the start-up position query in step mode.
    pub fn startup_settle(&self) -> Duration {
        Duration::from_millis(self.timing.startup_settle_ms)
    }

    /// Render as TOML (used by `ztrigger check`).
    ///
    /// # Errors
    ///
    /// Fails only if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn invalid(msg: String) -> ZTriggerError {
    ZTriggerError::Configuration(msg)
}

fn positive_secs(name: &str, value: f64) -> AppResult<Duration> {
    if value.is_finite() && value > 0.0 {
        duration(name, value)
    } else {
        Err(invalid(format!("{} must be > 0, got {}", name, value)))
    }
}

fn duration(name: &str, value: f64) -> AppResult<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|err| invalid(format!("{} = {} is not a usable duration: {}", name, value, err)))
}

// Only reached after `validate`, which rejects anything `duration` refuses.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::MoveStep;

    #[test]
    fn test_defaults_match_rig() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.stage.axis, 15);
        assert_eq!(settings.signal.trigger_marker, 0x01);
        assert_eq!(settings.signal.baud_rate, 9600);
        assert_eq!(settings.run.mode, Mode::OneShotPair);
        assert_eq!(settings.timing.dwell_secs, 20.0);
        assert_eq!(settings.timing.gap_secs, 5.0);
        assert_eq!(settings.step.size, 2.0);
    }

    #[test]
    fn test_reverse_pairing_swaps_slots() {
        let mut settings = Settings::default();
        assert_eq!(settings.slots(), (1, 2));

        settings.stage.pairing = Pairing::Reverse;
        assert_eq!(settings.slots(), (2, 1));

        let schedule = settings.schedule();
        assert_eq!(schedule.steps[1], MoveStep::ApproachStored { slot: 1 });
        assert_eq!(schedule.steps[3], MoveStep::ApproachStored { slot: 2 });
    }

    #[test]
    fn test_step_mode_schedule() {
        let mut settings = Settings::default();
        settings.run.mode = Mode::RepeatingStep;
        let schedule = settings.schedule();
        assert_eq!(schedule.axis, 15);
        assert_eq!(schedule.steps[0], MoveStep::QueryPosition);
        assert_eq!(
            schedule.steps[3],
            MoveStep::Wait(Duration::from_millis(900))
        );
        assert_eq!(settings.repeat_policy(), RepeatPolicy::Repeating);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.stage.axis = 0;
        assert!(matches!(
            settings.validate(),
            Err(ZTriggerError::Configuration(_))
        ));

        let mut settings = Settings::default();
        settings.stage.target_slot = settings.stage.rest_slot;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.timing.dwell_secs = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.run.mode = Mode::RepeatingStep;
        settings.step.size = -2.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.application.log_level = "verbose".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_step_mode_ignores_slot_settings() {
        let mut settings = Settings::default();
        settings.run.mode = Mode::RepeatingStep;
        settings.stage.target_slot = settings.stage.rest_slot;
        settings.validate().unwrap();
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = Settings::default().to_toml().unwrap();
        assert!(text.contains("mode = \"one_shot_pair\""));
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_validation_rejects_unrepresentable_waits() {
        let mut settings = Settings::default();
        settings.run.mode = Mode::RepeatingPair;
        settings.timing.dwell_secs = 1e20;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ZTriggerError::Configuration(_)));
        assert!(err.to_string().contains("dwell_secs"));

        let mut settings = Settings::default();
        settings.timing.gap_secs = 1e20;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_overflowing_dwell_plus_gap() {
        let mut settings = Settings::default();
        settings.timing.dwell_secs = 1.8e19;
        settings.timing.gap_secs = 1.0e19;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("too long"), "got {err}");
    }
}
