//! Layered configuration: defaults, TOML file, environment.

use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use ztrigger::actuation::{Mode, MoveStep};
use ztrigger::config::{Pairing, Settings};
use ztrigger::hardware::Direction;
use ztrigger::ZTriggerError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_missing_file_gives_defaults() {
    let settings = Settings::load("/nonexistent/ztrigger.toml").unwrap();
    assert_eq!(settings.run.mode, Mode::OneShotPair);
    assert_eq!(settings.stage.axis, 15);
    assert_eq!(settings.signal.baud_rate, 9600);
    assert_eq!(settings.schedule().total_wait(), Duration::from_secs(45));
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
[run]
mode = "repeating_step"

[step]
size = 0.5
direction = "forward"

[timing]
step_pause_ms = 250
"#,
    );

    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.run.mode, Mode::RepeatingStep);

    let schedule = settings.schedule();
    assert!(matches!(
        schedule.steps[2],
        MoveStep::MoveRelative {
            delta,
            direction: Direction::Forward,
            ..
        } if delta == 0.5
    ));
    assert_eq!(schedule.steps[3], MoveStep::Wait(Duration::from_millis(250)));
    // Untouched sections keep their defaults
    assert_eq!(settings.stage.rest_slot, 1);
}

#[test]
#[serial]
fn test_shipped_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/ztrigger.toml");
    let settings = Settings::load(path).unwrap();
    assert_eq!(settings.stage.pairing, Pairing::Normal);
    assert_eq!(settings.run.mode, Mode::OneShotPair);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config("[run]\nmode = \"one_shot_pair\"\n");

    std::env::set_var("ZTRIGGER_RUN__MODE", "repeating_pair");
    std::env::set_var("ZTRIGGER_TIMING__DWELL_SECS", "1.5");
    let result = Settings::load(file.path());
    std::env::remove_var("ZTRIGGER_RUN__MODE");
    std::env::remove_var("ZTRIGGER_TIMING__DWELL_SECS");

    let settings = result.unwrap();
    assert_eq!(settings.run.mode, Mode::RepeatingPair);
    assert_eq!(
        settings.schedule().steps[0],
        MoveStep::Wait(Duration::from_millis(1500))
    );
}

#[test]
#[serial]
fn test_invalid_values_rejected_on_load() {
    let file = write_config("[stage]\nrest_slot = 2\ntarget_slot = 2\n");
    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, ZTriggerError::Configuration(_)));
    assert!(err.to_string().contains("must differ"));
}

#[test]
#[serial]
fn test_unknown_mode_is_a_parse_error() {
    let file = write_config("[run]\nmode = \"forever\"\n");
    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, ZTriggerError::Config(_)));
}

#[test]
#[serial]
fn test_oversized_dwell_is_rejected_not_zeroed() {
    let file = write_config("[run]\nmode = \"repeating_pair\"\n\n[timing]\ndwell_secs = 1e20\n");
    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, ZTriggerError::Configuration(_)), "got {err:?}");
    assert!(err.to_string().contains("dwell_secs"));
}

#[test]
#[serial]
fn test_overflowing_dwell_plus_gap_is_rejected() {
    let file = write_config("[timing]\ndwell_secs = 1.8e19\ngap_secs = 1.0e19\n");
    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, ZTriggerError::Configuration(_)), "got {err:?}");
}
