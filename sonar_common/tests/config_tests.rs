//! Scanner config loading tests.
//!
//! Tests for `ScannerConfig` loaded through `ConfigLoader`: full file,
//! partial sections, missing file fallback, validation of loaded values.

use sonar_common::config::{ConfigError, ConfigLoader, LogLevel};
use sonar_common::hal::config::{EchoProfile, ScannerConfig};
use sonar_common::hal::driver::HalError;
use std::fs;
use tempfile::TempDir;

/// Write `content` as scanner.toml in a fresh temp dir.
fn write_scanner_toml(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scanner.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn test_full_config_loads() {
    let (_dir, path) = write_scanner_toml(
        r#"
driver = "sysfs"

[shared]
log_level = "debug"
service_name = "bench-scanner"

[pins]
trigger = 5
echo = 6
coils = [17, 18, 27, 22]

[motor]
steps_per_rotation = 2048
step_delay_us = 3000
min_step_delay_us = 800
max_step_delay_us = 50000
speed_increment_us = 500

[sensor]
trigger_pulse_us = 12
echo_timeout_us = 60000
speed_of_sound_cm_per_s = 34000.0
start_enabled = true

[scan]
stride = 16
step_delay_us = 1200

[monitor]
enabled = false
poll_interval_ms = 250

[simulation]
echo_latency_us = 20
max_range_cm = 250.0

[simulation.profile]
kind = "room"
width_cm = 100.0
depth_cm = 100.0
sensor_x_cm = 50.0
sensor_y_cm = 50.0
"#,
    );

    let config = ScannerConfig::load(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.driver, "sysfs");
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "bench-scanner");
    assert_eq!(config.pins.coils, [17, 18, 27, 22]);
    assert_eq!(config.motor.steps_per_rotation, 2048);
    assert_eq!(config.motor.speed_increment_us, 500);
    assert_eq!(config.sensor.echo_timeout_us, 60_000);
    assert!(config.sensor.start_enabled);
    assert_eq!(config.scan.stride, 16);
    assert!(!config.monitor.enabled);
    assert_eq!(config.monitor.poll_interval_ms, 250);
    assert!(matches!(
        config.simulation.profile,
        EchoProfile::Room { width_cm, .. } if width_cm == 100.0
    ));
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let (_dir, path) = write_scanner_toml("[scan]\nstride = 4\n");

    let config = ScannerConfig::load(&path).unwrap();
    assert_eq!(config.scan.stride, 4);
    assert_eq!(config.scan.step_delay_us, 1000);
    assert_eq!(config.motor.steps_per_rotation, 4096);
    assert_eq!(config.pins.trigger, 22);
    assert!(config.monitor.enabled);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ScannerConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.driver, "simulation");
}

#[test]
fn test_syntax_error_reported() {
    let (_dir, path) = write_scanner_toml("[motor\nstep_delay_us = 1");
    assert!(matches!(
        ScannerConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_loaded_config_validation_failure() {
    let (_dir, path) = write_scanner_toml("[motor]\nstep_delay_us = 100\nmin_step_delay_us = 500\n");

    let config = ScannerConfig::load(&path).unwrap();
    assert!(matches!(config.validate(), Err(HalError::ConfigError(_))));
}

#[test]
fn test_shipped_sample_config_matches_defaults() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../sonar_hal/config/scanner.toml");
    let config = ScannerConfig::load(&path).unwrap();
    config.validate().unwrap();

    let defaults = ScannerConfig::default();
    assert_eq!(config.driver, defaults.driver);
    assert_eq!(config.pins.coils, defaults.pins.coils);
    assert_eq!(config.motor.step_delay_us, defaults.motor.step_delay_us);
    assert_eq!(config.sensor.echo_timeout_us, defaults.sensor.echo_timeout_us);
    assert_eq!(config.simulation.profile, defaults.simulation.profile);
}
