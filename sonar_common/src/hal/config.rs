//! Scanner configuration types.
//!
//! This module contains the configuration loaded from `scanner.toml`:
//! - `ScannerConfig` - Top-level configuration
//! - `PinConfig` - Trigger, echo and coil pin assignment
//! - `MotorConfig` / `SensorConfig` / `ScanConfig` / `MonitorConfig`
//! - `SimulationConfig` / `EchoProfile` - Simulation driver environment
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::config::SharedConfig;
use crate::consts::{
    COIL_COUNT, COIL_PINS, DISTANCE_POLL_INTERVAL_MS, ECHO_PIN, ECHO_TIMEOUT_US,
    MAX_STEP_DELAY_US, MIN_STEP_DELAY_US, PHASE_COUNT, SCAN_STEP_DELAY_US, SCAN_STRIDE,
    SPEED_INCREMENT_US, SPEED_OF_SOUND_CM_PER_S, STEPS_PER_ROTATION, STEP_DELAY_US,
    TRIGGER_PIN, TRIGGER_PULSE_US,
};
use crate::hal::driver::{HalError, PinId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_driver() -> String {
    "simulation".to_string()
}

fn default_true() -> bool {
    true
}

/// Main configuration loaded from `scanner.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Pin backend to load (e.g., "simulation", "sysfs").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Logging and instance naming.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Pin assignment.
    #[serde(default)]
    pub pins: PinConfig,

    /// Stepper timing.
    #[serde(default)]
    pub motor: MotorConfig,

    /// Rangefinder timing.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Scan sampling.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Passive distance monitor.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Environment used by the simulation driver.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            shared: SharedConfig::default(),
            pins: PinConfig::default(),
            motor: MotorConfig::default(),
            sensor: SensorConfig::default(),
            scan: ScanConfig::default(),
            monitor: MonitorConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Validate the scanner configuration.
    ///
    /// # Validation Rules
    /// 1. All six pins distinct
    /// 2. `steps_per_rotation` > 0 and a multiple of the phase count
    /// 3. `min_step_delay_us` > 0 and `min < step_delay <= max`
    /// 4. `speed_increment_us` > 0
    /// 5. `0 < stride <= steps_per_rotation`, scan delay > 0
    /// 6. Positive speed of sound, non-zero pulse and timeout
    /// 7. Non-zero monitor poll interval
    pub fn validate(&self) -> Result<(), HalError> {
        self.shared.validate()?;
        self.pins.validate()?;
        self.motor.validate()?;
        self.sensor.validate()?;

        if self.scan.stride == 0 || self.scan.stride > self.motor.steps_per_rotation {
            return Err(HalError::ConfigError(format!(
                "scan.stride must be in 1..={} (got {})",
                self.motor.steps_per_rotation, self.scan.stride
            )));
        }
        if self.scan.step_delay_us == 0 {
            return Err(HalError::ConfigError(
                "scan.step_delay_us must be greater than 0".to_string(),
            ));
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(HalError::ConfigError(
                "monitor.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.simulation.max_range_cm <= 0.0 {
            return Err(HalError::ConfigError(
                "simulation.max_range_cm must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Pin assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Rangefinder trigger output.
    #[serde(default = "default_trigger_pin")]
    pub trigger: PinId,

    /// Rangefinder echo input.
    #[serde(default = "default_echo_pin")]
    pub echo: PinId,

    /// Coil outputs IN1..IN4, in half-step table order.
    #[serde(default = "default_coil_pins")]
    pub coils: [PinId; COIL_COUNT],
}

fn default_trigger_pin() -> PinId {
    TRIGGER_PIN
}

fn default_echo_pin() -> PinId {
    ECHO_PIN
}

fn default_coil_pins() -> [PinId; COIL_COUNT] {
    COIL_PINS
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            trigger: TRIGGER_PIN,
            echo: ECHO_PIN,
            coils: COIL_PINS,
        }
    }
}

impl PinConfig {
    fn validate(&self) -> Result<(), HalError> {
        let mut seen = std::collections::HashSet::new();
        for pin in self.coils.iter().chain([&self.trigger, &self.echo]) {
            if !seen.insert(*pin) {
                return Err(HalError::ConfigError(format!("Duplicate pin: {}", pin)));
            }
        }
        Ok(())
    }
}

/// Stepper timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    /// Half-steps per output shaft revolution.
    #[serde(default = "default_steps_per_rotation")]
    pub steps_per_rotation: u32,

    /// Initial inter-step delay.
    #[serde(default = "default_step_delay_us")]
    pub step_delay_us: u64,

    /// Floor; the delay always stays strictly above it.
    #[serde(default = "default_min_step_delay_us")]
    pub min_step_delay_us: u64,

    /// Ceiling for slower commands.
    #[serde(default = "default_max_step_delay_us")]
    pub max_step_delay_us: u64,

    /// Magnitude of one faster/slower adjustment.
    #[serde(default = "default_speed_increment_us")]
    pub speed_increment_us: u64,
}

fn default_steps_per_rotation() -> u32 {
    STEPS_PER_ROTATION
}

fn default_step_delay_us() -> u64 {
    STEP_DELAY_US
}

fn default_min_step_delay_us() -> u64 {
    MIN_STEP_DELAY_US
}

fn default_max_step_delay_us() -> u64 {
    MAX_STEP_DELAY_US
}

fn default_speed_increment_us() -> u64 {
    SPEED_INCREMENT_US
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            steps_per_rotation: STEPS_PER_ROTATION,
            step_delay_us: STEP_DELAY_US,
            min_step_delay_us: MIN_STEP_DELAY_US,
            max_step_delay_us: MAX_STEP_DELAY_US,
            speed_increment_us: SPEED_INCREMENT_US,
        }
    }
}

impl MotorConfig {
    fn validate(&self) -> Result<(), HalError> {
        if self.steps_per_rotation == 0 || self.steps_per_rotation as usize % PHASE_COUNT != 0 {
            return Err(HalError::ConfigError(format!(
                "motor.steps_per_rotation must be a positive multiple of {} (got {})",
                PHASE_COUNT, self.steps_per_rotation
            )));
        }
        if self.min_step_delay_us == 0 {
            return Err(HalError::ConfigError(
                "motor.min_step_delay_us must be greater than 0".to_string(),
            ));
        }
        if self.step_delay_us <= self.min_step_delay_us
            || self.step_delay_us > self.max_step_delay_us
        {
            return Err(HalError::ConfigError(format!(
                "motor.step_delay_us must be in ({}, {}] (got {})",
                self.min_step_delay_us, self.max_step_delay_us, self.step_delay_us
            )));
        }
        if self.speed_increment_us == 0 {
            return Err(HalError::ConfigError(
                "motor.speed_increment_us must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rangefinder timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Trigger pulse width.
    #[serde(default = "default_trigger_pulse_us")]
    pub trigger_pulse_us: u64,

    /// Timeout for each echo edge wait.
    #[serde(default = "default_echo_timeout_us")]
    pub echo_timeout_us: u64,

    /// Speed of sound used for the round-trip conversion.
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound_cm_per_s: f64,

    /// Sensor state at startup.
    #[serde(default)]
    pub start_enabled: bool,
}

fn default_trigger_pulse_us() -> u64 {
    TRIGGER_PULSE_US
}

fn default_echo_timeout_us() -> u64 {
    ECHO_TIMEOUT_US
}

fn default_speed_of_sound() -> f64 {
    SPEED_OF_SOUND_CM_PER_S
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_pulse_us: TRIGGER_PULSE_US,
            echo_timeout_us: ECHO_TIMEOUT_US,
            speed_of_sound_cm_per_s: SPEED_OF_SOUND_CM_PER_S,
            start_enabled: false,
        }
    }
}

impl SensorConfig {
    fn validate(&self) -> Result<(), HalError> {
        if self.trigger_pulse_us == 0 || self.echo_timeout_us == 0 {
            return Err(HalError::ConfigError(
                "sensor.trigger_pulse_us and sensor.echo_timeout_us must be greater than 0"
                    .to_string(),
            ));
        }
        if !(self.speed_of_sound_cm_per_s > 0.0) {
            return Err(HalError::ConfigError(format!(
                "sensor.speed_of_sound_cm_per_s must be positive (got {})",
                self.speed_of_sound_cm_per_s
            )));
        }
        Ok(())
    }

    /// Echo edge timeout as Duration.
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_micros(self.echo_timeout_us)
    }

    /// Trigger pulse width as Duration.
    pub fn trigger_pulse(&self) -> Duration {
        Duration::from_micros(self.trigger_pulse_us)
    }
}

/// Scan sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Steps between two samples.
    #[serde(default = "default_scan_stride")]
    pub stride: u32,

    /// Fast inter-step delay used for the duration of a scan.
    #[serde(default = "default_scan_step_delay_us")]
    pub step_delay_us: u64,
}

fn default_scan_stride() -> u32 {
    SCAN_STRIDE
}

fn default_scan_step_delay_us() -> u64 {
    SCAN_STEP_DELAY_US
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            stride: SCAN_STRIDE,
            step_delay_us: SCAN_STEP_DELAY_US,
        }
    }
}

/// Passive distance monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Run the monitor thread.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between two readings.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DISTANCE_POLL_INTERVAL_MS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: DISTANCE_POLL_INTERVAL_MS,
        }
    }
}

/// Environment answered by the simulation driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Delay between trigger falling edge and echo rising edge.
    #[serde(default = "default_echo_latency_us")]
    pub echo_latency_us: u64,

    /// Obstacles beyond this distance produce no echo.
    #[serde(default = "default_max_range_cm")]
    pub max_range_cm: f64,

    /// What the echo line reports.
    #[serde(default)]
    pub profile: EchoProfile,
}

fn default_echo_latency_us() -> u64 {
    50
}

fn default_max_range_cm() -> f64 {
    400.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            echo_latency_us: default_echo_latency_us(),
            max_range_cm: default_max_range_cm(),
            profile: EchoProfile::default(),
        }
    }
}

/// Echo behaviour of the simulated rangefinder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EchoProfile {
    /// Sensor inside an axis-aligned rectangular room.
    Room {
        /// Room extent along x.
        width_cm: f64,
        /// Room extent along y.
        depth_cm: f64,
        /// Sensor x position (0 = left wall).
        sensor_x_cm: f64,
        /// Sensor y position (0 = bottom wall).
        sensor_y_cm: f64,
    },
    /// Same obstacle distance at every angle.
    Constant {
        /// Obstacle distance.
        distance_cm: f64,
    },
    /// Echo line never rises.
    Silent,
    /// Echo line never falls.
    StuckHigh,
}

impl Default for EchoProfile {
    fn default() -> Self {
        EchoProfile::Room {
            width_cm: 300.0,
            depth_cm: 200.0,
            sensor_x_cm: 120.0,
            sensor_y_cm: 80.0,
        }
    }
}
