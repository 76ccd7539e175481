//! System-wide constants for the sonar workspace.
//!
//! Single source of truth for the hardware defaults. Config sections fall
//! back to these values when a field is omitted.

use static_assertions::const_assert;

/// Number of coil patterns in the half-step sequence.
pub const PHASE_COUNT: usize = 8;

/// Number of coils driven by the sequencer.
pub const COIL_COUNT: usize = 4;

/// Half-steps per output shaft revolution (28BYJ-48 class geared motor).
pub const STEPS_PER_ROTATION: u32 = 4096;

/// Default inter-step delay in microseconds.
pub const STEP_DELAY_US: u64 = 5_000;

/// Step delay floor. The delay must stay strictly above this value.
pub const MIN_STEP_DELAY_US: u64 = 500;

/// Step delay ceiling. Keeps stop latency bounded.
pub const MAX_STEP_DELAY_US: u64 = 100_000;

/// Delay change applied by one faster/slower command.
pub const SPEED_INCREMENT_US: u64 = 1_000;

/// Steps advanced between two scan samples.
pub const SCAN_STRIDE: u32 = 8;

/// Fast inter-step delay used while scanning.
pub const SCAN_STEP_DELAY_US: u64 = 1_000;

/// Trigger pulse width in microseconds.
pub const TRIGGER_PULSE_US: u64 = 10;

/// Timeout for each echo edge wait in microseconds.
pub const ECHO_TIMEOUT_US: u64 = 100_000;

/// Speed of sound in air at ~20 °C.
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34_300.0;

/// Passive distance monitor poll interval.
pub const DISTANCE_POLL_INTERVAL_MS: u64 = 100;

/// Default trigger pin (BCM numbering).
pub const TRIGGER_PIN: u8 = 22;

/// Default echo pin (BCM numbering).
pub const ECHO_PIN: u8 = 27;

/// Default coil pins IN1..IN4 (BCM numbering).
pub const COIL_PINS: [u8; COIL_COUNT] = [24, 25, 8, 7];

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonar/scanner.toml";

/// Canonical service name (used for logging).
pub const SERVICE_NAME: &str = "sonar_hal";

const_assert!(STEPS_PER_ROTATION as usize % PHASE_COUNT == 0);
const_assert!(SCAN_STRIDE <= STEPS_PER_ROTATION);
const_assert!(MIN_STEP_DELAY_US < STEP_DELAY_US && STEP_DELAY_US <= MAX_STEP_DELAY_US);
