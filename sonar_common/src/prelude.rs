//! Prelude module for common re-exports.
//!
//! ```rust
//! use sonar_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{
    EchoProfile, MonitorConfig, MotorConfig, PinConfig, ScanConfig, ScannerConfig, SensorConfig,
    SimulationConfig,
};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{DigitalIo, DriverFactory, HalError, PinId};
pub use crate::hal::types::{CoilMask, Direction, HALF_STEP_SEQUENCE, MotorOwner};

// ─── Scan data ──────────────────────────────────────────────────────
pub use crate::scan::{CartesianPoint, Measurement, ScanResult, ScanSample};
