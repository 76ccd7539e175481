//! Digital I/O trait and error types.
//!
//! This module defines:
//! - `DigitalIo` trait - Interface for pluggable pin backends
//! - `HalError` enum - Error types for HAL operations
//! - `DriverFactory` type alias - Factory function type

use crate::hal::config::ScannerConfig;
use crate::hal::types::MotorOwner;
use std::sync::Arc;
use thiserror::Error;

/// Pin identifier (BCM numbering on Raspberry Pi class boards).
pub type PinId = u8;

/// Error types for HAL operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pin access failed
    #[error("GPIO {pin} error: {reason}")]
    Gpio {
        /// Pin that failed.
        pin: PinId,
        /// Backend-specific reason.
        reason: String,
    },

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Motor already driven by another operation
    #[error("Motor busy: held by {held_by}")]
    MotorBusy {
        /// Operation currently holding the motor.
        held_by: MotorOwner,
    },

    /// Direction value outside {+1, -1}
    #[error("Invalid direction {0} (expected +1 or -1)")]
    InvalidDirection(i8),

    /// Worker thread could not be started
    #[error("Failed to spawn worker {name}: {reason}")]
    WorkerSpawn {
        /// Thread name.
        name: String,
        /// OS error text.
        reason: String,
    },
}

impl From<crate::config::ConfigError> for HalError {
    fn from(e: crate::config::ConfigError) -> Self {
        HalError::ConfigError(e.to_string())
    }
}

/// Factory function type for creating pin backends.
pub type DriverFactory = fn(&ScannerConfig) -> Result<Arc<dyn DigitalIo>, HalError>;

/// Trait defining the digital pin primitive the scanner core drives.
///
/// Methods take `&self` because the same backend is shared between the
/// stepping thread, the distance monitor and scan workers. Implementations
/// synchronize internally.
///
/// # Timing Contracts
///
/// | Operation | Expected latency |
/// |-----------|------------------|
/// | `write()` | microseconds |
/// | `read()` | microseconds |
/// | `configure_*()` | unbounded (setup only) |
///
/// Callers must not rely on call counts for timing; timeouts are computed
/// from the monotonic clock.
pub trait DigitalIo: Send + Sync {
    /// Returns the backend's identifier (e.g., "simulation", "sysfs").
    fn name(&self) -> &'static str;

    /// Configure a pin as output, driven low.
    fn configure_output(&self, pin: PinId) -> Result<(), HalError>;

    /// Configure a pin as input.
    fn configure_input(&self, pin: PinId) -> Result<(), HalError>;

    /// Drive an output pin.
    fn write(&self, pin: PinId, level: bool) -> Result<(), HalError>;

    /// Sample an input pin.
    fn read(&self, pin: PinId) -> Result<bool, HalError>;

    /// Release all configured pins.
    ///
    /// Default implementation does nothing (for backends without
    /// exported state).
    fn release(&self) -> Result<(), HalError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_error_display() {
        let err = HalError::Gpio {
            pin: 22,
            reason: "permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "GPIO 22 error: permission denied");

        let err = HalError::MotorBusy {
            held_by: MotorOwner::Scan,
        };
        assert!(err.to_string().contains("scan"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: HalError = crate::config::ConfigError::FileNotFound.into();
        assert!(matches!(err, HalError::ConfigError(_)));
    }
}
