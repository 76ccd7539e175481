//! Simulation driver module.
//!
//! Software pin backend with a virtual stepper and rangefinder, for
//! development and testing without hardware.

mod gpio;
mod room;

pub use gpio::SimulatedGpio;

use sonar_common::hal::config::ScannerConfig;
use sonar_common::hal::driver::{DigitalIo, HalError};
use std::sync::Arc;

/// Factory function to create a simulation backend.
pub fn create_driver(config: &ScannerConfig) -> Result<Arc<dyn DigitalIo>, HalError> {
    Ok(Arc::new(SimulatedGpio::new(config)))
}
