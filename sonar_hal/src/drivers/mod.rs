//! Pin backend implementations.
//!
//! - [`simulation`] - Software GPIO with a virtual stepper and rangefinder
//! - [`sysfs`] - Linux `/sys/class/gpio` backend
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `DigitalIo` trait from `sonar_common::hal::driver`
//! 3. Register its factory in [`register_all_drivers`]

pub mod simulation;
pub mod sysfs;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
    registry.register("sysfs", sysfs::create_driver);
}
