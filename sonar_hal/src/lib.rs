//! # Sonar HAL Library
//!
//! Rotational ultrasonic scanner: a half-stepped unipolar stepper turns an
//! HC-SR04 class rangefinder through 360°, and the samples are converted to
//! Cartesian points for rendering.
//!
//! Pin access goes through the `DigitalIo` trait defined in
//! `sonar_common::hal::driver`; backends live in [`drivers`].
//!
//! # Module Structure
//!
//! - [`core`] - ScannerCore command surface and worker threads
//! - [`stepper`] - Half-step sequencer, speed and rotation accounting
//! - [`motor_lock`] - Exclusive motor ownership (`MotorLease`)
//! - [`rangefinder`] - Trigger/echo distance measurement
//! - [`scan`] - Scan plan and controller
//! - [`geometry`] - Polar to Cartesian conversion
//! - [`visualize`] - Rendering boundary
//! - [`status`] - Status events for the UI
//! - [`console`] - Operator commands
//! - [`driver_registry`] / [`drivers`] - Pin backends
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        sonar_hal                                 │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  console    │───►│ ScannerCore  │───►│  status (mpsc)      │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │ MotorLock                           │
//! │           ┌────────────────┼────────────────┐                    │
//! │           ▼                ▼                ▼                    │
//! │   StepSequencer    ScanController    PulseRangefinder            │
//! │           └────────────────┬────────────────┘                    │
//! │                            ▼                                     │
//! │                   ┌────────────────┐                             │
//! │                   │  DigitalIo     │ (simulation | sysfs)        │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod console;
pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod geometry;
pub mod motor_lock;
pub mod rangefinder;
pub mod scan;
pub mod status;
pub mod stepper;
pub mod visualize;

// Re-export key types for convenience
pub use crate::core::ScannerCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::motor_lock::{MotorLease, MotorLock};
pub use crate::rangefinder::PulseRangefinder;
pub use crate::scan::{ScanController, ScanPlan};
pub use crate::status::{ScannerStatus, StatusEvent};
pub use crate::stepper::StepSequencer;
pub use crate::visualize::{JsonVisualizer, Visualizer};
