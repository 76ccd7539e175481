//! Measurement and scan data model.
//!
//! - `Measurement` - One rangefinder reading, possibly invalid
//! - `ScanSample` - A valid reading tagged with its angle
//! - `ScanResult` - Ordered samples of one scan
//! - `CartesianPoint` - Derived point for rendering

use serde::{Deserialize, Serialize};
use std::fmt;

/// One rangefinder reading.
///
/// Invalid when the echo timed out or the sensor is disabled; the distance
/// of an invalid reading is meaningless and reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Distance in centimetres, full precision.
    pub distance_cm: f64,
    /// Whether an echo was observed.
    pub valid: bool,
}

impl Measurement {
    /// A reading with an observed echo.
    pub const fn valid(distance_cm: f64) -> Self {
        Self {
            distance_cm,
            valid: true,
        }
    }

    /// No echo / sensor off.
    pub const fn invalid() -> Self {
        Self {
            distance_cm: 0.0,
            valid: false,
        }
    }

    /// Distance if the reading is valid.
    #[inline]
    pub fn distance(&self) -> Option<f64> {
        self.valid.then_some(self.distance_cm)
    }
}

impl fmt::Display for Measurement {
    /// Rounded to two decimals for display; "--" when invalid.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.distance() {
            Some(d) => write!(f, "{:.2} cm", d),
            None => f.write_str("-- cm"),
        }
    }
}

/// A valid reading tagged with the shaft angle it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    /// Distance in centimetres.
    pub distance_cm: f64,
    /// Angle in degrees, in [0, 360).
    pub angle_deg: f64,
}

/// Ordered samples of one scan.
///
/// Insertion order is angular sampling order; renderers close the outline
/// by reconnecting the last sample to the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Valid samples in angular order.
    pub samples: Vec<ScanSample>,
    /// Sampling groups evaluated, including those without an echo.
    pub groups_evaluated: usize,
    /// False when the scan was stopped before a full rotation.
    pub completed: bool,
}

impl ScanResult {
    /// Number of valid samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no valid sample was collected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Derived point for rendering, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPoint {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}
