//! HAL types shared between the core and the drivers.

use crate::consts::{COIL_COUNT, PHASE_COUNT};
use crate::hal::driver::HalError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Motor rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Clockwise rotation, phase index increments (+1).
    #[default]
    Clockwise,
    /// Counter-clockwise rotation, phase index decrements (-1).
    CounterClockwise,
}

impl Direction {
    /// Signed step increment for this direction.
    #[inline]
    pub const fn sign(self) -> i8 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = HalError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Clockwise),
            -1 => Ok(Direction::CounterClockwise),
            other => Err(HalError::InvalidDirection(other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Clockwise => f.write_str("clockwise"),
            Direction::CounterClockwise => f.write_str("counter-clockwise"),
        }
    }
}

bitflags! {
    /// Energized coils of a unipolar stepper (IN1..IN4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CoilMask: u8 {
        /// Coil A (IN1).
        const A = 0b0001;
        /// Coil B (IN2).
        const B = 0b0010;
        /// Coil C (IN3).
        const C = 0b0100;
        /// Coil D (IN4).
        const D = 0b1000;
    }
}

impl CoilMask {
    /// Output level per coil, IN1 first.
    pub fn levels(self) -> [bool; COIL_COUNT] {
        [
            self.contains(CoilMask::A),
            self.contains(CoilMask::B),
            self.contains(CoilMask::C),
            self.contains(CoilMask::D),
        ]
    }

    /// Build a mask from per-coil levels, IN1 first.
    pub fn from_levels(levels: [bool; COIL_COUNT]) -> Self {
        let mut mask = CoilMask::empty();
        for (idx, &on) in levels.iter().enumerate() {
            if on {
                mask |= CoilMask::from_bits_retain(1 << idx);
            }
        }
        mask
    }

    /// Index of this pattern in the half-step sequence, if it is one.
    pub fn phase_index(self) -> Option<usize> {
        HALF_STEP_SEQUENCE.iter().position(|&p| p == self)
    }
}

/// Half-step sequence: A, AB, B, BC, C, CD, D, DA.
///
/// Consecutive entries differ by exactly one coil.
pub const HALF_STEP_SEQUENCE: [CoilMask; PHASE_COUNT] = [
    CoilMask::A,
    CoilMask::A.union(CoilMask::B),
    CoilMask::B,
    CoilMask::B.union(CoilMask::C),
    CoilMask::C,
    CoilMask::C.union(CoilMask::D),
    CoilMask::D,
    CoilMask::D.union(CoilMask::A),
];

/// Operation holding exclusive control of the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorOwner {
    /// Free-running rotation started by `start`.
    Continuous,
    /// One-rotation nudge.
    FixedRotation,
    /// 360° scan.
    Scan,
}

impl fmt::Display for MotorOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorOwner::Continuous => f.write_str("continuous run"),
            MotorOwner::FixedRotation => f.write_str("rotation nudge"),
            MotorOwner::Scan => f.write_str("scan"),
        }
    }
}
