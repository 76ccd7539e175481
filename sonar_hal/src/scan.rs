//! 360° scan: step, measure, repeat.
//!
//! A [`ScanPlan`] partitions one rotation into groups of `stride` steps.
//! [`ScanController::run_scan`] takes one measurement at the start of each
//! group, then advances the group's steps clockwise at the fast scan delay.

use crate::motor_lock::MotorLease;
use crate::rangefinder::PulseRangefinder;
use crate::stepper::StepSequencer;
use parking_lot::Mutex;
use sonar_common::hal::driver::HalError;
use sonar_common::hal::types::Direction;
use sonar_common::scan::{Measurement, ScanResult, ScanSample};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// One sampling group of a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanGroup {
    /// Group number, from 0.
    pub index: usize,
    /// Steps taken before this group's measurement.
    pub steps_so_far: u32,
    /// Angle of the measurement, in [0, 360).
    pub angle_deg: f64,
    /// Steps to advance after the measurement.
    pub advance: u32,
}

/// Partition of one rotation into sampling groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    steps_per_rotation: u32,
    stride: u32,
}

impl ScanPlan {
    /// Plan sampling every `stride` steps. A zero stride is treated as 1.
    pub fn new(steps_per_rotation: u32, stride: u32) -> Self {
        Self {
            steps_per_rotation,
            stride: stride.max(1),
        }
    }

    /// Number of groups (and at most of samples) in one rotation.
    pub fn group_count(&self) -> usize {
        self.steps_per_rotation.div_ceil(self.stride) as usize
    }

    /// Groups in sampling order. The last one is short when `stride` does
    /// not divide the rotation.
    pub fn groups(&self) -> impl Iterator<Item = ScanGroup> + '_ {
        let spr = self.steps_per_rotation;
        (0..self.group_count()).map(move |index| {
            let steps_so_far = index as u32 * self.stride;
            ScanGroup {
                index,
                steps_so_far,
                angle_deg: steps_so_far as f64 / spr as f64 * 360.0,
                advance: self.stride.min(spr - steps_so_far),
            }
        })
    }
}

/// Progress of a running scan, reported after each measurement.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    /// Group just measured.
    pub group: ScanGroup,
    /// Total groups in the scan.
    pub group_count: usize,
    /// The reading for this group.
    pub measurement: Measurement,
    /// Valid samples so far.
    pub samples: usize,
}

/// Runs scans and keeps the latest result.
pub struct ScanController {
    sequencer: Arc<StepSequencer>,
    rangefinder: Arc<PulseRangefinder>,
    plan: ScanPlan,
    scan_step_delay: Duration,
    last: Mutex<ScanResult>,
}

impl ScanController {
    /// Create a controller scanning with `stride` at `scan_step_delay`.
    pub fn new(
        sequencer: Arc<StepSequencer>,
        rangefinder: Arc<PulseRangefinder>,
        stride: u32,
        scan_step_delay: Duration,
    ) -> Self {
        let plan = ScanPlan::new(sequencer.steps_per_rotation(), stride);
        Self {
            sequencer,
            rangefinder,
            plan,
            scan_step_delay,
            last: Mutex::new(ScanResult::default()),
        }
    }

    /// Sampling plan used by `run_scan`.
    pub fn plan(&self) -> ScanPlan {
        self.plan
    }

    /// Copy of the most recent result (empty before the first scan).
    pub fn last_result(&self) -> ScanResult {
        self.last.lock().clone()
    }

    /// Sweep one rotation clockwise, sampling once per group.
    ///
    /// Clears the previous result first. A stop request ends the scan
    /// within one step; the partial result is kept with `completed = false`.
    /// The coils are de-energized and the configured step delay restored
    /// on every exit path. The rotation count is not touched.
    pub fn run_scan(
        &self,
        lease: &MotorLease,
        mut on_progress: impl FnMut(&ScanProgress),
    ) -> Result<ScanResult, HalError> {
        *self.last.lock() = ScanResult::default();
        if self.rangefinder.ensure_enabled() {
            debug!("Sensor enabled for scan");
        }

        info!(
            "Scan started: {} groups of {} steps",
            self.plan.group_count(),
            self.plan.stride
        );
        let started = Instant::now();
        let mut result = ScanResult::default();

        let outcome = {
            let _fast = self
                .sequencer
                .override_step_delay(lease, self.scan_step_delay);
            self.sweep(lease, &mut result, &mut on_progress)
        };
        let released = self.sequencer.de_energize();

        *self.last.lock() = result.clone();
        outcome?;
        released?;

        info!(
            "Scan {}: {} points from {} groups in {:?}",
            if result.completed { "complete" } else { "stopped" },
            result.len(),
            result.groups_evaluated,
            started.elapsed()
        );
        Ok(result)
    }

    fn sweep(
        &self,
        lease: &MotorLease,
        result: &mut ScanResult,
        on_progress: &mut impl FnMut(&ScanProgress),
    ) -> Result<(), HalError> {
        let group_count = self.plan.group_count();

        for group in self.plan.groups() {
            if lease.stop_requested() {
                return Ok(());
            }

            let measurement = self.rangefinder.measure()?;
            result.groups_evaluated += 1;
            if let Some(distance_cm) = measurement.distance() {
                result.samples.push(ScanSample {
                    distance_cm,
                    angle_deg: group.angle_deg,
                });
            }
            trace!("Group {} at {:.2}°: {}", group.index, group.angle_deg, measurement);
            on_progress(&ScanProgress {
                group,
                group_count,
                measurement,
                samples: result.len(),
            });

            for _ in 0..group.advance {
                if lease.stop_requested() {
                    return Ok(());
                }
                self.sequencer.advance(lease, Direction::Clockwise)?;
            }
        }

        result.completed = true;
        Ok(())
    }
}
