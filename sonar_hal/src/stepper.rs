//! Half-step sequencer for a 4-coil unipolar stepper.
//!
//! `StepSequencer` owns the motor state (phase index, direction, step
//! delay, rotation count) and drives the coil outputs through
//! [`HALF_STEP_SEQUENCE`]. Positioning is open loop: the rotation count is
//! derived from step counting only.
//!
//! State is stored in atomics so status queries and speed/direction
//! commands never wait on a running loop. Phase advances require a
//! [`MotorLease`].

use crate::motor_lock::{MotorLease, MotorLock};
use sonar_common::consts::{COIL_COUNT, PHASE_COUNT};
use sonar_common::hal::config::{MotorConfig, PinConfig};
use sonar_common::hal::driver::{DigitalIo, HalError, PinId};
use sonar_common::hal::types::{Direction, HALF_STEP_SEQUENCE, MotorOwner};
use std::sync::Arc;
use std::sync::atomic::{AtomicI8, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Steps completed in the current run, for rotation accounting.
#[derive(Debug, Default)]
pub struct StepRun {
    steps: u64,
}

impl StepRun {
    /// Steps taken so far in this run.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Drives the coils and tracks open-loop motor state.
pub struct StepSequencer {
    io: Arc<dyn DigitalIo>,
    coil_pins: [PinId; COIL_COUNT],
    steps_per_rotation: u32,
    lock: Arc<MotorLock>,
    /// Index into `HALF_STEP_SEQUENCE` of the next pattern to write.
    phase: AtomicUsize,
    /// Live direction for continuous runs (+1 / -1).
    direction: AtomicI8,
    /// User-configured inter-step delay.
    step_delay_us: AtomicU64,
    /// Temporary delay while scanning; 0 = none.
    delay_override_us: AtomicU64,
    min_step_delay_us: u64,
    max_step_delay_us: u64,
    speed_increment_us: u64,
    rotation_count: AtomicI64,
}

impl StepSequencer {
    /// Create a sequencer driving `pins.coils` through `io`.
    ///
    /// # Errors
    /// Returns `ConfigError` if `motor.steps_per_rotation` is zero.
    pub fn new(
        io: Arc<dyn DigitalIo>,
        pins: &PinConfig,
        motor: &MotorConfig,
    ) -> Result<Self, HalError> {
        if motor.steps_per_rotation == 0 {
            return Err(HalError::ConfigError(
                "motor.steps_per_rotation must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            io,
            coil_pins: pins.coils,
            steps_per_rotation: motor.steps_per_rotation,
            lock: MotorLock::new(),
            phase: AtomicUsize::new(0),
            direction: AtomicI8::new(Direction::Clockwise.sign()),
            step_delay_us: AtomicU64::new(motor.step_delay_us),
            delay_override_us: AtomicU64::new(0),
            min_step_delay_us: motor.min_step_delay_us,
            max_step_delay_us: motor.max_step_delay_us,
            speed_increment_us: motor.speed_increment_us,
            rotation_count: AtomicI64::new(0),
        })
    }

    /// Configure the coil pins as outputs and leave them low.
    pub fn configure(&self) -> Result<(), HalError> {
        for &pin in &self.coil_pins {
            self.io.configure_output(pin)?;
        }
        self.de_energize()
    }

    /// The motor lock guarding this sequencer.
    pub fn lock(&self) -> &Arc<MotorLock> {
        &self.lock
    }

    /// Take exclusive ownership of the motor.
    pub fn try_acquire(&self, owner: MotorOwner) -> Result<MotorLease, HalError> {
        self.lock.try_acquire(owner)
    }

    /// Index of the next pattern to write, in [0, 8).
    pub fn phase_index(&self) -> usize {
        self.phase.load(Ordering::SeqCst)
    }

    /// Live direction.
    pub fn direction(&self) -> Direction {
        match self.direction.load(Ordering::SeqCst) {
            -1 => Direction::CounterClockwise,
            _ => Direction::Clockwise,
        }
    }

    /// Change the live direction; a running continuous loop picks it up on
    /// its next step.
    pub fn set_direction(&self, direction: Direction) {
        self.direction.store(direction.sign(), Ordering::SeqCst);
        debug!("Direction set to {}", direction);
    }

    /// Whole rotations completed (signed).
    pub fn rotation_count(&self) -> i64 {
        self.rotation_count.load(Ordering::SeqCst)
    }

    /// Steps per output shaft revolution.
    pub fn steps_per_rotation(&self) -> u32 {
        self.steps_per_rotation
    }

    /// Effective inter-step delay (scan override if active).
    pub fn step_delay(&self) -> Duration {
        match self.delay_override_us.load(Ordering::SeqCst) {
            0 => self.configured_step_delay(),
            us => Duration::from_micros(us),
        }
    }

    /// User-configured inter-step delay.
    pub fn configured_step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us.load(Ordering::SeqCst))
    }

    /// Adjust the step delay by `delta_us`, bounded to one speed increment.
    ///
    /// A change that would bring the delay to or below the floor is refused;
    /// increases saturate at the ceiling. Returns the resulting delay.
    pub fn set_speed(&self, delta_us: i64) -> Duration {
        let bound = self.speed_increment_us as i64;
        let delta = delta_us.clamp(-bound, bound);
        let floor = self.min_step_delay_us as i64;
        let ceiling = self.max_step_delay_us;

        let update = self
            .step_delay_us
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let target = current as i64 + delta;
                (target > floor).then(|| (target as u64).min(ceiling))
            });
        if let Err(current) = update {
            debug!(
                "Speed change {:+}us refused: {}us would reach floor {}us",
                delta, current, self.min_step_delay_us
            );
        }

        let delay = self.configured_step_delay();
        debug!("Step delay now {:?}", delay);
        delay
    }

    /// Shorten the step delay by one increment.
    pub fn increase_speed(&self) -> Duration {
        self.set_speed(-(self.speed_increment_us as i64))
    }

    /// Lengthen the step delay by one increment.
    pub fn decrease_speed(&self) -> Duration {
        self.set_speed(self.speed_increment_us as i64)
    }

    /// Use `delay` instead of the configured delay until the guard drops.
    pub fn override_step_delay(&self, lease: &MotorLease, delay: Duration) -> DelayOverride<'_> {
        debug_assert!(lease.belongs_to(&self.lock));
        let us = (delay.as_micros() as u64).max(1);
        self.delay_override_us.store(us, Ordering::SeqCst);
        debug!("Step delay overridden to {}us by {}", us, lease.owner());
        DelayOverride { sequencer: self }
    }

    /// Write the current phase, move the phase index one step, sleep.
    ///
    /// No rotation accounting; see [`StepSequencer::step_once`].
    pub fn advance(&self, lease: &MotorLease, direction: Direction) -> Result<(), HalError> {
        debug_assert!(lease.belongs_to(&self.lock));
        let phase = self.phase.load(Ordering::SeqCst);
        self.write_pattern(phase)?;

        let next = (phase as isize + direction.sign() as isize).rem_euclid(PHASE_COUNT as isize);
        self.phase.store(next as usize, Ordering::SeqCst);
        trace!("Phase {} -> {}", phase, next);

        std::thread::sleep(self.step_delay());
        Ok(())
    }

    /// One step with rotation accounting.
    ///
    /// Returns the new rotation count when this step completes a whole
    /// rotation within `run`, `None` otherwise.
    pub fn step_once(
        &self,
        lease: &MotorLease,
        direction: Direction,
        run: &mut StepRun,
    ) -> Result<Option<i64>, HalError> {
        self.advance(lease, direction)?;
        run.steps += 1;

        if run.steps % self.steps_per_rotation as u64 == 0 {
            let count = self
                .rotation_count
                .fetch_add(direction.sign() as i64, Ordering::SeqCst)
                + direction.sign() as i64;
            debug!("Rotation complete, count={}", count);
            Ok(Some(count))
        } else {
            Ok(None)
        }
    }

    /// Step with the live direction until a stop is requested.
    ///
    /// Calls `on_rotation` with the new count at each whole rotation.
    /// De-energizes the coils on exit. Returns the number of steps taken.
    pub fn run_continuous(
        &self,
        lease: &MotorLease,
        mut on_rotation: impl FnMut(i64),
    ) -> Result<u64, HalError> {
        info!("Continuous run started ({})", self.direction());
        let outcome = self.continuous_loop(lease, &mut on_rotation);

        let released = self.de_energize();
        let steps = outcome?;
        released?;
        info!("Continuous run stopped after {} steps", steps);
        Ok(steps)
    }

    /// Exactly one rotation in `direction`, unless stopped.
    ///
    /// The rotation count is updated once, on the last step. Returns
    /// `false` if a stop request cut the rotation short.
    pub fn run_fixed_rotation(
        &self,
        lease: &MotorLease,
        direction: Direction,
        mut on_rotation: impl FnMut(i64),
    ) -> Result<bool, HalError> {
        info!("Single rotation {} started", direction);
        let mut run = StepRun::default();
        let outcome = self.fixed_loop(lease, direction, &mut run, &mut on_rotation);

        let released = self.de_energize();
        let completed = outcome?;
        released?;
        if !completed {
            info!("Single rotation stopped after {} steps", run.steps());
        }
        Ok(completed)
    }

    /// Request the running loop to stop and drive all coils low.
    ///
    /// Idempotent. The loop observes the request within one step delay.
    pub fn stop(&self) -> Result<(), HalError> {
        self.lock.request_stop();
        self.de_energize()
    }

    /// Drive all coils low (no holding current).
    pub fn de_energize(&self) -> Result<(), HalError> {
        for &pin in &self.coil_pins {
            self.io.write(pin, false)?;
        }
        trace!("Coils de-energized");
        Ok(())
    }

    fn continuous_loop(
        &self,
        lease: &MotorLease,
        on_rotation: &mut impl FnMut(i64),
    ) -> Result<u64, HalError> {
        let mut run = StepRun::default();
        while !lease.stop_requested() {
            if let Some(count) = self.step_once(lease, self.direction(), &mut run)? {
                on_rotation(count);
            }
        }
        Ok(run.steps())
    }

    fn fixed_loop(
        &self,
        lease: &MotorLease,
        direction: Direction,
        run: &mut StepRun,
        on_rotation: &mut impl FnMut(i64),
    ) -> Result<bool, HalError> {
        for _ in 0..self.steps_per_rotation {
            if lease.stop_requested() {
                return Ok(false);
            }
            if let Some(count) = self.step_once(lease, direction, run)? {
                on_rotation(count);
            }
        }
        Ok(true)
    }

    fn write_pattern(&self, phase: usize) -> Result<(), HalError> {
        let levels = HALF_STEP_SEQUENCE[phase].levels();
        for (&pin, level) in self.coil_pins.iter().zip(levels) {
            self.io.write(pin, level)?;
        }
        Ok(())
    }
}

/// Restores the configured step delay on drop.
pub struct DelayOverride<'a> {
    sequencer: &'a StepSequencer,
}

impl Drop for DelayOverride<'_> {
    fn drop(&mut self) {
        self.sequencer.delay_override_us.store(0, Ordering::SeqCst);
        debug!(
            "Step delay restored to {:?}",
            self.sequencer.configured_step_delay()
        );
    }
}
