//! Simulated GPIO bank with a virtual stepper and rangefinder attached.
//!
//! The `SimulatedGpio` keeps:
//! - Pin modes and output levels
//! - A rotor that follows the coil pattern (latched when IN4 is written)
//! - An echo line answering each trigger pulse from the `EchoProfile`
//!
//! Echo timing is computed from the monotonic clock when the trigger falls,
//! so a polling reader sees the same high window a real sensor produces.

use super::room::distance_to_wall;
use parking_lot::Mutex;
use sonar_common::consts::{COIL_COUNT, PHASE_COUNT};
use sonar_common::hal::config::{EchoProfile, ScannerConfig};
use sonar_common::hal::driver::{DigitalIo, HalError, PinId};
use sonar_common::hal::types::CoilMask;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Configured direction of a simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinMode {
    Input,
    Output,
}

/// Echo line state after the last trigger.
#[derive(Debug, Clone, Copy)]
enum EchoLine {
    /// Low until the next trigger.
    Idle,
    /// High in `[rise, fall)`.
    Pulse { rise: Instant, fall: Instant },
    /// High forever.
    StuckHigh,
}

#[derive(Debug)]
struct SimState {
    modes: HashMap<PinId, PinMode>,
    levels: HashMap<PinId, bool>,
    coil_mask: CoilMask,
    /// Half-step pattern the rotor is aligned with.
    rotor_phase: Option<usize>,
    /// Net half-steps since power-up.
    shaft_steps: i64,
    echo: EchoLine,
    trigger_pulses: u64,
    profile: EchoProfile,
}

/// Software pin backend for development and tests.
pub struct SimulatedGpio {
    trigger: PinId,
    echo: PinId,
    coils: [PinId; COIL_COUNT],
    steps_per_rotation: u32,
    echo_latency: Duration,
    max_range_cm: f64,
    speed_of_sound_cm_per_s: f64,
    state: Mutex<SimState>,
    io_ops: AtomicU64,
}

impl SimulatedGpio {
    /// Build the simulated bank for the pins and environment in `config`.
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            trigger: config.pins.trigger,
            echo: config.pins.echo,
            coils: config.pins.coils,
            steps_per_rotation: config.motor.steps_per_rotation,
            echo_latency: Duration::from_micros(config.simulation.echo_latency_us),
            max_range_cm: config.simulation.max_range_cm,
            speed_of_sound_cm_per_s: config.sensor.speed_of_sound_cm_per_s,
            state: Mutex::new(SimState {
                modes: HashMap::new(),
                levels: HashMap::new(),
                coil_mask: CoilMask::empty(),
                rotor_phase: None,
                shaft_steps: 0,
                echo: EchoLine::Idle,
                trigger_pulses: 0,
                profile: config.simulation.profile.clone(),
            }),
            io_ops: AtomicU64::new(0),
        }
    }

    /// Replace the echo environment.
    pub fn set_profile(&self, profile: EchoProfile) {
        debug!("Simulated echo profile set to {:?}", profile);
        self.state.lock().profile = profile;
    }

    /// Coils currently energized.
    pub fn coil_mask(&self) -> CoilMask {
        self.state.lock().coil_mask
    }

    /// Net half-steps the rotor moved (signed, clockwise positive).
    pub fn shaft_steps(&self) -> i64 {
        self.state.lock().shaft_steps
    }

    /// Shaft angle in degrees, in [0, 360).
    pub fn shaft_angle_deg(&self) -> f64 {
        self.angle_of(self.shaft_steps())
    }

    /// Trigger pulses seen so far.
    pub fn trigger_pulses(&self) -> u64 {
        self.state.lock().trigger_pulses
    }

    /// Total configure/read/write calls.
    pub fn io_ops(&self) -> u64 {
        self.io_ops.load(Ordering::Relaxed)
    }

    fn angle_of(&self, steps: i64) -> f64 {
        let spr = self.steps_per_rotation.max(1) as i64;
        steps.rem_euclid(spr) as f64 * 360.0 / spr as f64
    }

    /// Obstacle distance for the current profile at `angle_deg`.
    fn obstacle_distance(&self, profile: &EchoProfile, angle_deg: f64) -> Option<f64> {
        match *profile {
            EchoProfile::Room {
                width_cm,
                depth_cm,
                sensor_x_cm,
                sensor_y_cm,
            } => distance_to_wall(width_cm, depth_cm, sensor_x_cm, sensor_y_cm, angle_deg),
            EchoProfile::Constant { distance_cm } => Some(distance_cm),
            EchoProfile::Silent | EchoProfile::StuckHigh => None,
        }
    }

    /// Schedule the echo for a trigger falling edge at `now`.
    fn fire_echo(&self, state: &mut SimState, now: Instant) {
        state.trigger_pulses += 1;

        if state.profile == EchoProfile::StuckHigh {
            state.echo = EchoLine::StuckHigh;
            return;
        }

        let angle = self.angle_of(state.shaft_steps);
        state.echo = match self.obstacle_distance(&state.profile, angle) {
            Some(d) if d > 0.0 && d <= self.max_range_cm => {
                let round_trip = Duration::from_secs_f64(2.0 * d / self.speed_of_sound_cm_per_s);
                let rise = now + self.echo_latency;
                trace!("Echo scheduled: {:.1} cm at {:.1}°", d, angle);
                EchoLine::Pulse {
                    rise,
                    fall: rise + round_trip,
                }
            }
            _ => {
                trace!("No echo at {:.1}°", angle);
                EchoLine::Idle
            }
        };
    }

    /// Move the rotor towards the pattern formed by the coil levels.
    fn latch_coils(&self, state: &mut SimState) {
        let levels = self.coils.map(|pin| state.levels.get(&pin).copied().unwrap_or(false));
        let mask = CoilMask::from_levels(levels);
        state.coil_mask = mask;

        let Some(phase) = mask.phase_index() else {
            // De-energized (or not a half-step pattern): rotor holds position.
            return;
        };

        if let Some(previous) = state.rotor_phase {
            let delta = (phase + PHASE_COUNT - previous) % PHASE_COUNT;
            match delta {
                0 => {}
                1 => state.shaft_steps += 1,
                d if d == PHASE_COUNT - 1 => state.shaft_steps -= 1,
                d => debug!("Rotor skipped: phase {} -> {} ({} apart)", previous, phase, d),
            }
        }
        state.rotor_phase = Some(phase);
    }
}

impl DigitalIo for SimulatedGpio {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn configure_output(&self, pin: PinId) -> Result<(), HalError> {
        self.io_ops.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.modes.insert(pin, PinMode::Output);
        state.levels.insert(pin, false);
        Ok(())
    }

    fn configure_input(&self, pin: PinId) -> Result<(), HalError> {
        self.io_ops.fetch_add(1, Ordering::Relaxed);
        self.state.lock().modes.insert(pin, PinMode::Input);
        Ok(())
    }

    fn write(&self, pin: PinId, level: bool) -> Result<(), HalError> {
        self.io_ops.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.modes.get(&pin) != Some(&PinMode::Output) {
            return Err(HalError::Gpio {
                pin,
                reason: "not configured as output".to_string(),
            });
        }

        let previous = state.levels.insert(pin, level).unwrap_or(false);
        if pin == self.trigger && previous && !level {
            self.fire_echo(&mut state, Instant::now());
        } else if pin == self.coils[COIL_COUNT - 1] {
            self.latch_coils(&mut state);
        }
        Ok(())
    }

    fn read(&self, pin: PinId) -> Result<bool, HalError> {
        self.io_ops.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock();
        if state.modes.get(&pin) != Some(&PinMode::Input) {
            return Err(HalError::Gpio {
                pin,
                reason: "not configured as input".to_string(),
            });
        }
        if pin != self.echo {
            return Ok(false);
        }

        Ok(match state.echo {
            EchoLine::Idle => false,
            EchoLine::StuckHigh => true,
            EchoLine::Pulse { rise, fall } => {
                let now = Instant::now();
                now >= rise && now < fall
            }
        })
    }

    fn release(&self) -> Result<(), HalError> {
        let mut state = self.state.lock();
        state.modes.clear();
        state.levels.clear();
        state.coil_mask = CoilMask::empty();
        debug!("Simulated pins released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_common::hal::types::HALF_STEP_SEQUENCE;

    fn configured(config: &ScannerConfig) -> SimulatedGpio {
        let gpio = SimulatedGpio::new(config);
        for &pin in &config.pins.coils {
            gpio.configure_output(pin).unwrap();
        }
        gpio.configure_output(config.pins.trigger).unwrap();
        gpio.configure_input(config.pins.echo).unwrap();
        gpio
    }

    fn write_phase(gpio: &SimulatedGpio, config: &ScannerConfig, phase: usize) {
        let levels = HALF_STEP_SEQUENCE[phase].levels();
        for (&pin, level) in config.pins.coils.iter().zip(levels) {
            gpio.write(pin, level).unwrap();
        }
    }

    #[test]
    fn test_unconfigured_pin_rejected() {
        let config = ScannerConfig::default();
        let gpio = SimulatedGpio::new(&config);
        assert!(matches!(
            gpio.write(config.pins.trigger, true),
            Err(HalError::Gpio { .. })
        ));
        assert!(gpio.read(config.pins.echo).is_err());
    }

    #[test]
    fn test_rotor_follows_half_steps() {
        let config = ScannerConfig::default();
        let gpio = configured(&config);

        // First pattern aligns only.
        write_phase(&gpio, &config, 3);
        assert_eq!(gpio.shaft_steps(), 0);
        write_phase(&gpio, &config, 4);
        write_phase(&gpio, &config, 5);
        assert_eq!(gpio.shaft_steps(), 2);
        write_phase(&gpio, &config, 4);
        assert_eq!(gpio.shaft_steps(), 1);
        assert_eq!(gpio.coil_mask(), CoilMask::C);
    }

    #[test]
    fn test_rotor_holds_through_de_energize() {
        let config = ScannerConfig::default();
        let gpio = configured(&config);

        write_phase(&gpio, &config, 7);
        write_phase(&gpio, &config, 0);
        for &pin in &config.pins.coils {
            gpio.write(pin, false).unwrap();
        }
        assert_eq!(gpio.coil_mask(), CoilMask::empty());

        write_phase(&gpio, &config, 1);
        assert_eq!(gpio.shaft_steps(), 2);
    }

    #[test]
    fn test_echo_window_follows_trigger() {
        let mut config = ScannerConfig::default();
        config.simulation.profile = EchoProfile::Constant { distance_cm: 343.0 };
        config.simulation.echo_latency_us = 0;
        let gpio = configured(&config);

        assert!(!gpio.read(config.pins.echo).unwrap());
        gpio.write(config.pins.trigger, true).unwrap();
        gpio.write(config.pins.trigger, false).unwrap();
        assert_eq!(gpio.trigger_pulses(), 1);

        // 2 * 343 cm at 34300 cm/s = 20 ms high.
        assert!(gpio.read(config.pins.echo).unwrap());
        std::thread::sleep(Duration::from_millis(40));
        assert!(!gpio.read(config.pins.echo).unwrap());
    }

    #[test]
    fn test_stuck_high_profile() {
        let mut config = ScannerConfig::default();
        config.simulation.profile = EchoProfile::StuckHigh;
        let gpio = configured(&config);

        gpio.write(config.pins.trigger, true).unwrap();
        gpio.write(config.pins.trigger, false).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(gpio.read(config.pins.echo).unwrap());
    }

    #[test]
    fn test_room_distance_depends_on_angle() {
        let mut config = ScannerConfig::default();
        config.motor.steps_per_rotation = 8;
        let gpio = configured(&config);

        assert_eq!(gpio.shaft_angle_deg(), 0.0);
        write_phase(&gpio, &config, 0);
        write_phase(&gpio, &config, 1);
        write_phase(&gpio, &config, 2);
        assert_eq!(gpio.shaft_angle_deg(), 90.0);

        let state = gpio.state.lock();
        let d = gpio.obstacle_distance(&state.profile, 90.0).unwrap();
        // Default room: sensor 80 cm from the bottom of a 200 cm deep room.
        assert!((d - 120.0).abs() < 1e-9);
    }
}
