//! Ultrasonic pulse rangefinder (HC-SR04 class).
//!
//! One measurement: a short trigger pulse, then two bounded edge waits on
//! the echo line. The echo high time is the sound round trip.
//!
//! Timeouts and a disabled sensor never surface as errors; they produce an
//! invalid [`Measurement`]. Only pin I/O failures are returned as
//! `HalError`.

use parking_lot::Mutex;
use sonar_common::hal::config::{PinConfig, SensorConfig};
use sonar_common::hal::driver::{DigitalIo, HalError, PinId};
use sonar_common::scan::Measurement;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Echo edge being waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

/// Pulse-timing distance sensor.
pub struct PulseRangefinder {
    io: Arc<dyn DigitalIo>,
    trigger_pin: PinId,
    echo_pin: PinId,
    trigger_pulse: Duration,
    echo_timeout: Duration,
    speed_of_sound_cm_per_s: f64,
    enabled: AtomicBool,
    /// Serializes measurements between the monitor and scans.
    bus: Mutex<()>,
}

impl PulseRangefinder {
    /// Create a rangefinder on `pins.trigger` / `pins.echo`.
    pub fn new(io: Arc<dyn DigitalIo>, pins: &PinConfig, sensor: &SensorConfig) -> Self {
        Self {
            io,
            trigger_pin: pins.trigger,
            echo_pin: pins.echo,
            trigger_pulse: sensor.trigger_pulse(),
            echo_timeout: sensor.echo_timeout(),
            speed_of_sound_cm_per_s: sensor.speed_of_sound_cm_per_s,
            enabled: AtomicBool::new(sensor.start_enabled),
            bus: Mutex::new(()),
        }
    }

    /// Configure trigger as output (low) and echo as input.
    pub fn configure(&self) -> Result<(), HalError> {
        self.io.configure_output(self.trigger_pin)?;
        self.io.write(self.trigger_pin, false)?;
        self.io.configure_input(self.echo_pin)
    }

    /// True when measurements drive the pins.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the sensor.
    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::SeqCst);
        info!("Sensor {}", if on { "ON" } else { "OFF" });
    }

    /// Flip the sensor state. Returns the new state.
    pub fn toggle(&self) -> bool {
        let on = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        info!("Sensor {}", if on { "ON" } else { "OFF" });
        on
    }

    /// Enable the sensor if it is off.
    ///
    /// Returns `true` if this call changed the state.
    pub fn ensure_enabled(&self) -> bool {
        let changed = self
            .enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if changed {
            info!("Sensor ON");
        }
        changed
    }

    /// Take one distance measurement.
    ///
    /// Returns an invalid measurement immediately, without touching the
    /// pins, when the sensor is disabled, and after `echo_timeout` when an
    /// edge never arrives.
    pub fn measure(&self) -> Result<Measurement, HalError> {
        if !self.is_enabled() {
            trace!("Measurement skipped: sensor disabled");
            return Ok(Measurement::invalid());
        }

        let _bus = self.bus.lock();
        self.emit_trigger()?;

        let Some(pulse_start) = self.wait_for_edge(Edge::Rising)? else {
            return Ok(Measurement::invalid());
        };
        let Some(pulse_end) = self.wait_for_edge(Edge::Falling)? else {
            return Ok(Measurement::invalid());
        };

        let round_trip = pulse_end.duration_since(pulse_start);
        let distance_cm = round_trip.as_secs_f64() * self.speed_of_sound_cm_per_s / 2.0;
        trace!("Echo {:?} -> {:.2} cm", round_trip, distance_cm);
        Ok(Measurement::valid(distance_cm))
    }

    /// High pulse of `trigger_pulse` on the trigger pin.
    fn emit_trigger(&self) -> Result<(), HalError> {
        self.io.write(self.trigger_pin, true)?;
        // Spin: thread::sleep overshoots a 10 µs pulse by an order of magnitude.
        let start = Instant::now();
        while start.elapsed() < self.trigger_pulse {
            std::hint::spin_loop();
        }
        self.io.write(self.trigger_pin, false)
    }

    /// Poll the echo pin until `edge` or until the timeout elapses.
    ///
    /// The deadline is taken from the monotonic clock at the start of the
    /// wait. Returns the instant the new level was first observed.
    fn wait_for_edge(&self, edge: Edge) -> Result<Option<Instant>, HalError> {
        let target = edge == Edge::Rising;
        let deadline = Instant::now() + self.echo_timeout;

        loop {
            let level = self.io.read(self.echo_pin)?;
            let now = Instant::now();
            if level == target {
                return Ok(Some(now));
            }
            if now >= deadline {
                debug!("Echo timeout waiting for {:?} edge", edge);
                return Ok(None);
            }
            std::hint::spin_loop();
        }
    }
}
