//! Scanner core: command surface and worker threads.
//!
//! The `ScannerCore` owns the sequencer, rangefinder and scan controller,
//! runs the passive distance monitor, and spawns one worker thread per
//! motor operation. Every command returns promptly; results are streamed
//! as [`StatusEvent`]s.

use crate::geometry::to_cartesian;
use crate::motor_lock::MotorLease;
use crate::rangefinder::PulseRangefinder;
use crate::scan::ScanController;
use crate::status::{ScannerStatus, StatusEvent, StatusPublisher};
use crate::stepper::StepSequencer;
use crate::visualize::Visualizer;
use parking_lot::Mutex;
use sonar_common::hal::config::ScannerConfig;
use sonar_common::hal::driver::{DigitalIo, HalError};
use sonar_common::hal::types::{Direction, MotorOwner};
use sonar_common::scan::ScanResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Scanner core managing the motor, the sensor and their workers.
pub struct ScannerCore {
    /// Validated configuration
    config: ScannerConfig,
    /// Pin backend shared by all components
    io: Arc<dyn DigitalIo>,
    sequencer: Arc<StepSequencer>,
    rangefinder: Arc<PulseRangefinder>,
    scanner: Arc<ScanController>,
    visualizer: Arc<dyn Visualizer>,
    status: StatusPublisher,
    /// True between `init` and `shutdown`
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ScannerCore {
    /// Create a core on `io`. Returns the core and the status stream.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(
        config: ScannerConfig,
        io: Arc<dyn DigitalIo>,
        visualizer: Arc<dyn Visualizer>,
    ) -> Result<(Self, Receiver<StatusEvent>), HalError> {
        config.validate()?;

        let sequencer = Arc::new(StepSequencer::new(io.clone(), &config.pins, &config.motor)?);
        let rangefinder = Arc::new(PulseRangefinder::new(
            io.clone(),
            &config.pins,
            &config.sensor,
        ));
        let scanner = Arc::new(ScanController::new(
            sequencer.clone(),
            rangefinder.clone(),
            config.scan.stride,
            Duration::from_micros(config.scan.step_delay_us),
        ));
        let (status, rx) = StatusPublisher::channel();

        info!(
            "ScannerCore created on '{}': {} steps/rotation, {} scan groups",
            io.name(),
            config.motor.steps_per_rotation,
            scanner.plan().group_count()
        );

        Ok((
            Self {
                config,
                io,
                sequencer,
                rangefinder,
                scanner,
                visualizer,
                status,
                running: Arc::new(AtomicBool::new(false)),
                workers: Mutex::new(Vec::new()),
            },
            rx,
        ))
    }

    /// Configure the pins, leave the coils low and start the distance
    /// monitor.
    pub fn init(&self) -> Result<(), HalError> {
        info!("Initializing ScannerCore...");
        self.sequencer.configure()?;
        self.rangefinder.configure()?;

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        self.running.store(true, Ordering::SeqCst);
        self.status
            .publish(StatusEvent::Sensor(self.rangefinder.is_enabled()));
        self.status
            .publish(StatusEvent::StepDelay(self.sequencer.configured_step_delay()));
        self.status
            .publish(StatusEvent::Direction(self.sequencer.direction()));
        self.status
            .publish(StatusEvent::Rotations(self.sequencer.rotation_count()));

        if self.config.monitor.enabled {
            self.spawn_monitor()?;
        }

        info!("ScannerCore initialized successfully");
        Ok(())
    }

    // ─── Motor commands ─────────────────────────────────────────────

    /// Start continuous rotation in the live direction.
    pub fn start(&self) -> Result<(), HalError> {
        let lease = self.acquire(MotorOwner::Continuous)?;
        let sequencer = self.sequencer.clone();
        let status = self.status.clone();

        self.spawn_worker("sonar-run", move || {
            let outcome = sequencer.run_continuous(&lease, |n| {
                status.publish(StatusEvent::Rotations(n));
            });
            finish_motor_run(lease, outcome.map(|_| ()), &status);
        })
    }

    /// Stop whatever drives the motor and de-energize the coils.
    ///
    /// Idempotent; does not wait for the worker to exit.
    pub fn stop(&self) -> Result<(), HalError> {
        debug!("Stop requested (holder: {:?})", self.sequencer.lock().holder());
        self.sequencer.stop()
    }

    /// Shorten the step delay by one increment.
    pub fn increase_speed(&self) -> Duration {
        let delay = self.sequencer.increase_speed();
        self.status.publish(StatusEvent::StepDelay(delay));
        delay
    }

    /// Lengthen the step delay by one increment.
    pub fn decrease_speed(&self) -> Duration {
        let delay = self.sequencer.decrease_speed();
        self.status.publish(StatusEvent::StepDelay(delay));
        delay
    }

    /// Change the live direction.
    pub fn set_direction(&self, direction: Direction) {
        self.sequencer.set_direction(direction);
        self.status.publish(StatusEvent::Direction(direction));
    }

    /// Exactly one rotation; `+1` clockwise, `-1` counter-clockwise.
    pub fn nudge_rotation(&self, direction: i8) -> Result<(), HalError> {
        let direction = Direction::try_from(direction)?;
        let lease = self.acquire(MotorOwner::FixedRotation)?;
        let sequencer = self.sequencer.clone();
        let status = self.status.clone();

        self.spawn_worker("sonar-nudge", move || {
            let outcome = sequencer.run_fixed_rotation(&lease, direction, |n| {
                status.publish(StatusEvent::Rotations(n));
            });
            finish_motor_run(lease, outcome.map(|_| ()), &status);
        })
    }

    // ─── Sensor and scan ────────────────────────────────────────────

    /// Flip the rangefinder on/off. Returns the new state.
    pub fn toggle_sensor(&self) -> bool {
        let on = self.rangefinder.toggle();
        self.status.publish(StatusEvent::Sensor(on));
        on
    }

    /// Start a 360° scan. The sensor is switched on if needed.
    pub fn run_scan(&self) -> Result<(), HalError> {
        let lease = self.acquire(MotorOwner::Scan)?;
        if self.rangefinder.ensure_enabled() {
            self.status.publish(StatusEvent::Sensor(true));
        }
        self.status.publish(StatusEvent::Scanning);

        let scanner = self.scanner.clone();
        let visualizer = self.visualizer.clone();
        let status = self.status.clone();

        self.spawn_worker("sonar-scan", move || {
            let outcome = scanner.run_scan(&lease, |p| {
                if p.group.index % 64 == 0 {
                    debug!("Scan group {}/{}", p.group.index, p.group_count);
                }
            });
            drop(lease);

            match outcome {
                Ok(result) => report_scan(&result, visualizer.as_ref(), &status),
                Err(e) => {
                    error!("Scan failed: {}", e);
                    status.publish(StatusEvent::Fault(e.to_string()));
                }
            }
        })
    }

    /// Copy of the most recent scan result.
    pub fn last_scan(&self) -> ScanResult {
        self.scanner.last_result()
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Signed whole rotations since startup.
    pub fn rotation_count(&self) -> i64 {
        self.sequencer.rotation_count()
    }

    /// Operation currently driving the motor.
    pub fn motor_holder(&self) -> Option<MotorOwner> {
        self.sequencer.lock().holder()
    }

    /// Snapshot for the `status` command.
    pub fn snapshot(&self) -> ScannerStatus {
        ScannerStatus {
            rotations: self.sequencer.rotation_count(),
            direction: self.sequencer.direction(),
            step_delay_us: self.sequencer.configured_step_delay().as_micros() as u64,
            sensor_enabled: self.rangefinder.is_enabled(),
            motor: self.motor_holder(),
            last_scan_points: self.scanner.last_result().len(),
        }
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop everything, join the workers and release the pins.
    pub fn shutdown(&self) -> Result<(), HalError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.sequencer.stop()?;

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("Worker {} panicked", name);
            }
        }

        self.sequencer.de_energize()?;
        self.io.release()?;
        info!("ScannerCore shut down");
        Ok(())
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn acquire(&self, owner: MotorOwner) -> Result<MotorLease, HalError> {
        self.sequencer.try_acquire(owner).inspect_err(|e| {
            self.status.publish(StatusEvent::Rejected(e.to_string()));
        })
    }

    fn spawn_worker<F>(&self, name: &str, body: F) -> Result<(), HalError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|e| HalError::WorkerSpawn {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let mut workers = self.workers.lock();
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
        debug!("Worker {} spawned ({} active)", name, workers.len());
        Ok(())
    }

    /// Poll the sensor for the passive distance label until shutdown.
    fn spawn_monitor(&self) -> Result<(), HalError> {
        let rangefinder = self.rangefinder.clone();
        let running = self.running.clone();
        let status = self.status.clone();
        let interval = Duration::from_millis(self.config.monitor.poll_interval_ms);

        self.spawn_worker("sonar-monitor", move || {
            info!("Distance monitor started ({:?} interval)", interval);
            let mut shown: Option<String> = None;

            while running.load(Ordering::SeqCst) {
                match rangefinder.measure() {
                    Ok(m) => {
                        // Only label changes go out; the UI keeps the last one.
                        let text = m.to_string();
                        if shown.as_deref() != Some(text.as_str()) {
                            status.publish(StatusEvent::Distance(m));
                            shown = Some(text);
                        }
                    }
                    Err(e) => {
                        warn!("Distance monitor read failed: {}", e);
                        status.publish(StatusEvent::Fault(e.to_string()));
                    }
                }
                thread::sleep(interval);
            }
            info!("Distance monitor stopped");
        })
    }
}

/// Release the motor, then report how the run ended.
fn finish_motor_run(lease: MotorLease, outcome: Result<(), HalError>, status: &StatusPublisher) {
    let owner = lease.owner();
    drop(lease);
    if let Err(e) = outcome {
        error!("{} failed: {}", owner, e);
        status.publish(StatusEvent::Fault(e.to_string()));
    }
    status.publish(StatusEvent::MotorStopped);
}

/// Announce a finished scan and hand it to the visualizer.
fn report_scan(result: &ScanResult, visualizer: &dyn Visualizer, status: &StatusPublisher) {
    if !result.completed {
        status.publish(StatusEvent::ScanStopped(result.len()));
        return;
    }

    if result.is_empty() {
        status.publish(StatusEvent::NoScanData);
        visualizer.show_no_data();
    } else {
        status.publish(StatusEvent::ScanComplete(result.len()));
        visualizer.render(&to_cartesian(&result.samples));
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
