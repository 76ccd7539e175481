//! ScannerCore integration tests on the simulation driver.
//!
//! Small rotations (64 steps) and short delays keep each test well under a
//! second while exercising the real worker threads.

use parking_lot::Mutex;
use sonar_common::hal::config::{EchoProfile, ScannerConfig};
use sonar_common::hal::driver::HalError;
use sonar_common::hal::types::{CoilMask, Direction, MotorOwner};
use sonar_common::scan::CartesianPoint;
use sonar_hal::drivers::simulation::SimulatedGpio;
use sonar_hal::{ScannerCore, StatusEvent, Visualizer};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

/// Visualizer that keeps what it was asked to draw.
#[derive(Default)]
struct RecordingVisualizer {
    scans: Mutex<Vec<Vec<CartesianPoint>>>,
    no_data: Mutex<usize>,
}

impl Visualizer for RecordingVisualizer {
    fn render(&self, points: &[CartesianPoint]) {
        self.scans.lock().push(points.to_vec());
    }

    fn show_no_data(&self) {
        *self.no_data.lock() += 1;
    }
}

struct Rig {
    core: ScannerCore,
    rx: Receiver<StatusEvent>,
    gpio: Arc<SimulatedGpio>,
    vis: Arc<RecordingVisualizer>,
}

fn test_config(profile: EchoProfile) -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.motor.steps_per_rotation = 64;
    config.motor.step_delay_us = 50;
    config.motor.min_step_delay_us = 10;
    config.motor.speed_increment_us = 10;
    config.scan.stride = 8;
    config.scan.step_delay_us = 5;
    config.sensor.echo_timeout_us = 5_000;
    config.monitor.enabled = false;
    config.simulation.echo_latency_us = 10;
    config.simulation.profile = profile;
    config
}

fn rig(config: ScannerConfig) -> Rig {
    let gpio = Arc::new(SimulatedGpio::new(&config));
    let vis = Arc::new(RecordingVisualizer::default());
    let (core, rx) = ScannerCore::new(config, gpio.clone(), vis.clone()).unwrap();
    core.init().unwrap();
    // Initial labels.
    let _: Vec<_> = rx.try_iter().collect();
    Rig { core, rx, gpio, vis }
}

/// Receive until `pred` matches; returns every event seen, match last.
fn wait_for(rx: &Receiver<StatusEvent>, pred: impl Fn(&StatusEvent) -> bool) -> Vec<StatusEvent> {
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let event = rx
            .recv_timeout(left)
            .unwrap_or_else(|_| panic!("timed out; saw {seen:?}"));
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[test]
fn test_start_and_stop_continuous_run() {
    let rig = rig(test_config(EchoProfile::Silent));

    rig.core.start().unwrap();
    assert_eq!(rig.core.motor_holder(), Some(MotorOwner::Continuous));
    wait_for(&rig.rx, |e| *e == StatusEvent::Rotations(2));

    rig.core.stop().unwrap();
    wait_for(&rig.rx, |e| *e == StatusEvent::MotorStopped);

    assert_eq!(rig.core.motor_holder(), None);
    assert!(rig.core.rotation_count() >= 2);
    assert_eq!(rig.gpio.coil_mask(), CoilMask::empty());
    rig.core.shutdown().unwrap();
}

#[test]
fn test_second_start_rejected() {
    let rig = rig(test_config(EchoProfile::Silent));
    rig.core.start().unwrap();

    let err = rig.core.start().unwrap_err();
    assert_eq!(
        err,
        HalError::MotorBusy {
            held_by: MotorOwner::Continuous
        }
    );
    let events = wait_for(&rig.rx, |e| matches!(e, StatusEvent::Rejected(_)));
    assert_eq!(
        events.last().unwrap().to_string(),
        "Rejected: Motor busy: held by continuous run"
    );

    rig.core.shutdown().unwrap();
}

#[test]
fn test_nudges_count_whole_rotations() {
    let rig = rig(test_config(EchoProfile::Silent));

    rig.core.nudge_rotation(1).unwrap();
    let events = wait_for(&rig.rx, |e| *e == StatusEvent::MotorStopped);
    assert!(events.contains(&StatusEvent::Rotations(1)));
    assert_eq!(rig.core.rotation_count(), 1);

    rig.core.nudge_rotation(-1).unwrap();
    wait_for(&rig.rx, |e| *e == StatusEvent::MotorStopped);
    assert_eq!(rig.core.rotation_count(), 0);
    assert_eq!(rig.gpio.coil_mask(), CoilMask::empty());

    rig.core.shutdown().unwrap();
}

#[test]
fn test_nudge_rejected_while_running() {
    let rig = rig(test_config(EchoProfile::Silent));
    rig.core.set_direction(Direction::CounterClockwise);
    rig.core.start().unwrap();

    assert_eq!(
        rig.core.nudge_rotation(1),
        Err(HalError::MotorBusy {
            held_by: MotorOwner::Continuous
        })
    );
    assert_eq!(
        rig.core.run_scan(),
        Err(HalError::MotorBusy {
            held_by: MotorOwner::Continuous
        })
    );

    rig.core.stop().unwrap();
    wait_for(&rig.rx, |e| *e == StatusEvent::MotorStopped);
    // Only the counter-clockwise run moved the count.
    assert!(rig.core.rotation_count() <= 0);
    rig.core.shutdown().unwrap();
}

#[test]
fn test_scan_renders_points() {
    let rig = rig(test_config(EchoProfile::Constant { distance_cm: 20.0 }));

    rig.core.run_scan().unwrap();
    let events = wait_for(&rig.rx, |e| matches!(e, StatusEvent::ScanComplete(_)));

    // Sensor starts off; the scan switches it on and says so.
    assert_eq!(events[0], StatusEvent::Sensor(true));
    assert_eq!(events[1], StatusEvent::Scanning);
    assert_eq!(*events.last().unwrap(), StatusEvent::ScanComplete(8));

    let scans = rig.vis.scans.lock();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].len(), 8);
    assert!((scans[0][0].x - 20.0).abs() < 3.0);
    assert!(scans[0][0].y.abs() < 1e-9);
    drop(scans);

    let last = rig.core.last_scan();
    assert!(last.completed);
    assert_eq!(last.len(), 8);
    assert_eq!(rig.core.rotation_count(), 0);
    assert_eq!(rig.core.snapshot().last_scan_points, 8);
    rig.core.shutdown().unwrap();
}

#[test]
fn test_scan_without_echo_shows_no_data() {
    let rig = rig(test_config(EchoProfile::Silent));

    rig.core.run_scan().unwrap();
    wait_for(&rig.rx, |e| *e == StatusEvent::NoScanData);

    assert_eq!(*rig.vis.no_data.lock(), 1);
    assert!(rig.vis.scans.lock().is_empty());
    rig.core.shutdown().unwrap();
}

#[test]
fn test_stop_ends_scan_early() {
    let mut config = test_config(EchoProfile::Silent);
    config.sensor.echo_timeout_us = 20_000;
    let rig = rig(config);

    rig.core.run_scan().unwrap();
    wait_for(&rig.rx, |e| *e == StatusEvent::Scanning);
    std::thread::sleep(Duration::from_millis(30));
    rig.core.stop().unwrap();

    let events = wait_for(&rig.rx, |e| matches!(e, StatusEvent::ScanStopped(_)));
    assert_eq!(*events.last().unwrap(), StatusEvent::ScanStopped(0));
    let last = rig.core.last_scan();
    assert!(!last.completed);
    assert!(last.groups_evaluated < 8);
    assert_eq!(rig.gpio.coil_mask(), CoilMask::empty());
    assert!(rig.vis.scans.lock().is_empty());

    // Motor is free again.
    std::thread::sleep(Duration::from_millis(20));
    rig.core.nudge_rotation(1).unwrap();
    rig.core.shutdown().unwrap();
}

#[test]
fn test_monitor_reports_distance_changes() {
    let mut config = test_config(EchoProfile::Constant { distance_cm: 30.0 });
    config.monitor.enabled = true;
    config.monitor.poll_interval_ms = 5;
    let rig = rig(config);

    let events = wait_for(&rig.rx, |e| matches!(e, StatusEvent::Distance(_)));
    assert_eq!(events.last().unwrap().to_string(), "Distance: -- cm");

    rig.core.toggle_sensor();
    wait_for(&rig.rx, |e| {
        matches!(e, StatusEvent::Distance(m) if m.valid && (m.distance_cm - 30.0).abs() < 3.0)
    });

    rig.core.shutdown().unwrap();
    assert!(!rig.core.running_flag().load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn test_speed_commands_keep_floor() {
    let rig = rig(test_config(EchoProfile::Silent));
    for _ in 0..10 {
        rig.core.increase_speed();
    }
    // 50 -> 40 -> 30 -> 20; 10 would reach the floor.
    assert_eq!(rig.core.snapshot().step_delay_us, 20);
    rig.core.shutdown().unwrap();
}
