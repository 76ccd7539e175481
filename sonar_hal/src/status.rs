//! Status events streamed to the UI.
//!
//! `Display` renders the label text shown to the operator.

use serde::Serialize;
use sonar_common::hal::types::{Direction, MotorOwner};
use sonar_common::scan::Measurement;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::debug;

/// Event published by `ScannerCore` on its status channel.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Rotation count changed.
    Rotations(i64),
    /// Sensor switched on or off.
    Sensor(bool),
    /// Passive monitor reading.
    Distance(Measurement),
    /// Configured inter-step delay changed.
    StepDelay(Duration),
    /// Live direction changed.
    Direction(Direction),
    /// A continuous run or nudge ended.
    MotorStopped,
    /// Scan started.
    Scanning,
    /// Scan finished a full rotation.
    ScanComplete(usize),
    /// Scan stopped before a full rotation.
    ScanStopped(usize),
    /// Scan finished without a single valid sample.
    NoScanData,
    /// A command was refused.
    Rejected(String),
    /// An operation failed.
    Fault(String),
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Rotations(n) => write!(f, "Rotations: {n}"),
            StatusEvent::Sensor(on) => write!(f, "Sensor: {}", if *on { "ON" } else { "OFF" }),
            StatusEvent::Distance(m) => write!(f, "Distance: {m}"),
            StatusEvent::StepDelay(d) => {
                write!(f, "Step delay: {:.1} ms", d.as_secs_f64() * 1000.0)
            }
            StatusEvent::Direction(d) => write!(f, "Direction: {d}"),
            StatusEvent::MotorStopped => f.write_str("Motor stopped"),
            StatusEvent::Scanning => f.write_str("Fast Scanning..."),
            StatusEvent::ScanComplete(n) => write!(f, "Fast Scan Complete: {n} points"),
            StatusEvent::ScanStopped(n) => write!(f, "Scan stopped: {n} points"),
            StatusEvent::NoScanData => f.write_str("No scan data collected."),
            StatusEvent::Rejected(why) => write!(f, "Rejected: {why}"),
            StatusEvent::Fault(why) => write!(f, "Fault: {why}"),
        }
    }
}

/// Cloneable sending side of the status stream.
///
/// Sends never fail the caller: a UI that stopped listening only loses
/// labels.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: Sender<StatusEvent>,
}

impl StatusPublisher {
    /// New stream; the receiver goes to the UI.
    pub fn channel() -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Publish one event.
    pub fn publish(&self, event: StatusEvent) {
        debug!("Status: {}", event);
        let _ = self.tx.send(event);
    }
}

/// Point-in-time view of the scanner for the `status` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerStatus {
    /// Signed whole rotations.
    pub rotations: i64,
    /// Live direction.
    pub direction: Direction,
    /// Configured inter-step delay.
    pub step_delay_us: u64,
    /// Rangefinder on/off.
    pub sensor_enabled: bool,
    /// Operation currently driving the motor.
    pub motor: Option<MotorOwner>,
    /// Valid samples in the last scan.
    pub last_scan_points: usize,
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", StatusEvent::Rotations(self.rotations))?;
        writeln!(f, "{}", StatusEvent::Direction(self.direction))?;
        writeln!(
            f,
            "{}",
            StatusEvent::StepDelay(Duration::from_micros(self.step_delay_us))
        )?;
        writeln!(f, "{}", StatusEvent::Sensor(self.sensor_enabled))?;
        match self.motor {
            Some(owner) => writeln!(f, "Motor: {owner}")?,
            None => writeln!(f, "Motor: idle")?,
        }
        write!(f, "Last scan: {} points", self.last_scan_points)
    }
}
