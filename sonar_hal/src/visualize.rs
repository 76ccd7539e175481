//! Scan rendering boundary.
//!
//! The core hands Cartesian points to a [`Visualizer`]; what happens to them
//! (plot window, file, stdout) is up to the implementation.

use crate::geometry::closed_outline;
use parking_lot::Mutex;
use serde::Serialize;
use sonar_common::scan::CartesianPoint;
use std::io::Write;
use tracing::{debug, warn};

/// Consumer of finished scans.
pub trait Visualizer: Send + Sync {
    /// Render one scan. `points` is in sampling order, not closed.
    fn render(&self, points: &[CartesianPoint]);

    /// Tell the operator the scan produced nothing to draw.
    fn show_no_data(&self);
}

#[derive(Serialize)]
struct ScanDocument<'a> {
    points: &'a [CartesianPoint],
    outline: Vec<CartesianPoint>,
}

/// Writes each scan as one JSON line.
pub struct JsonVisualizer<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonVisualizer<W> {
    /// Visualizer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_line(&self, line: &[u8]) {
        let mut out = self.out.lock();
        let result = out
            .write_all(line)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());
        if let Err(e) = result {
            warn!("Visualizer write failed: {}", e);
        }
    }
}

impl<W: Write + Send> Visualizer for JsonVisualizer<W> {
    fn render(&self, points: &[CartesianPoint]) {
        let doc = ScanDocument {
            points,
            outline: closed_outline(points),
        };
        match serde_json::to_vec(&doc) {
            Ok(json) => {
                self.write_line(&json);
                debug!("Rendered {} points", points.len());
            }
            Err(e) => warn!("Failed to serialize scan: {}", e),
        }
    }

    fn show_no_data(&self) {
        self.write_line(br#"{"notice":"no scan data"}"#);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_points_and_closed_outline() {
        let vis = JsonVisualizer::new(Vec::new());
        vis.render(&[
            CartesianPoint { x: 1.0, y: 0.0 },
            CartesianPoint { x: 0.0, y: 2.0 },
        ]);

        let out = String::from_utf8(vis.into_inner()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(doc["points"].as_array().unwrap().len(), 2);
        let outline = doc["outline"].as_array().unwrap();
        assert_eq!(outline.len(), 3);
        assert_eq!(outline[0], outline[2]);
        assert_eq!(outline[1]["y"], 2.0);
    }

    #[test]
    fn no_data_notice() {
        let vis = JsonVisualizer::new(Vec::new());
        vis.show_no_data();
        let out = String::from_utf8(vis.into_inner()).unwrap();
        assert_eq!(out, "{\"notice\":\"no scan data\"}\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_not_fatal() {
        let vis = JsonVisualizer::new(BrokenPipe);
        vis.render(&[CartesianPoint { x: 1.0, y: 1.0 }]);
        vis.show_no_data();
    }
}
