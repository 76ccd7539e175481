//! Polar to Cartesian conversion of scan samples.

use sonar_common::scan::{CartesianPoint, ScanSample};

/// Convert samples to points: `x = d cos θ`, `y = d sin θ`.
///
/// θ is measured counter-clockwise from +x. Order is preserved.
pub fn to_cartesian(samples: &[ScanSample]) -> Vec<CartesianPoint> {
    samples
        .iter()
        .map(|s| {
            let (sin, cos) = s.angle_deg.to_radians().sin_cos();
            CartesianPoint {
                x: s.distance_cm * cos,
                y: s.distance_cm * sin,
            }
        })
        .collect()
}

/// `points` followed by the first point again, closing the polygon.
pub fn closed_outline(points: &[CartesianPoint]) -> Vec<CartesianPoint> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut outline = Vec::with_capacity(points.len() + 1);
    outline.extend_from_slice(points);
    outline.push(first);
    outline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(distance_cm: f64, angle_deg: f64) -> ScanSample {
        ScanSample {
            distance_cm,
            angle_deg,
        }
    }

    fn assert_close(p: CartesianPoint, x: f64, y: f64) {
        assert!((p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9, "{p:?} != ({x}, {y})");
    }

    #[test]
    fn quarter_turn() {
        let points = to_cartesian(&[sample(10.0, 0.0), sample(10.0, 90.0)]);
        assert_eq!(points.len(), 2);
        assert_close(points[0], 10.0, 0.0);
        assert_close(points[1], 0.0, 10.0);
    }

    #[test]
    fn counter_clockwise_angles() {
        let points = to_cartesian(&[sample(2.0, 180.0), sample(4.0, 270.0)]);
        assert_close(points[0], -2.0, 0.0);
        assert_close(points[1], 0.0, -4.0);
    }

    #[test]
    fn empty_input() {
        assert!(to_cartesian(&[]).is_empty());
        assert!(closed_outline(&[]).is_empty());
    }

    #[test]
    fn outline_returns_to_start() {
        let points = to_cartesian(&[sample(1.0, 0.0), sample(1.0, 120.0), sample(1.0, 240.0)]);
        let outline = closed_outline(&points);
        assert_eq!(outline.len(), 4);
        assert_eq!(outline[0], outline[3]);
        assert_eq!(&outline[..3], &points[..]);
    }
}
