//! Ray cast from the sensor to the walls of a rectangular room.

/// Distance from `(sensor_x, sensor_y)` to the first wall of the
/// `[0, width] x [0, depth]` room along `angle_deg`.
///
/// Angles follow the scan convention: 0° points along +x, 90° along +y.
/// Returns `None` when the sensor sits outside the room.
pub(crate) fn distance_to_wall(
    width: f64,
    depth: f64,
    sensor_x: f64,
    sensor_y: f64,
    angle_deg: f64,
) -> Option<f64> {
    if !(0.0..=width).contains(&sensor_x) || !(0.0..=depth).contains(&sensor_y) {
        return None;
    }

    let (dy, dx) = angle_deg.to_radians().sin_cos();
    let along = |delta: f64, pos: f64, extent: f64| -> f64 {
        if delta > f64::EPSILON {
            (extent - pos) / delta
        } else if delta < -f64::EPSILON {
            -pos / delta
        } else {
            f64::INFINITY
        }
    };

    let t = along(dx, sensor_x, width).min(along(dy, sensor_y, depth));
    t.is_finite().then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn axis_aligned_rays() {
        // 300 x 200 room, sensor at (120, 80).
        assert!(approx(distance_to_wall(300.0, 200.0, 120.0, 80.0, 0.0), 180.0));
        assert!(approx(distance_to_wall(300.0, 200.0, 120.0, 80.0, 90.0), 120.0));
        assert!(approx(distance_to_wall(300.0, 200.0, 120.0, 80.0, 180.0), 120.0));
        assert!(approx(distance_to_wall(300.0, 200.0, 120.0, 80.0, 270.0), 80.0));
    }

    #[test]
    fn diagonal_hits_nearest_wall() {
        // Centre of a square: the diagonal reaches the corner.
        let d = distance_to_wall(100.0, 100.0, 50.0, 50.0, 45.0);
        assert!(approx(d, 50.0 * 2f64.sqrt()));
    }

    #[test]
    fn sensor_outside_room() {
        assert_eq!(distance_to_wall(100.0, 100.0, 150.0, 50.0, 0.0), None);
    }
}
