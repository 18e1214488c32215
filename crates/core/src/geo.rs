//! Geospatial primitives over latitude/longitude pairs and polar WEP geometry.

use crate::model::{Coordinates, Measure};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `from` to `to`, degrees clockwise from north in `[0, 360)`.
pub fn bearing_deg(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

pub fn normalize_deg(deg: f64) -> f64 {
    let d = deg % 360.0;
    if d < 0.0 {
        d + 360.0
    } else {
        d
    }
}

/// Smallest angle between two headings, in `[0, 180]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// True when two headings point in opposite directions:
/// `|((|a - b| mod 360) - 180)| <= tolerance`.
pub fn angles_opposite(a: f64, b: f64, tolerance_deg: f64) -> bool {
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    let diff = (a - b).abs() % 360.0;
    (diff - 180.0).abs() <= tolerance_deg
}

/// Two span lengths describe the same span: relative tolerance on the mean,
/// absolute tolerance when the mean is near zero. Differing units never match.
pub fn distances_match(a: &Measure, b: &Measure, rel_tolerance: f64, abs_tolerance: f64) -> bool {
    if !a.same_unit(b) || !a.value.is_finite() || !b.value.is_finite() {
        return false;
    }
    let diff = (a.value - b.value).abs();
    let avg = (a.value.abs() + b.value.abs()) / 2.0;
    if avg <= abs_tolerance {
        return diff <= abs_tolerance;
    }
    diff / avg <= rel_tolerance
}

/// Arithmetic mean of two coordinates. Adequate at span scale.
pub fn midpoint(a: Coordinates, b: Coordinates) -> Coordinates {
    Coordinates::new(
        (a.latitude + b.latitude) / 2.0,
        (a.longitude + b.longitude) / 2.0,
    )
}

/// Cheap proximity score: squared coordinate delta in units of 1e-5 degree
/// (about 1.1 m), each coordinate rounded to 5 decimals first.
pub fn squared_coordinate_delta(a: Coordinates, b: Coordinates) -> f64 {
    let scale = 1e5;
    let dlat = (a.latitude * scale).round() - (b.latitude * scale).round();
    let dlon = (a.longitude * scale).round() - (b.longitude * scale).round();
    dlat * dlat + dlon * dlon
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(Coordinates::new(35.0, -106.0), Coordinates::new(36.0, -106.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = Coordinates::new(35.08, -106.65);
        assert!(haversine_m(p, p) < 1e-9);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = Coordinates::new(0.0, 0.0);
        assert!((bearing_deg(origin, Coordinates::new(1.0, 0.0)) - 0.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(0.0, 1.0)) - 90.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(-1.0, 0.0)) - 180.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(0.0, -1.0)) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_examples() {
        assert!(angles_opposite(90.0, 270.0, 5.0));
        assert!(angles_opposite(270.0, 90.0, 5.0));
        assert!(angles_opposite(358.0, 182.0, 5.0));
        assert!(angles_opposite(2.0, 178.0, 5.0));
        assert!(angles_opposite(0.0, 184.9, 5.0));
        assert!(!angles_opposite(0.0, 186.0, 5.0));
        assert!(!angles_opposite(45.0, 45.0, 5.0));
        // 4 degrees apart across north: nearly parallel, so never opposite.
        assert!(!angles_opposite(358.0, 2.0, 5.0));
        assert!(!angles_opposite(f64::NAN, 180.0, 5.0));
    }

    #[test]
    fn distance_tolerance() {
        let m = |v| Measure::new(v, "METRE");
        assert!(distances_match(&m(50.0), &m(52.0), 0.05, 0.01));
        assert!(!distances_match(&m(50.0), &m(55.0), 0.05, 0.01));
        assert!(distances_match(&m(0.0), &m(0.005), 0.05, 0.01));
        assert!(!distances_match(&m(0.0), &m(0.05), 0.05, 0.01));
    }

    #[test]
    fn distance_unit_mismatch_never_matches() {
        let a = Measure::new(50.0, "METRE");
        let b = Measure::new(50.0, "FOOT");
        assert!(!distances_match(&a, &b, 0.05, 0.01));
    }

    #[test]
    fn squared_delta_rounds_to_five_decimals() {
        let a = Coordinates::new(35.000001, -106.0);
        let b = Coordinates::new(35.000004, -106.0);
        assert_eq!(squared_coordinate_delta(a, b), 0.0);
        let c = Coordinates::new(35.00050, -106.00050);
        assert_eq!(squared_coordinate_delta(Coordinates::new(35.0, -106.0), c), 5000.0);
    }

    proptest! {
        #[test]
        fn opposite_heading_is_always_opposite(a in -720.0f64..720.0) {
            prop_assert!(angles_opposite(a, a + 180.0, 5.0));
            prop_assert!(angles_opposite(a + 180.0, a, 5.0));
        }

        #[test]
        fn same_heading_is_never_opposite(a in -720.0f64..720.0) {
            prop_assert!(!angles_opposite(a, a, 5.0));
        }

        #[test]
        fn angular_difference_is_bounded(a in -720.0f64..720.0, b in -720.0f64..720.0) {
            let d = angular_difference(a, b);
            prop_assert!((0.0..=180.0).contains(&d));
        }
    }
}
