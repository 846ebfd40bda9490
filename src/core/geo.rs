use crate::core::Waypoint;

/// Mean Earth radius in metres
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Initial great-circle bearing from `start` to `end`, in degrees [0, 360).
///
/// Identical points give 0.0 (`atan2(0, 0)`). NaN inputs propagate.
pub fn bearing(start: Waypoint, end: Waypoint) -> f64 {
    let lat1 = start.latitude.to_radians();
    let lat2 = end.latitude.to_radians();
    let delta_lon = (end.longitude - start.longitude).to_radians();

    let x = delta_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    let degrees = x.atan2(y).to_degrees();
    let normalized = (degrees + 360.0) % 360.0;
    // -0.0 and rounding up to 360.0 both belong to 0
    if normalized == 0.0 || normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Haversine distance between two points in metres
pub fn distance_m(a: Waypoint, b: Waypoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
