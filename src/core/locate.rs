use crate::core::{Route, Waypoint};

/// Default coordinate tolerance in degrees (roughly 11 m)
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Find the first waypoint of `route` within `tolerance` of `target`.
///
/// Latitude and longitude are compared independently and each must differ by
/// strictly less than `tolerance`. Returns `None` when nothing matches.
pub fn locate(route: &Route, target: Waypoint, tolerance: f64) -> Option<usize> {
    route.waypoints().iter().position(|point| {
        (point.latitude - target.latitude).abs() < tolerance
            && (point.longitude - target.longitude).abs() < tolerance
    })
}
