use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::geo;
use crate::error::RouteError;

/// A single latitude/longitude sample, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

impl From<(f64, f64)> for Waypoint {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self { latitude, longitude }
    }
}

/// Payload returned by a data provider for the currently selected route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleData {
    /// Where the vehicle is parked before playback starts
    pub default_location: Waypoint,
    /// Ordered waypoints of the route
    pub route_data: Vec<Waypoint>,
}

/// A named, ordered and non-empty sequence of waypoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    name: String,
    waypoints: Vec<Waypoint>,
}

impl Route {
    /// Build a route, rejecting empty paths and non-finite coordinates
    pub fn new(name: impl Into<String>, waypoints: Vec<Waypoint>) -> Result<Self, RouteError> {
        let name = name.into();
        if waypoints.is_empty() {
            return Err(RouteError::Empty { name });
        }
        if let Some(index) = waypoints.iter().position(|w| !w.is_finite()) {
            return Err(RouteError::InvalidWaypoint { name, index });
        }
        Ok(Self { name, waypoints })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Never true for a constructed route
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Waypoint> {
        self.waypoints.get(index).copied()
    }

    pub fn start(&self) -> Waypoint {
        self.waypoints[0]
    }

    pub fn last_index(&self) -> usize {
        self.waypoints.len() - 1
    }

    /// Bearing of every consecutive leg, used for direction markers
    pub fn segment_bearings(&self) -> Vec<f64> {
        self.waypoints
            .windows(2)
            .map(|leg| geo::bearing(leg[0], leg[1]))
            .collect()
    }

    /// Total path length in metres
    pub fn length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|leg| geo::distance_m(leg[0], leg[1]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_rejects_empty() {
        let err = Route::new("nowhere", Vec::new()).unwrap_err();
        assert!(matches!(err, RouteError::Empty { .. }));
    }

    #[test]
    fn test_route_rejects_nan() {
        let points = vec![Waypoint::new(1.0, 1.0), Waypoint::new(f64::NAN, 2.0)];
        let err = Route::new("bad", points).unwrap_err();
        assert!(matches!(err, RouteError::InvalidWaypoint { index: 1, .. }));
    }

    #[test]
    fn test_segment_bearings() {
        let route = Route::new(
            "east",
            vec![(0.0, 0.0).into(), (0.0, 1.0).into(), (1.0, 1.0).into()],
        )
        .unwrap();

        assert!(!route.is_empty());
        let bearings = route.segment_bearings();
        assert_eq!(bearings.len(), 2);
        assert!((bearings[0] - 90.0).abs() < 1e-9);
        assert!(bearings[1].abs() < 1e-9);
    }

    #[test]
    fn test_vehicle_data_wire_format() {
        let json = r#"{
            "defaultLocation": {"latitude": 17.385044, "longitude": 78.486671},
            "routeData": [
                {"latitude": 17.385044, "longitude": 78.486671},
                {"latitude": 17.385500, "longitude": 78.487000}
            ]
        }"#;

        let data: VehicleData = serde_json::from_str(json).unwrap();
        assert_eq!(data.route_data.len(), 2);
        assert_eq!(data.default_location, Waypoint::new(17.385044, 78.486671));
    }
}
