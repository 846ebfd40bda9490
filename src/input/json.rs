use anyhow::{Context, Result};
use crate::core::VehicleData;

/// Parse a route in the vehicle backend's JSON shape:
/// `{"defaultLocation": {...}, "routeData": [{"latitude": .., "longitude": ..}, ..]}`
pub fn parse_json(data: &[u8]) -> Result<VehicleData> {
    serde_json::from_slice(data).context("Invalid vehicle data JSON")
}
