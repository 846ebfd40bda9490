use async_trait::async_trait;
use crate::core::Waypoint;
use crate::provider::interface::{Geocoder, ProviderResult};

/// Offline geocoder that labels a position with its coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateGeocoder;

#[async_trait]
impl Geocoder for CoordinateGeocoder {
    async fn reverse_geocode(&self, coords: Waypoint) -> ProviderResult<String> {
        let ns = if coords.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if coords.longitude >= 0.0 { 'E' } else { 'W' };
        Ok(format!(
            "{:.5}°{} {:.5}°{}",
            coords.latitude.abs(),
            ns,
            coords.longitude.abs(),
            ew
        ))
    }
}
