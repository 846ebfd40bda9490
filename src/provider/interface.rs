use async_trait::async_trait;
use crate::core::{VehicleData, Waypoint};
use crate::error::{ProviderError, StorageError};

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Settings key holding the last selected route name
pub const SELECTED_ROUTE_KEY: &str = "selectedRoute";

/// Source of route data
///
/// Implementations:
/// - `FileDataProvider` reads one file per route from a directory
/// - `MockDataProvider` serves in-memory routes for tests and demos
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Vehicle data for the currently selected route
    async fn get_vehicle_data(&self) -> ProviderResult<VehicleData>;

    /// Make `route_name` the current selection
    async fn select_route(&self, route_name: &str) -> ProviderResult<()>;

    /// Names of the routes this provider can serve
    async fn list_routes(&self) -> ProviderResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Reverse geocoding of coordinates into a display address
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, coords: Waypoint) -> ProviderResult<String>;
}

/// Process-local key/value persistence
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
