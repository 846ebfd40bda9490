pub mod interface;
pub mod file;
pub mod geocoder;
pub mod mock;
pub mod storage;

pub use interface::{DataProvider, Geocoder, ProviderResult, SettingsStore, SELECTED_ROUTE_KEY};
pub use file::FileDataProvider;
pub use geocoder::CoordinateGeocoder;
pub use mock::{MockDataProvider, MockGeocoder};
pub use storage::{JsonSettingsStore, MemoryStore};
