pub mod waypoint;
pub mod geo;
pub mod locate;

pub use waypoint::{Route, VehicleData, Waypoint};
pub use geo::{bearing, distance_m};
pub use locate::{locate, DEFAULT_TOLERANCE};
