//! Route playback simulation: moves a vehicle along a stored path on a
//! timer, tracking heading and progress, with switchable routes.

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod playback;
pub mod provider;
pub mod selector;

pub use crate::config::SimConfig;
pub use crate::core::{bearing, locate, Route, VehicleData, Waypoint};
pub use crate::error::{ProviderError, RouteError, SelectError, SessionError, StorageError};
pub use crate::playback::{PlaybackEvent, PlaybackSession, PlaybackSnapshot, PlaybackStatus};
pub use crate::selector::RouteSelector;
