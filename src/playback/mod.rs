pub mod engine;
pub mod session;

pub use engine::{PlaybackEngine, TickOutcome};
pub use session::PlaybackSession;

use crate::core::{Route, Waypoint};
use serde::Serialize;
use std::sync::Arc;

/// Smallest number of waypoints advanced per tick
pub const MIN_STEP_SIZE: usize = 1;
/// Largest number of waypoints advanced per tick
pub const MAX_STEP_SIZE: usize = 5;

/// Placeholder shown when reverse geocoding fails
pub const ADDRESS_PLACEHOLDER: &str = "Address not available";

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    /// No route loaded
    Idle,
    /// Route loaded, not advancing
    Stopped,
    /// Advancing on every tick
    Running,
}

/// Where the vehicle is right now, as shown to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentPosition {
    pub coords: Waypoint,
    pub heading_degrees: f64,
    /// e.g. "Oct 16, 14:05"
    pub timestamp_label: String,
    /// Reverse-geocoded address, `None` while the lookup is in flight
    pub address: Option<String>,
}

/// Read-only view of a session, published after every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub current_index: usize,
    pub step_size: usize,
    pub progress_percent: f64,
    pub heading_degrees: f64,
    pub position: Option<CurrentPosition>,
    /// Full path for rendering
    pub route: Option<Arc<Route>>,
    /// Total route length in metres
    pub route_length_m: f64,
}

impl PlaybackSnapshot {
    pub fn idle(step_size: usize) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_index: 0,
            step_size,
            progress_percent: 0.0,
            heading_degrees: 0.0,
            position: None,
            route: None,
            route_length_m: 0.0,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.status == PlaybackStatus::Running
    }

    pub fn route_name(&self) -> Option<&str> {
        self.route.as_deref().map(Route::name)
    }
}

/// Conditions surfaced to observers besides the snapshot itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlaybackEvent {
    RouteLoaded { name: String, waypoints: usize },
    Started,
    Stopped,
    Restarted,
    Advanced { from: usize, to: usize, heading_degrees: f64, progress_percent: f64 },
    ReachedEnd { index: usize },
    /// The last known position matched no waypoint
    LostPosition { target: Waypoint, misses: u32 },
    /// Recovery after repeated lost-position ticks
    PositionResynced { index: usize },
    GeocodeFailed { coords: Waypoint, reason: String },
    RouteLoadFailed { name: String, reason: String },
    DataFetchFailed { reason: String },
}
