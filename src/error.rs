use thiserror::Error;

/// A route could not be built from provider data
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {name:?} has no waypoints")]
    Empty { name: String },
    #[error("route {name:?} has a non-finite coordinate at index {index}")]
    InvalidWaypoint { name: String, index: usize },
}

/// Failures reported by a data provider or geocoder
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown route {0:?}")]
    UnknownRoute(String),
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed vehicle data: {0:#}")]
    Malformed(anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write settings to {path:?}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

/// The playback task is gone
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("playback session has shut down")]
    Closed,
}

/// Why a route selection was aborted
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("failed to select route {name:?}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },
    #[error("failed to fetch vehicle data for route {name:?}")]
    Fetch {
        name: String,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("selection of {name:?} was superseded by a newer request")]
    Superseded { name: String },
    #[error(transparent)]
    Session(#[from] SessionError),
}
