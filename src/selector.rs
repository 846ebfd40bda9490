use crate::core::{locate, Route, Waypoint, DEFAULT_TOLERANCE};
use crate::error::SelectError;
use crate::playback::{PlaybackEvent, PlaybackSession, PlaybackSnapshot};
use crate::provider::file::DEFAULT_ROUTE_NAME;
use crate::provider::{DataProvider, SettingsStore, SELECTED_ROUTE_KEY};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Switches the active route and remembers the choice across runs
pub struct RouteSelector {
    provider: Arc<dyn DataProvider>,
    store: Arc<dyn SettingsStore>,
    session: Arc<PlaybackSession>,
    /// Request numbers handed to the session with each load
    tickets: AtomicU64,
    /// Keeps select + fetch pairs from interleaving on the provider
    provider_lock: Mutex<()>,
}

impl RouteSelector {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        store: Arc<dyn SettingsStore>,
        session: Arc<PlaybackSession>,
    ) -> Self {
        Self {
            provider,
            store,
            session,
            tickets: AtomicU64::new(0),
            provider_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// Route name persisted by a previous selection
    pub fn last_selected(&self) -> Option<String> {
        self.store.get(SELECTED_ROUTE_KEY)
    }

    /// Routes the provider can serve, empty if it cannot be listed
    pub async fn available_routes(&self) -> Vec<String> {
        match self.provider.list_routes().await {
            Ok(names) => names,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Failed to list routes");
                Vec::new()
            }
        }
    }

    /// Switch to `name`, persist it and load it into the session.
    ///
    /// On failure the session keeps its current route and state.
    pub async fn select_route(&self, name: &str) -> Result<PlaybackSnapshot, SelectError> {
        self.select(name, true).await
    }

    /// Start-up path: re-select the persisted route, or load whatever the
    /// provider currently serves when nothing was persisted.
    pub async fn restore(&self) -> Result<PlaybackSnapshot, SelectError> {
        match self.last_selected() {
            Some(name) => {
                info!(route = %name, "Restoring last selected route");
                match self.select(&name, false).await {
                    Ok(snapshot) => Ok(snapshot),
                    Err(e) => {
                        warn!(route = %name, error = %e, "Falling back to provider default route");
                        self.load_current().await
                    }
                }
            }
            None => self.load_current().await,
        }
    }

    /// Load the provider's current data without changing its selection
    pub async fn load_current(&self) -> Result<PlaybackSnapshot, SelectError> {
        let ticket = self.next_ticket();
        let fetched = {
            let _guard = self.provider_lock.lock().await;
            self.provider.get_vehicle_data().await
        };

        let data = match fetched {
            Ok(data) => data,
            Err(source) => {
                error!(provider = self.provider.name(), error = %source, "Error fetching vehicle data");
                self.session.emit(PlaybackEvent::DataFetchFailed {
                    reason: source.to_string(),
                });
                return Err(SelectError::Fetch {
                    name: DEFAULT_ROUTE_NAME.to_string(),
                    source,
                });
            }
        };

        let route = match Route::new(DEFAULT_ROUTE_NAME, data.route_data) {
            Ok(route) => route,
            Err(e) => {
                let e = SelectError::from(e);
                self.report_failure(DEFAULT_ROUTE_NAME, &e);
                return Err(e);
            }
        };
        check_default_location(&route, data.default_location);
        self.apply(route, ticket, false).await
    }

    async fn select(&self, name: &str, persist: bool) -> Result<PlaybackSnapshot, SelectError> {
        let ticket = self.next_ticket();
        info!(route = name, ticket, "Selecting route");

        let route = match self.fetch_route(name).await {
            Ok(route) => route,
            Err(e) => {
                self.report_failure(name, &e);
                return Err(e);
            }
        };
        self.apply(route, ticket, persist).await
    }

    async fn fetch_route(&self, name: &str) -> Result<Route, SelectError> {
        let _guard = self.provider_lock.lock().await;

        self.provider
            .select_route(name)
            .await
            .map_err(|source| SelectError::Provider {
                name: name.to_string(),
                source,
            })?;

        let data = self
            .provider
            .get_vehicle_data()
            .await
            .map_err(|source| SelectError::Fetch {
                name: name.to_string(),
                source,
            })?;

        let route = Route::new(name, data.route_data)?;
        check_default_location(&route, data.default_location);
        Ok(route)
    }

    async fn apply(
        &self,
        route: Route,
        ticket: u64,
        persist: bool,
    ) -> Result<PlaybackSnapshot, SelectError> {
        let name = route.name().to_string();
        let Some(snapshot) = self
            .session
            .load_route_stamped(Arc::new(route), Some(ticket))
            .await?
        else {
            debug!(route = %name, ticket, "Route selection superseded");
            return Err(SelectError::Superseded { name });
        };

        if persist {
            self.persist(&name).await;
        }
        info!(route = %name, "Route changed");
        Ok(snapshot)
    }

    /// Save the selection on the blocking pool
    async fn persist(&self, name: &str) {
        let store = self.store.clone();
        let value = name.to_string();
        let written =
            tokio::task::spawn_blocking(move || store.set(SELECTED_ROUTE_KEY, &value)).await;
        match written {
            Ok(Ok(())) => debug!(route = name, "Selected route saved"),
            Ok(Err(e)) => warn!(route = name, error = %e, "Failed to persist selected route"),
            Err(e) => warn!(route = name, error = %e, "Settings write task failed"),
        }
    }

    fn report_failure(&self, name: &str, error: &SelectError) {
        error!(route = name, error = %error, "Error updating route");
        if let SelectError::Fetch { source, .. } = error {
            self.session.emit(PlaybackEvent::DataFetchFailed {
                reason: source.to_string(),
            });
        }
        self.session.emit(PlaybackEvent::RouteLoadFailed {
            name: name.to_string(),
            reason: failure_reason(error),
        });
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn failure_reason(error: &SelectError) -> String {
    match error {
        SelectError::Provider { source, .. } | SelectError::Fetch { source, .. } => {
            format!("{error}: {source}")
        }
        other => other.to_string(),
    }
}

fn check_default_location(route: &Route, default_location: Waypoint) {
    if locate(route, default_location, DEFAULT_TOLERANCE).is_none() {
        debug!(
            route = route.name(),
            %default_location,
            "Provider default location is not on the route, starting at the first waypoint"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::core::VehicleData;
    use crate::error::ProviderError;
    use crate::playback::PlaybackStatus;
    use crate::provider::{JsonSettingsStore, MemoryStore, MockDataProvider, MockGeocoder};
    use std::time::Duration;
    use tokio::sync::broadcast;

    struct Fixture {
        provider: Arc<MockDataProvider>,
        store: Arc<MemoryStore>,
        selector: Arc<RouteSelector>,
    }

    fn fixture(provider: MockDataProvider) -> Fixture {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(PlaybackSession::spawn(
            &SimConfig::default(),
            Arc::new(MockGeocoder::new()),
        ));
        let selector = Arc::new(RouteSelector::new(provider.clone(), store.clone(), session));
        Fixture { provider, store, selector }
    }

    fn drain(events: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_select_persists_and_loads() {
        let f = fixture(MockDataProvider::demo());

        let snap = f.selector.select_route("Route 1").await.unwrap();
        assert_eq!(snap.route_name(), Some("Route 1"));
        assert_eq!(snap.status, PlaybackStatus::Stopped);
        assert_eq!(snap.current_index, 0);
        assert_eq!(f.store.get(SELECTED_ROUTE_KEY).as_deref(), Some("Route 1"));
        assert_eq!(f.provider.selected(), "Route 1");
    }

    #[tokio::test]
    async fn test_unknown_route_keeps_state() {
        let f = fixture(MockDataProvider::demo());
        let session = f.selector.session().clone();
        f.selector.select_route("Route 2").await.unwrap();
        session.set_step_size(3).await.unwrap();
        let before = session.snapshot();
        let mut events = session.events();

        let err = f.selector.select_route("Route 99").await.unwrap_err();
        assert!(matches!(
            err,
            SelectError::Provider { source: ProviderError::UnknownRoute(_), .. }
        ));

        let after = session.snapshot();
        assert_eq!(after.route_name(), Some("Route 2"));
        assert_eq!(after.step_size, before.step_size);
        assert_eq!(after.current_index, before.current_index);
        assert_eq!(f.store.get(SELECTED_ROUTE_KEY).as_deref(), Some("Route 2"));
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, PlaybackEvent::RouteLoadFailed { name, .. } if name == "Route 99")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_stops_movement() {
        let f = fixture(MockDataProvider::demo());
        let session = f.selector.session().clone();
        f.selector.select_route("Route 1").await.unwrap();
        session.toggle_movement().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.snapshot().current_index, 2);

        let snap = f.selector.select_route("Route 3").await.unwrap();
        assert_eq!(snap.status, PlaybackStatus::Stopped);
        assert_eq!(snap.progress_percent, 0.0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(session.snapshot().current_index, 0);
    }

    #[tokio::test]
    async fn test_restore_persisted_route() {
        let f = fixture(MockDataProvider::demo());
        f.store.set(SELECTED_ROUTE_KEY, "Route 3").unwrap();

        let snap = f.selector.restore().await.unwrap();
        assert_eq!(snap.route_name(), Some("Route 3"));
        assert_eq!(f.provider.selected(), "Route 3");
    }

    #[tokio::test]
    async fn test_restore_without_history_loads_default() {
        let f = fixture(MockDataProvider::demo());

        let snap = f.selector.restore().await.unwrap();
        assert_eq!(snap.route_name(), Some(DEFAULT_ROUTE_NAME));
        assert_eq!(f.store.get(SELECTED_ROUTE_KEY), None);
    }

    #[tokio::test]
    async fn test_restore_falls_back_when_route_is_gone() {
        let f = fixture(MockDataProvider::demo());
        f.store.set(SELECTED_ROUTE_KEY, "Deleted Route").unwrap();

        let snap = f.selector.restore().await.unwrap();
        assert_eq!(snap.route_name(), Some(DEFAULT_ROUTE_NAME));
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_both_conditions() {
        let f = fixture(MockDataProvider::demo());
        let session = f.selector.session().clone();
        f.selector.select_route("Route 1").await.unwrap();
        let mut events = session.events();

        f.provider.set_fail_fetch(true);
        let err = f.selector.select_route("Route 2").await.unwrap_err();
        assert!(matches!(err, SelectError::Fetch { .. }));
        assert_eq!(session.snapshot().route_name(), Some("Route 1"));

        let seen = drain(&mut events);
        assert!(seen.iter().any(|e| matches!(e, PlaybackEvent::DataFetchFailed { .. })));
        assert!(seen.iter().any(|e| matches!(e, PlaybackEvent::RouteLoadFailed { .. })));
    }

    #[tokio::test]
    async fn test_empty_route_is_rejected() {
        let provider = MockDataProvider::demo();
        provider.insert_vehicle_data(
            "Empty",
            VehicleData {
                default_location: Waypoint::new(0.0, 0.0),
                route_data: Vec::new(),
            },
        );
        let f = fixture(provider);
        f.selector.select_route("Route 1").await.unwrap();

        let err = f.selector.select_route("Empty").await.unwrap_err();
        assert!(matches!(err, SelectError::Route(_)));
        assert_eq!(f.selector.session().snapshot().route_name(), Some("Route 1"));
        assert_eq!(f.store.get(SELECTED_ROUTE_KEY).as_deref(), Some("Route 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_selections_end_on_latest() {
        let f = fixture(MockDataProvider::demo().with_latency(Duration::from_millis(200)));

        let first = {
            let selector = f.selector.clone();
            tokio::spawn(async move { selector.select_route("Route 1").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let selector = f.selector.clone();
            tokio::spawn(async move { selector.select_route("Route 2").await })
        };

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert!(first.is_ok() || matches!(first, Err(SelectError::Superseded { .. })));
        assert!(second.is_ok());
        assert_eq!(f.selector.session().snapshot().route_name(), Some("Route 2"));
        assert_eq!(f.store.get(SELECTED_ROUTE_KEY).as_deref(), Some("Route 2"));
    }

    #[tokio::test]
    async fn test_selection_survives_restart_with_json_store() {
        let dir = std::env::temp_dir().join(format!("routesim-selector-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("settings.json");

        let selector = RouteSelector::new(
            Arc::new(MockDataProvider::demo()),
            Arc::new(JsonSettingsStore::open(&path)),
            Arc::new(PlaybackSession::spawn(&SimConfig::default(), Arc::new(MockGeocoder::new()))),
        );
        selector.select_route("Route 2").await.unwrap();
        selector.session().shutdown().await;

        // a fresh run restores from the file written above
        let restarted = RouteSelector::new(
            Arc::new(MockDataProvider::demo()),
            Arc::new(JsonSettingsStore::open(&path)),
            Arc::new(PlaybackSession::spawn(&SimConfig::default(), Arc::new(MockGeocoder::new()))),
        );
        assert_eq!(restarted.last_selected().as_deref(), Some("Route 2"));
        let snap = restarted.restore().await.unwrap();
        assert_eq!(snap.route_name(), Some("Route 2"));
        restarted.session().shutdown().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_available_routes() {
        let f = fixture(MockDataProvider::demo());
        assert_eq!(
            f.selector.available_routes().await,
            vec!["Route 1", "Route 2", "Route 3", DEFAULT_ROUTE_NAME]
        );
    }
}
