use async_trait::async_trait;
use crate::core::{VehicleData, Waypoint};
use crate::error::ProviderError;
use crate::provider::file::DEFAULT_ROUTE_NAME;
use crate::provider::interface::{DataProvider, Geocoder, ProviderResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory data provider for tests and demos
///
/// Serves routes from a map, with optional latency and injectable failures.
pub struct MockDataProvider {
    routes: Mutex<HashMap<String, VehicleData>>,
    selected: Mutex<String>,
    latency: Option<Duration>,
    fail_fetch: AtomicBool,
    fetch_count: AtomicUsize,
}

impl Default for MockDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataProvider {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            selected: Mutex::new(DEFAULT_ROUTE_NAME.to_string()),
            latency: None,
            fail_fetch: AtomicBool::new(false),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Provider with a default route and three alternates around Hyderabad
    pub fn demo() -> Self {
        let provider = Self::new();
        let center = Waypoint::new(17.385044, 78.486671);
        let legs = [
            (DEFAULT_ROUTE_NAME, 0.0),
            ("Route 1", 45.0),
            ("Route 2", 160.0),
            ("Route 3", 290.0),
        ];

        for (name, heading) in legs {
            let theta = f64::to_radians(heading);
            let points: Vec<Waypoint> = (0..40)
                .map(|i| {
                    let step = i as f64 * 0.0004;
                    // gentle curve so headings change along the way
                    let drift = (i as f64 / 8.0).sin() * 0.0003;
                    Waypoint::new(
                        center.latitude + step * theta.cos() - drift * theta.sin(),
                        center.longitude + step * theta.sin() + drift * theta.cos(),
                    )
                })
                .collect();
            provider.insert_route(name, points);
        }
        provider
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add or replace a route; its first point becomes the default location
    pub fn insert_route(&self, name: &str, points: Vec<Waypoint>) {
        let default_location = points.first().copied().unwrap_or(Waypoint::new(0.0, 0.0));
        self.insert_vehicle_data(
            name,
            VehicleData {
                default_location,
                route_data: points,
            },
        );
    }

    pub fn insert_vehicle_data(&self, name: &str, data: VehicleData) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(name.to_string(), data);
        }
    }

    /// Make every `get_vehicle_data` call fail
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_vehicle_data` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn selected(&self) -> String {
        self.selected.lock().map(|s| s.clone()).unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DataProvider for MockDataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_vehicle_data(&self) -> ProviderResult<VehicleData> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("mock fetch failure".to_string()));
        }

        let selected = self.selected();
        let routes = self
            .routes
            .lock()
            .map_err(|_| ProviderError::Unavailable("route table poisoned".to_string()))?;
        routes
            .get(&selected)
            .cloned()
            .ok_or(ProviderError::UnknownRoute(selected))
    }

    async fn select_route(&self, route_name: &str) -> ProviderResult<()> {
        self.simulate_latency().await;

        let known = self
            .routes
            .lock()
            .map(|routes| routes.contains_key(route_name))
            .unwrap_or(false);
        if !known {
            return Err(ProviderError::UnknownRoute(route_name.to_string()));
        }
        if let Ok(mut selected) = self.selected.lock() {
            *selected = route_name.to_string();
        }
        Ok(())
    }

    async fn list_routes(&self) -> ProviderResult<Vec<String>> {
        let mut names: Vec<String> = self
            .routes
            .lock()
            .map(|routes| routes.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }
}

/// Geocoder double with injectable failures and latency
#[derive(Default)]
pub struct MockGeocoder {
    latency: Option<Duration>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Address the mock returns for `coords`
    pub fn address_for(coords: Waypoint) -> String {
        format!("Near {}", coords)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn reverse_geocode(&self, coords: Waypoint) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("mock geocoder offline".to_string()));
        }
        Ok(Self::address_for(coords))
    }
}
