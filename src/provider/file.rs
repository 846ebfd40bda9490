use async_trait::async_trait;
use crate::core::VehicleData;
use crate::error::ProviderError;
use crate::input::parse_route;
use crate::provider::interface::{DataProvider, ProviderResult};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Route selected before any `select_route` call
pub const DEFAULT_ROUTE_NAME: &str = "default";

const ROUTE_EXTENSIONS: [&str; 2] = ["json", "csv"];

/// Data provider backed by a directory of route files
///
/// Each route lives in `<dir>/<name>.json` or `<dir>/<name>.csv`.
pub struct FileDataProvider {
    root: PathBuf,
    selected: Mutex<String>,
}

impl FileDataProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            selected: Mutex::new(DEFAULT_ROUTE_NAME.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Currently selected route name
    pub async fn selected(&self) -> String {
        self.selected.lock().await.clone()
    }

    async fn resolve(&self, route_name: &str) -> ProviderResult<PathBuf> {
        if route_name.is_empty()
            || route_name.contains(['/', '\\'])
            || route_name.starts_with('.')
        {
            return Err(ProviderError::UnknownRoute(route_name.to_string()));
        }

        for ext in ROUTE_EXTENSIONS {
            let path = self.root.join(format!("{route_name}.{ext}"));
            if tokio::fs::try_exists(&path).await? {
                return Ok(path);
            }
        }
        Err(ProviderError::UnknownRoute(route_name.to_string()))
    }
}

#[async_trait]
impl DataProvider for FileDataProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_vehicle_data(&self) -> ProviderResult<VehicleData> {
        let route_name = self.selected().await;
        let path = self.resolve(&route_name).await?;
        debug!(route = %route_name, path = ?path, "Reading route file");

        let data = tokio::fs::read(&path).await?;
        parse_route(&data).map_err(ProviderError::Malformed)
    }

    async fn select_route(&self, route_name: &str) -> ProviderResult<()> {
        let path = self.resolve(route_name).await?;
        info!(route = %route_name, path = ?path, "Route selected");
        *self.selected.lock().await = route_name.to_string();
        Ok(())
    }

    async fn list_routes(&self) -> ProviderResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ROUTE_EXTENSIONS.contains(&ext));
            if !known {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}
