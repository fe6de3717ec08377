//! City data retrieval: shared store, then disk, then a fresh download.

pub mod progress;

pub use progress::{ProgressEvent, ProgressLog, ProgressReporter, Stage};

use anyhow::Result;
use std::time::Duration;
use thiserror::Error;

use crate::api::{MapSource, OsmMapSource};
use crate::cache::local::{decode_bundle, encode_bundle};
use crate::cache::{CacheError, CacheKey, LocalStore, SharedTier};
use crate::config::FileConfig;
use crate::domain::{Building, CityDataBundle, FetchParams, NoFlyZone};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load road network for city: {city} ({reason})")]
    NoRoadGraph { city: String, reason: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Fronts the map source with the two cache tiers
pub struct DataService {
    source: Box<dyn MapSource>,
    local: LocalStore,
    shared: SharedTier,
    progress: ProgressReporter,
}

impl DataService {
    pub fn new(source: Box<dyn MapSource>, local: LocalStore, shared: SharedTier) -> Self {
        Self {
            source,
            local,
            shared,
            progress: ProgressReporter::new(),
        }
    }

    /// Build the production service: OSM source, disk cache, redis
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        let source = OsmMapSource::from_config(config)?;
        let local = LocalStore::open(&config.cache_dir)?;
        let shared = SharedTier::redis(
            &config.redis_url,
            Duration::from_secs(config.shared_store_retry_secs),
        );
        Ok(Self::new(Box::new(source), local, shared))
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    pub fn shared_tier(&self) -> &SharedTier {
        &self.shared
    }

    /// Register an observer notified of every request's progress
    pub fn add_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.progress.add_callback(callback);
    }

    fn update_progress(&self, request: &ProgressReporter, stage: Stage, percentage: u8, message: &str) {
        self.progress.update(stage, percentage, message);
        request.update(stage, percentage, message);
    }

    /// Return the bundle for a city, from cache when possible.
    ///
    /// Lookup order is shared store, local file, then a full download. A
    /// cached bundle built with different `params` counts as a miss.
    pub fn get_city_data(
        &self,
        city_name: &str,
        params: &FetchParams,
        progress: &ProgressReporter,
    ) -> Result<CityDataBundle, FetchError> {
        let city_name = city_name.trim();
        let key = CacheKey::for_city(city_name);

        if let Some(bundle) = self.from_shared(&key, params) {
            self.update_progress(progress, Stage::Cache, 100, "Loaded from shared cache");
            return Ok(bundle);
        }

        if let Some(bundle) = self.from_local(&key, params) {
            self.update_progress(progress, Stage::Cache, 100, "Loaded from disk cache");
            return Ok(bundle);
        }

        self.download_city_data(city_name, params, progress)
    }

    fn from_shared(&self, key: &CacheKey, params: &FetchParams) -> Option<CityDataBundle> {
        let blob = self.shared.get(&key.shared_key())?;
        match decode_bundle(&blob) {
            Ok(bundle) if bundle.params == *params => Some(bundle),
            Ok(bundle) => {
                tracing::debug!(key = key.as_str(), cached = ?bundle.params, "shared cache entry has other params");
                None
            }
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "unreadable bundle in shared store");
                None
            }
        }
    }

    fn from_local(&self, key: &CacheKey, params: &FetchParams) -> Option<CityDataBundle> {
        match self.local.load(key) {
            Ok(Some(bundle)) if bundle.params == *params => Some(bundle),
            Ok(Some(bundle)) => {
                tracing::debug!(key = key.as_str(), cached = ?bundle.params, "disk cache entry has other params");
                None
            }
            Ok(None) => None,
            Err(e @ CacheError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "corrupt cache file, reloading data");
                if let Err(e) = self.local.remove(key) {
                    tracing::warn!(error = %e, "failed to delete corrupt cache file");
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cache file");
                None
            }
        }
    }

    /// Download a city's data and store it in both tiers
    pub fn download_city_data(
        &self,
        city_name: &str,
        params: &FetchParams,
        progress: &ProgressReporter,
    ) -> Result<CityDataBundle, FetchError> {
        self.update_progress(progress, Stage::Download, 0, "Starting data download");

        match self.fetch_and_store(city_name, params, progress) {
            Ok(bundle) => Ok(bundle),
            Err(e) => {
                self.update_progress(progress, Stage::Error, 0, &format!("Error: {}", e));
                tracing::error!(city = city_name, error = %e, "failed to load city data");
                Err(e)
            }
        }
    }

    fn fetch_and_store(
        &self,
        city_name: &str,
        params: &FetchParams,
        progress: &ProgressReporter,
    ) -> Result<CityDataBundle, FetchError> {
        self.update_progress(progress, Stage::Download, 20, "Loading road network");

        let mut road_graph = None;
        let mut last_failure = String::from("empty road graph");
        // Only the raw name is queried
        for query in [city_name] {
            match self.source.road_graph(query, params) {
                Ok(graph) if !graph.is_empty() => {
                    tracing::info!(
                        query,
                        nodes = graph.node_count(),
                        edges = graph.edge_count(),
                        "loaded road network"
                    );
                    road_graph = Some(graph);
                    break;
                }
                Ok(_) => {
                    tracing::warn!(query, "road network query returned no nodes");
                }
                Err(e) => {
                    tracing::warn!(query, error = %e, "failed to load road network");
                    last_failure = format!("{:#}", e);
                }
            }
        }

        let road_graph = road_graph.ok_or_else(|| FetchError::NoRoadGraph {
            city: city_name.to_string(),
            reason: last_failure,
        })?;

        self.update_progress(progress, Stage::Download, 50, "Loading buildings");
        let buildings: Vec<Building> = match self.source.buildings(city_name) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(city = city_name, error = %e, "failed to load buildings");
                Vec::new()
            }
        };

        self.update_progress(progress, Stage::Download, 80, "Loading no-fly zones");
        let no_fly_zones = self.no_fly_zones(city_name);

        let bundle = CityDataBundle::new(city_name, *params, road_graph, buildings, no_fly_zones);

        self.update_progress(progress, Stage::Download, 90, "Saving to cache");
        let key = CacheKey::for_city(city_name);
        self.local.save(&key, &bundle)?;
        match encode_bundle(&bundle) {
            Ok(blob) => {
                if !self.shared.set(&key.shared_key(), &blob) && self.shared.is_configured() {
                    tracing::warn!(key = key.as_str(), "city data not saved to shared store");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode bundle for shared store"),
        }

        self.update_progress(progress, Stage::Download, 100, "Data loaded");
        Ok(bundle)
    }

    fn no_fly_zones(&self, _city_name: &str) -> Vec<NoFlyZone> {
        Vec::new()
    }
}
