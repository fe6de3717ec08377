use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const USER_AGENT: &str = "drone_route_planner";

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache_data")
}
fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}
fn default_shared_store_retry_secs() -> u64 {
    30
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Seconds to wait before re-probing a shared store that failed
    #[serde(default = "default_shared_store_retry_secs")]
    pub shared_store_retry_secs: u64,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub overpass: OverpassConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            redis_url: default_redis_url(),
            shared_store_retry_secs: default_shared_store_retry_secs(),
            bind: default_bind(),
            port: default_port(),
            overpass: OverpassConfig::default(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

fn default_overpass_urls() -> Vec<String> {
    vec![
        "https://overpass-api.de/api/interpreter".to_string(),
        "https://overpass.private.coffee/api/interpreter".to_string(),
        "https://maps.mail.ru/osm/tools/overpass/api/interpreter".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverpassConfig {
    #[serde(default = "default_overpass_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            urls: default_overpass_urls(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}
fn default_geocoding_timeout_secs() -> u64 {
    10
}
fn default_reverse_min_delay_ms() -> u64 {
    1000
}
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "nominatim".to_string(),
            url: "https://nominatim.openstreetmap.org".to_string(),
        },
        ProviderConfig {
            name: "nominatim_ru".to_string(),
            url: "https://nominatim.openstreetmap.org".to_string(),
        },
    ]
}

/// A Nominatim-compatible geocoding endpoint
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    /// Base URL; `/search` and `/reverse` are appended
    pub url: String,
}

/// Extra entry for the city bounding-box table
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CityBoundsConfig {
    /// Lowercase fragment matched against the city name
    pub name: String,
    pub lat: (f64, f64),
    pub lon: (f64, f64),
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocoding_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between reverse lookups (Nominatim ToS)
    #[serde(default = "default_reverse_min_delay_ms")]
    pub reverse_min_delay_ms: u64,
    /// Tried in order by the forward geocoding chain; the first one also
    /// serves reverse lookups
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub city_bounds: Vec<CityBoundsConfig>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_geocoding_timeout_secs(),
            reverse_min_delay_ms: default_reverse_min_delay_ms(),
            providers: default_providers(),
            city_bounds: Vec::new(),
        }
    }
}

impl FileConfig {
    /// Search the usual locations and return the first config that parses
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                    }
                }
            }
        }
        None
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Apply `REDIS_URL` and `PORT` from the environment
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("REDIS_URL")
            && !url.trim().is_empty()
        {
            self.redis_url = url;
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.trim().parse() {
                Ok(p) => self.port = p,
                Err(_) => tracing::warn!(port = %port, "ignoring invalid PORT"),
            }
        }
        self
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("citygraph.toml"));
    paths.push(PathBuf::from(".citygraph.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("citygraph").join("config.toml"));
        paths.push(config_dir.join("citygraph.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".citygraph.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("cache_data"));
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.port, 8000);
        assert_eq!(config.overpass.max_retries, 3);
        assert_eq!(config.geocoding.providers.len(), 2);
        assert_eq!(config.geocoding.providers[0].name, "nominatim");
    }

    #[test]
    fn test_partial_config() {
        let config: FileConfig = toml::from_str(
            r#"
            cache_dir = "/tmp/cities"
            shared_store_retry_secs = 5

            [overpass]
            urls = ["http://localhost:12345/api/interpreter"]

            [[geocoding.city_bounds]]
            name = "kazan"
            lat = [55.6, 55.95]
            lon = [48.8, 49.4]
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cities"));
        assert_eq!(config.shared_store_retry_secs, 5);
        assert_eq!(config.overpass.urls.len(), 1);
        assert_eq!(config.overpass.timeout_secs, 200);
        assert_eq!(config.geocoding.city_bounds[0].name, "kazan");
        assert_eq!(config.geocoding.city_bounds[0].lat, (55.6, 55.95));
    }
}
