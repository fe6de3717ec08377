use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::nominatim::BoundingBox;
use crate::config::OverpassConfig;
use crate::domain::NetworkType;

/// Raw Overpass API response
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<Element>,
}

/// A single element from Overpass (node or way)
#[derive(Debug, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: u64,
    #[serde(default)]
    pub nodes: Option<Vec<u64>>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Overpass QL tag filter for a network type, modelled on OSMnx's filters
pub fn network_filter(network_type: NetworkType) -> &'static str {
    match network_type {
        NetworkType::Drive => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]["motor_vehicle"!~"no"]["motorcar"!~"no"]["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]["access"!~"private"]"#
        }
        NetworkType::DriveService => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|steps|track"]["motor_vehicle"!~"no"]["motorcar"!~"no"]["service"!~"emergency_access|parking|parking_aisle|private"]["access"!~"private"]"#
        }
        NetworkType::Walk => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|bus_guideway|construction|cycleway|motor|no|planned|platform|proposed|raceway|razed"]["foot"!~"no"]["service"!~"private"]["sidewalk"!~"separate"]["access"!~"private"]"#
        }
        NetworkType::Bike => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|bus_guideway|construction|corridor|elevator|escalator|footway|motor|no|planned|platform|proposed|raceway|razed|steps"]["bicycle"!~"no"]["service"!~"private"]["access"!~"private"]"#
        }
        NetworkType::All => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]["service"!~"private"]["access"!~"private"]"#
        }
        NetworkType::AllPrivate => {
            r#"["highway"]["area"!~"yes"]["highway"!~"abandoned|construction|no|planned|platform|proposed|raceway|razed"]"#
        }
    }
}

fn bbox_clause(bbox: &BoundingBox) -> String {
    format!(
        "({south},{west},{north},{east})",
        south = bbox.south,
        west = bbox.west,
        north = bbox.north,
        east = bbox.east
    )
}

/// Query for every highway way of a network type plus its nodes
pub fn roads_query(bbox: &BoundingBox, network_type: NetworkType) -> String {
    // 180s matches OSMnx's default server timeout
    format!(
        r#"[out:json][timeout:180];
(
  way{filter}{bbox};
);
out body;
>;
out skel qt;"#,
        filter = network_filter(network_type),
        bbox = bbox_clause(bbox)
    )
}

/// Query for building footprints plus their nodes
pub fn buildings_query(bbox: &BoundingBox) -> String {
    format!(
        r#"[out:json][timeout:180];
(
  way["building"]{bbox};
);
out body;
>;
out skel qt;"#,
        bbox = bbox_clause(bbox)
    )
}

/// Blocking Overpass client with mirror failover
#[derive(Debug, Clone)]
pub struct OverpassClient {
    config: OverpassConfig,
    client: reqwest::blocking::Client,
    retry_wait: Duration,
}

impl OverpassClient {
    pub fn new(config: OverpassConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            client,
            retry_wait: Duration::from_secs(30),
        })
    }

    pub fn fetch_roads(
        &self,
        bbox: &BoundingBox,
        network_type: NetworkType,
    ) -> Result<OverpassResponse> {
        self.execute(&roads_query(bbox, network_type))
    }

    pub fn fetch_buildings(&self, bbox: &BoundingBox) -> Result<OverpassResponse> {
        self.execute(&buildings_query(bbox))
    }

    /// Run a query against each configured mirror in turn
    pub fn execute(&self, query: &str) -> Result<OverpassResponse> {
        if self.config.urls.is_empty() {
            bail!("No Overpass API mirrors configured");
        }

        let mut last_error = None;
        for url in &self.config.urls {
            match self.execute_on(url, query) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(mirror = %url, error = %e, "Overpass mirror failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Unknown error"))
            .context("All Overpass API mirrors failed"))
    }

    /// Execute a query on one mirror with retry logic for 429/504 errors
    fn execute_on(&self, url: &str, query: &str) -> Result<OverpassResponse> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                // Overpass recommends waiting when overloaded
                let wait = self.retry_wait * attempt;
                tracing::warn!(
                    mirror = %url,
                    wait_secs = wait.as_secs(),
                    attempt = attempt + 1,
                    max_retries,
                    "Overpass API busy, retrying"
                );
                std::thread::sleep(wait);
            }

            // Overpass expects form-encoded POST data: data=<query>
            let response = self
                .client
                .post(url)
                .form(&[("data", query)])
                .send()
                .context("Failed to send request to Overpass API")?;

            match response.status().as_u16() {
                200 => {
                    let result: OverpassResponse = response
                        .json()
                        .context("Failed to parse Overpass JSON response")?;
                    return Ok(result);
                }
                429 | 504 => {
                    last_error = Some(format!(
                        "Overpass API returned status {} (attempt {})",
                        response.status(),
                        attempt + 1
                    ));
                    continue;
                }
                status => {
                    bail!("Overpass API returned error status: {}", status);
                }
            }
        }

        bail!(
            "Overpass API failed after {} retries: {}",
            max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volgograd() -> BoundingBox {
        BoundingBox {
            south: 48.4,
            north: 48.9,
            west: 44.0,
            east: 44.9,
        }
    }

    #[test]
    fn test_roads_query_uses_bbox_and_filter() {
        let query = roads_query(&volgograd(), NetworkType::Drive);
        assert!(query.contains("(48.4,44,48.9,44.9)"));
        assert!(query.contains(r#"["motorcar"!~"no"]"#));
        assert!(query.starts_with("[out:json][timeout:180];"));
    }

    #[test]
    fn test_walk_filter_allows_footways() {
        assert!(!network_filter(NetworkType::Walk).contains("footway"));
        assert!(network_filter(NetworkType::Drive).contains("footway"));
    }

    #[test]
    fn test_buildings_query() {
        let query = buildings_query(&volgograd());
        assert!(query.contains(r#"way["building"](48.4,44,48.9,44.9)"#));
    }

    #[test]
    fn test_parse_overpass_response() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 48.70, "lon": 44.51},
                {"type": "way", "id": 2, "nodes": [1, 3], "tags": {"highway": "primary"}}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.elements.len(), 2);
        assert_eq!(response.elements[0].type_, "node");
        assert_eq!(response.elements[1].type_, "way");
    }

    #[test]
    fn test_no_mirrors_is_error() {
        let config = OverpassConfig {
            urls: Vec::new(),
            ..OverpassConfig::default()
        };
        let client = OverpassClient::new(config, "test").unwrap();
        assert!(client.execute("[out:json];").is_err());
    }
}
