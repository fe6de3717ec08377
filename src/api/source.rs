use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::nominatim::{BoundingBox, NominatimClient};
use super::overpass::OverpassClient;
use crate::config::FileConfig;
use crate::domain::{Building, FetchParams, RoadGraph};
use crate::osm::{build_road_graph, parse_buildings, parse_highways};

/// Where road networks and building footprints come from
pub trait MapSource: Send + Sync {
    /// Download and assemble the road graph for a place name
    fn road_graph(&self, place: &str, params: &FetchParams) -> Result<RoadGraph>;

    /// Download building footprints for a place name
    fn buildings(&self, place: &str) -> Result<Vec<Building>>;
}

/// OpenStreetMap via Nominatim (place → area) and Overpass (elements)
pub struct OsmMapSource {
    nominatim: NominatimClient,
    overpass: OverpassClient,
    areas: Mutex<HashMap<String, BoundingBox>>,
}

impl OsmMapSource {
    pub fn new(nominatim: NominatimClient, overpass: OverpassClient) -> Self {
        Self {
            nominatim,
            overpass,
            areas: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &FileConfig) -> Result<Self> {
        let geocoding = &config.geocoding;
        let provider = geocoding
            .providers
            .first()
            .ok_or_else(|| anyhow!("No geocoding providers configured"))?;
        let nominatim = NominatimClient::new(
            &provider.url,
            &geocoding.user_agent,
            Duration::from_secs(geocoding.timeout_secs.max(30)),
        )?;
        let overpass = OverpassClient::new(config.overpass.clone(), &geocoding.user_agent)?;
        Ok(Self::new(nominatim, overpass))
    }

    /// Resolve a place name to its bounding box, remembering the answer
    pub fn area(&self, place: &str) -> Result<BoundingBox> {
        if let Some(bbox) = self
            .areas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(place)
        {
            return Ok(*bbox);
        }

        let found = self
            .nominatim
            .search(place)
            .with_context(|| format!("Failed to geocode place: {}", place))?
            .ok_or_else(|| anyhow!("Place not found: {}", place))?;
        let bbox = found
            .bbox
            .ok_or_else(|| anyhow!("No bounding box for place: {}", place))?;

        tracing::debug!(place, display_name = %found.display_name, ?bbox, "resolved place");
        self.areas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(place.to_string(), bbox);
        Ok(bbox)
    }
}

impl MapSource for OsmMapSource {
    fn road_graph(&self, place: &str, params: &FetchParams) -> Result<RoadGraph> {
        let bbox = self.area(place)?;
        let response = self
            .overpass
            .fetch_roads(&bbox, params.network_type)
            .context("Failed to fetch roads from Overpass API")?;

        let network = parse_highways(&response);
        tracing::debug!(
            place,
            ways = network.ways.len(),
            nodes = network.nodes.len(),
            "parsed highway ways"
        );
        Ok(build_road_graph(&network, params))
    }

    fn buildings(&self, place: &str) -> Result<Vec<Building>> {
        let bbox = self.area(place)?;
        let response = self
            .overpass
            .fetch_buildings(&bbox)
            .context("Failed to fetch buildings from Overpass API")?;
        Ok(parse_buildings(&response))
    }
}
