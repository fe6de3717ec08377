use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Building, NetworkType, RoadGraph};

/// Download parameters a bundle was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    pub network_type: NetworkType,
    pub simplify: bool,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Drive,
            simplify: true,
        }
    }
}

/// Counts recorded when the bundle was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CityStats {
    pub nodes: usize,
    pub edges: usize,
    pub buildings: usize,
}

/// Restricted airspace polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoFlyZone {
    pub name: String,
    pub outer: Vec<(f64, f64)>,
}

/// Everything cached for one city.
///
/// Bundles are written once and replaced wholesale; `stats` always describes
/// the graph and buildings stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDataBundle {
    pub road_graph: RoadGraph,
    pub buildings: Vec<Building>,
    pub no_fly_zones: Vec<NoFlyZone>,
    pub city_name: String,
    pub params: FetchParams,
    pub timestamp: DateTime<Utc>,
    pub stats: CityStats,
}

impl CityDataBundle {
    pub fn new(
        city_name: impl Into<String>,
        params: FetchParams,
        road_graph: RoadGraph,
        buildings: Vec<Building>,
        no_fly_zones: Vec<NoFlyZone>,
    ) -> Self {
        let stats = CityStats {
            nodes: road_graph.node_count(),
            edges: road_graph.edge_count(),
            buildings: buildings.len(),
        };
        Self {
            road_graph,
            buildings,
            no_fly_zones,
            city_name: city_name.into(),
            params,
            timestamp: Utc::now(),
            stats,
        }
    }
}
