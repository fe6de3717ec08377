use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which part of the OSM highway network to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    #[default]
    Drive,
    DriveService,
    Walk,
    Bike,
    All,
    AllPrivate,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Drive => "drive",
            NetworkType::DriveService => "drive_service",
            NetworkType::Walk => "walk",
            NetworkType::Bike => "bike",
            NetworkType::All => "all",
            NetworkType::AllPrivate => "all_private",
        }
    }

    /// Pedestrians may walk both ways along one-way streets
    pub fn respects_oneway(&self) -> bool {
        !matches!(self, NetworkType::Walk)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drive" => Ok(NetworkType::Drive),
            "drive_service" => Ok(NetworkType::DriveService),
            "walk" => Ok(NetworkType::Walk),
            "bike" => Ok(NetworkType::Bike),
            "all" => Ok(NetworkType::All),
            "all_private" => Ok(NetworkType::AllPrivate),
            other => Err(format!(
                "Unknown network type '{}'. Use: drive, drive_service, walk, bike, all, all_private",
                other
            )),
        }
    }
}

/// An intersection or dead end in the road graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// OSM node id
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    /// Number of undirected street segments meeting at this node
    pub street_count: u32,
}

/// A directed road segment between two graph nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id
    pub u: u64,
    /// Target node id
    pub v: u64,
    /// OSM way id the segment came from
    pub osmid: u64,
    pub highway: String,
    pub name: Option<String>,
    pub oneway: bool,
    /// Haversine length of `geometry` in meters
    pub length_m: f64,
    /// Points as (lat, lon) pairs, from `u` to `v` inclusive
    pub geometry: Vec<(f64, f64)>,
}

/// Directed road network for a city
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl RoadGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
