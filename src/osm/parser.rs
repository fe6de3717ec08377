use crate::api::OverpassResponse;
use crate::domain::Building;
use std::collections::HashMap;

/// A highway way with its node references still unresolved
#[derive(Debug, Clone, PartialEq)]
pub struct HighwayWay {
    pub id: u64,
    pub node_refs: Vec<u64>,
    pub tags: HashMap<String, String>,
}

impl HighwayWay {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Highway ways plus the coordinates of every node they reference
#[derive(Debug, Clone, Default)]
pub struct HighwayNetwork {
    pub nodes: HashMap<u64, (f64, f64)>,
    pub ways: Vec<HighwayWay>,
}

pub fn build_node_lookup(response: &OverpassResponse) -> HashMap<u64, (f64, f64)> {
    response
        .elements
        .iter()
        .filter(|e| e.type_ == "node")
        .filter_map(|e| {
            let lat = e.lat?;
            let lon = e.lon?;
            Some((e.id, (lat, lon)))
        })
        .collect()
}

fn resolve_way_to_points(node_refs: &[u64], nodes: &HashMap<u64, (f64, f64)>) -> Vec<(f64, f64)> {
    node_refs
        .iter()
        .filter_map(|id| nodes.get(id).copied())
        .collect()
}

/// Parse an Overpass highway response.
///
/// # Algorithm
/// 1. Build node_id → (lat, lon) lookup map from all node elements
/// 2. Keep way elements carrying a highway tag
/// 3. Drop node refs that have no coordinates; skip ways left with < 2 nodes
pub fn parse_highways(response: &OverpassResponse) -> HighwayNetwork {
    let nodes = build_node_lookup(response);
    let mut ways = Vec::new();

    for element in &response.elements {
        if element.type_ != "way" {
            continue;
        }

        let tags = match &element.tags {
            Some(t) if t.contains_key("highway") => t,
            _ => continue,
        };

        let node_refs: Vec<u64> = match &element.nodes {
            Some(n) => n.iter().copied().filter(|id| nodes.contains_key(id)).collect(),
            None => continue,
        };

        if node_refs.len() < 2 {
            continue;
        }

        ways.push(HighwayWay {
            id: element.id,
            node_refs,
            tags: tags.clone(),
        });
    }

    HighwayNetwork { nodes, ways }
}

/// Parse building footprints; only closed rings are kept
pub fn parse_buildings(response: &OverpassResponse) -> Vec<Building> {
    let nodes = build_node_lookup(response);
    let mut buildings = Vec::new();

    for element in &response.elements {
        if element.type_ != "way" {
            continue;
        }

        let node_refs = match &element.nodes {
            Some(n) => n,
            None => continue,
        };

        let points = resolve_way_to_points(node_refs, &nodes);
        let tags = element.tags.clone().unwrap_or_default();
        let building = Building::new(element.id, tags, points);
        if building.is_valid() {
            buildings.push(building);
        }
    }

    buildings
}
