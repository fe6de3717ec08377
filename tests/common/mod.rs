#![allow(dead_code)]

use anyhow::{Result, bail};
use citygraph::api::MapSource;
use citygraph::cache::{LocalStore, SharedTier};
use citygraph::domain::{Building, FetchParams, GraphEdge, GraphNode, RoadGraph};
use citygraph::service::DataService;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory map source that counts how often it is asked for data
#[derive(Default)]
pub struct FakeMapSource {
    pub graph_calls: AtomicUsize,
    pub building_calls: AtomicUsize,
    pub fail_roads: bool,
    pub empty_roads: bool,
    pub fail_buildings: bool,
}

impl FakeMapSource {
    pub fn graph_calls(&self) -> usize {
        self.graph_calls.load(Ordering::SeqCst)
    }
}

pub fn sample_graph() -> RoadGraph {
    RoadGraph {
        nodes: vec![
            GraphNode {
                id: 1,
                lat: 48.70,
                lon: 44.50,
                street_count: 1,
            },
            GraphNode {
                id: 2,
                lat: 48.71,
                lon: 44.52,
                street_count: 1,
            },
        ],
        edges: vec![
            GraphEdge {
                u: 1,
                v: 2,
                osmid: 100,
                highway: "primary".to_string(),
                name: Some("проспект Ленина".to_string()),
                oneway: false,
                length_m: 1800.0,
                geometry: vec![(48.70, 44.50), (48.71, 44.52)],
            },
            GraphEdge {
                u: 2,
                v: 1,
                osmid: 100,
                highway: "primary".to_string(),
                name: Some("проспект Ленина".to_string()),
                oneway: false,
                length_m: 1800.0,
                geometry: vec![(48.71, 44.52), (48.70, 44.50)],
            },
        ],
    }
}

pub fn sample_buildings() -> Vec<Building> {
    let mut tags = HashMap::new();
    tags.insert("building".to_string(), "yes".to_string());
    vec![Building::new(
        500,
        tags,
        vec![(48.700, 44.500), (48.700, 44.501), (48.701, 44.501), (48.700, 44.500)],
    )]
}

impl MapSource for FakeMapSource {
    fn road_graph(&self, place: &str, _params: &FetchParams) -> Result<RoadGraph> {
        self.graph_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_roads {
            bail!("Overpass unreachable for {}", place);
        }
        if self.empty_roads {
            return Ok(RoadGraph::default());
        }
        Ok(sample_graph())
    }

    fn buildings(&self, place: &str) -> Result<Vec<Building>> {
        self.building_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_buildings {
            bail!("building query timed out for {}", place);
        }
        Ok(sample_buildings())
    }
}

/// Lets a test keep its own handle on the fake the service owns
pub struct SharedFake(pub Arc<FakeMapSource>);

impl MapSource for SharedFake {
    fn road_graph(&self, place: &str, params: &FetchParams) -> Result<RoadGraph> {
        self.0.road_graph(place, params)
    }

    fn buildings(&self, place: &str) -> Result<Vec<Building>> {
        self.0.buildings(place)
    }
}

/// Disk-only data service over a fake source
pub fn local_service(dir: &std::path::Path, fake: Arc<FakeMapSource>) -> DataService {
    let local = LocalStore::open(dir).unwrap();
    DataService::new(Box::new(SharedFake(fake)), local, SharedTier::disabled())
}
