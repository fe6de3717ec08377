use geo::{Distance, Haversine, Point};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::parser::{HighwayNetwork, HighwayWay};
use crate::domain::{FetchParams, GraphEdge, GraphNode, RoadGraph};

/// How traffic may move along a way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Both,
    Forward,
    Reverse,
}

fn way_direction(way: &HighwayWay, params: &FetchParams) -> Direction {
    if !params.network_type.respects_oneway() {
        return Direction::Both;
    }
    match way.tag("oneway") {
        Some("yes" | "true" | "1") => Direction::Forward,
        Some("-1" | "reverse") => Direction::Reverse,
        _ if way.tag("junction") == Some("roundabout") => Direction::Forward,
        _ => Direction::Both,
    }
}

/// Haversine length of a (lat, lon) polyline in meters
pub fn polyline_length_m(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            let (lat_a, lon_a) = pair[0];
            let (lat_b, lon_b) = pair[1];
            Haversine::distance(Point::new(lon_a, lat_a), Point::new(lon_b, lat_b))
        })
        .sum()
}

/// Nodes that must stay in a simplified graph: way endpoints, nodes shared
/// between ways, and nodes a way passes through more than once
fn topological_nodes(network: &HighwayNetwork) -> HashSet<u64> {
    let mut refs: HashMap<u64, usize> = HashMap::new();
    let mut keep = HashSet::new();

    for way in &network.ways {
        if let (Some(first), Some(last)) = (way.node_refs.first(), way.node_refs.last()) {
            keep.insert(*first);
            keep.insert(*last);
        }
        for id in &way.node_refs {
            *refs.entry(*id).or_default() += 1;
        }
    }

    keep.extend(refs.into_iter().filter(|(_, n)| *n > 1).map(|(id, _)| id));
    keep
}

/// Split a way into runs of node ids between kept nodes
fn split_way<'a>(way: &'a HighwayWay, keep: Option<&HashSet<u64>>) -> Vec<&'a [u64]> {
    let refs = &way.node_refs;
    let mut segments = Vec::new();
    let mut start = 0;

    for i in 1..refs.len() {
        let is_break = match keep {
            Some(keep) => i == refs.len() - 1 || keep.contains(&refs[i]),
            None => true,
        };
        if is_break {
            segments.push(&refs[start..=i]);
            start = i;
        }
    }

    segments
}

/// Assemble a directed road graph from parsed highway ways.
///
/// Two-way streets produce one edge per direction. With `params.simplify`
/// chains of interior nodes are merged into a single edge whose geometry
/// keeps every original point.
pub fn build_road_graph(network: &HighwayNetwork, params: &FetchParams) -> RoadGraph {
    let keep = params.simplify.then(|| topological_nodes(network));

    let mut street_count: BTreeMap<u64, u32> = BTreeMap::new();
    let mut edges = Vec::new();

    for way in &network.ways {
        let direction = way_direction(way, params);
        let highway = way.tag("highway").unwrap_or("road").to_string();
        let name = way.tag("name").map(str::to_string);
        let oneway = direction != Direction::Both;

        for segment in split_way(way, keep.as_ref()) {
            let (u, v) = match (segment.first(), segment.last()) {
                (Some(u), Some(v)) => (*u, *v),
                _ => continue,
            };
            // Repeated consecutive refs carry no geometry
            if segment.len() == 2 && u == v {
                continue;
            }

            let geometry: Vec<(f64, f64)> = segment
                .iter()
                .filter_map(|id| network.nodes.get(id).copied())
                .collect();
            if geometry.len() != segment.len() {
                continue;
            }
            let length_m = polyline_length_m(&geometry);

            *street_count.entry(u).or_default() += 1;
            *street_count.entry(v).or_default() += 1;

            let edge = |u: u64, v: u64, geometry: Vec<(f64, f64)>| GraphEdge {
                u,
                v,
                osmid: way.id,
                highway: highway.clone(),
                name: name.clone(),
                oneway,
                length_m,
                geometry,
            };

            match direction {
                Direction::Forward => edges.push(edge(u, v, geometry)),
                Direction::Reverse => {
                    edges.push(edge(v, u, geometry.into_iter().rev().collect()))
                }
                Direction::Both => {
                    let reversed = geometry.iter().rev().copied().collect();
                    edges.push(edge(u, v, geometry));
                    edges.push(edge(v, u, reversed));
                }
            }
        }
    }

    let nodes = street_count
        .into_iter()
        .filter_map(|(id, count)| {
            let (lat, lon) = network.nodes.get(&id).copied()?;
            Some(GraphNode {
                id,
                lat,
                lon,
                street_count: count,
            })
        })
        .collect();

    RoadGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NetworkType;

    fn way(id: u64, refs: &[u64], tags: &[(&str, &str)]) -> HighwayWay {
        HighwayWay {
            id,
            node_refs: refs.to_vec(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Two streets crossing at node 3:
    ///
    /// 1 - 2 - 3 - 4 - 5   (way 10)
    ///         |
    ///         6           (way 11, one-way 3 -> 6)
    fn crossing() -> HighwayNetwork {
        let nodes = [
            (1, (48.700, 44.500)),
            (2, (48.700, 44.501)),
            (3, (48.700, 44.502)),
            (4, (48.700, 44.503)),
            (5, (48.700, 44.504)),
            (6, (48.699, 44.502)),
        ]
        .into_iter()
        .collect();

        HighwayNetwork {
            nodes,
            ways: vec![
                way(10, &[1, 2, 3, 4, 5], &[("highway", "primary"), ("name", "Lenina")]),
                way(11, &[3, 6], &[("highway", "residential"), ("oneway", "yes")]),
            ],
        }
    }

    #[test]
    fn test_unsimplified_graph_keeps_every_node() {
        let params = FetchParams {
            network_type: NetworkType::Drive,
            simplify: false,
        };
        let graph = build_road_graph(&crossing(), &params);

        assert_eq!(graph.node_count(), 6);
        // 4 two-way pairs on way 10, one one-way edge on way 11
        assert_eq!(graph.edge_count(), 9);
    }

    #[test]
    fn test_simplified_graph_merges_interior_nodes() {
        let graph = build_road_graph(&crossing(), &FetchParams::default());

        let ids: Vec<u64> = graph.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3, 5, 6]);
        // 1<->3, 3<->5, 3->6
        assert_eq!(graph.edge_count(), 5);

        let first = graph.edges.iter().find(|e| e.u == 1 && e.v == 3).unwrap();
        assert_eq!(first.geometry.len(), 3);
        assert_eq!(first.name.as_deref(), Some("Lenina"));
        assert!(!first.oneway);

        let hub = graph.nodes.iter().find(|n| n.id == 3).unwrap();
        assert_eq!(hub.street_count, 3);
    }

    #[test]
    fn test_oneway_respected_except_walking() {
        let drive = build_road_graph(&crossing(), &FetchParams::default());
        assert!(drive.edges.iter().any(|e| e.u == 3 && e.v == 6 && e.oneway));
        assert!(!drive.edges.iter().any(|e| e.u == 6 && e.v == 3));

        let walk = build_road_graph(
            &crossing(),
            &FetchParams {
                network_type: NetworkType::Walk,
                simplify: true,
            },
        );
        assert!(walk.edges.iter().any(|e| e.u == 6 && e.v == 3));
    }

    #[test]
    fn test_reverse_oneway() {
        let mut network = crossing();
        network.ways[1] = way(11, &[3, 6], &[("highway", "residential"), ("oneway", "-1")]);
        let graph = build_road_graph(&network, &FetchParams::default());

        let edge = graph.edges.iter().find(|e| e.osmid == 11).unwrap();
        assert_eq!((edge.u, edge.v), (6, 3));
        assert_eq!(edge.geometry.first(), Some(&(48.699, 44.502)));
    }

    #[test]
    fn test_edge_length_is_haversine() {
        let graph = build_road_graph(&crossing(), &FetchParams::default());
        let edge = graph.edges.iter().find(|e| e.u == 1 && e.v == 3).unwrap();
        // 0.002 degrees of longitude at 48.7N is roughly 147 m
        assert!((edge.length_m - 147.0).abs() < 3.0, "{}", edge.length_m);
    }

    #[test]
    fn test_empty_network() {
        let graph = build_road_graph(&HighwayNetwork::default(), &FetchParams::default());
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }
}
