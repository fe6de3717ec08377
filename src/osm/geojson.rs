use geo::{BoundingRect, MultiPoint, Point};
use serde_json::{Value, json};

use crate::domain::RoadGraph;

/// Bounds and midpoint of a graph's nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphExtent {
    /// [xmin, ymin, xmax, ymax] as lon/lat
    pub bbox: [f64; 4],
    pub center_lat: f64,
    pub center_lon: f64,
}

/// Compute the extent of a graph, or `None` if it has no nodes
pub fn graph_extent(graph: &RoadGraph) -> Option<GraphExtent> {
    let points: MultiPoint<f64> = graph
        .nodes
        .iter()
        .map(|n| Point::new(n.lon, n.lat))
        .collect();
    let rect = points.bounding_rect()?;

    let (min, max) = (rect.min(), rect.max());
    Some(GraphExtent {
        bbox: [min.x, min.y, max.x, max.y],
        center_lat: (min.y + max.y) / 2.0,
        center_lon: (min.x + max.x) / 2.0,
    })
}

/// Export graph edges as a GeoJSON FeatureCollection of LineStrings
pub fn edges_feature_collection(graph: &RoadGraph) -> Value {
    let features: Vec<Value> = graph
        .edges
        .iter()
        .map(|edge| {
            // GeoJSON wants [lon, lat]
            let coordinates: Vec<[f64; 2]> =
                edge.geometry.iter().map(|&(lat, lon)| [lon, lat]).collect();
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": coordinates,
                },
                "properties": {
                    "u": edge.u,
                    "v": edge.v,
                    "osmid": edge.osmid,
                    "highway": edge.highway,
                    "name": edge.name,
                    "oneway": edge.oneway,
                    "length": edge.length_m,
                },
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GraphEdge, GraphNode};

    fn graph() -> RoadGraph {
        RoadGraph {
            nodes: vec![
                GraphNode {
                    id: 1,
                    lat: 48.6,
                    lon: 44.4,
                    street_count: 1,
                },
                GraphNode {
                    id: 2,
                    lat: 48.8,
                    lon: 44.6,
                    street_count: 1,
                },
            ],
            edges: vec![GraphEdge {
                u: 1,
                v: 2,
                osmid: 7,
                highway: "primary".to_string(),
                name: None,
                oneway: true,
                length_m: 26_500.0,
                geometry: vec![(48.6, 44.4), (48.8, 44.6)],
            }],
        }
    }

    #[test]
    fn test_graph_extent() {
        let extent = graph_extent(&graph()).unwrap();
        assert_eq!(extent.bbox, [44.4, 48.6, 44.6, 48.8]);
        assert!((extent.center_lat - 48.7).abs() < 1e-9);
        assert!((extent.center_lon - 44.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_graph_has_no_extent() {
        assert!(graph_extent(&RoadGraph::default()).is_none());
    }

    #[test]
    fn test_feature_collection_swaps_to_lon_lat() {
        let fc = edges_feature_collection(&graph());
        assert_eq!(fc["type"], "FeatureCollection");

        let feature = &fc["features"][0];
        assert_eq!(feature["geometry"]["type"], "LineString");
        assert_eq!(feature["geometry"]["coordinates"][0], json!([44.4, 48.6]));
        assert_eq!(feature["properties"]["osmid"], 7);
        assert_eq!(feature["properties"]["name"], Value::Null);
    }
}
