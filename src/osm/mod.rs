pub mod geojson;
pub mod graph;
pub mod parser;

pub use geojson::{GraphExtent, edges_feature_collection, graph_extent};
pub use graph::build_road_graph;
pub use parser::{HighwayNetwork, parse_buildings, parse_highways};
