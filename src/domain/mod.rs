pub mod building;
pub mod bundle;
pub mod road;

pub use building::Building;
pub use bundle::{CityDataBundle, CityStats, FetchParams, NoFlyZone};
pub use road::{GraphEdge, GraphNode, NetworkType, RoadGraph};
