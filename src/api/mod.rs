pub mod nominatim;
pub mod overpass;
pub mod source;

pub use nominatim::{BoundingBox, NominatimClient, Place};
pub use overpass::{OverpassClient, OverpassResponse};
pub use source::{MapSource, OsmMapSource};
