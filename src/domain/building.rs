use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A building footprint from OSM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: u64,
    pub tags: HashMap<String, String>,
    /// Outer ring as (lat, lon) pairs
    pub outer: Vec<(f64, f64)>,
}

impl Building {
    pub fn new(id: u64, tags: HashMap<String, String>, outer: Vec<(f64, f64)>) -> Self {
        Self { id, tags, outer }
    }

    /// A closed outer ring with at least three distinct corners
    pub fn is_valid(&self) -> bool {
        self.outer.len() >= 4 && self.outer.first() == self.outer.last()
    }
}
