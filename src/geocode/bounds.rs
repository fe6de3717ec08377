use crate::config::CityBoundsConfig;

/// Latitude/longitude window a city's addresses must fall in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lat: (f64, f64),
    pub lon: (f64, f64),
}

impl Bounds {
    pub const fn new(lat: (f64, f64), lon: (f64, f64)) -> Self {
        Self { lat, lon }
    }

    pub fn contains(&self, (lat, lon): (f64, f64)) -> bool {
        self.lat.0 <= lat && lat <= self.lat.1 && self.lon.0 <= lon && lon <= self.lon.1
    }
}

const VOLGOGRAD: Bounds = Bounds::new((48.5, 49.0), (44.0, 45.0));
const MOSCOW: Bounds = Bounds::new((55.5, 55.9), (37.3, 37.9));
const ST_PETERSBURG: Bounds = Bounds::new((59.8, 60.1), (30.0, 30.7));

/// Known city windows, matched by lowercase substring in table order
#[derive(Debug, Clone)]
pub struct CityBounds {
    entries: Vec<(String, Bounds)>,
}

impl Default for CityBounds {
    fn default() -> Self {
        let builtin = [
            ("волгоград", VOLGOGRAD),
            ("volgograd", VOLGOGRAD),
            ("москва", MOSCOW),
            ("moscow", MOSCOW),
            ("санкт-петербург", ST_PETERSBURG),
            ("st petersburg", ST_PETERSBURG),
            ("st. petersburg", ST_PETERSBURG),
            ("petersburg", ST_PETERSBURG),
        ];
        Self {
            entries: builtin
                .into_iter()
                .map(|(name, bounds)| (name.to_string(), bounds))
                .collect(),
        }
    }
}

impl CityBounds {
    /// Built-in table followed by configured entries
    pub fn with_extra(extra: &[CityBoundsConfig]) -> Self {
        let mut table = Self::default();
        table.entries.extend(
            extra
                .iter()
                .map(|e| (e.name.to_lowercase(), Bounds::new(e.lat, e.lon))),
        );
        table
    }

    /// Window for the first entry whose name occurs in `city_name`
    pub fn lookup(&self, city_name: &str) -> Option<(&str, Bounds)> {
        let normalized = city_name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| normalized.contains(name.as_str()))
            .map(|(name, bounds)| (name.as_str(), *bounds))
    }

    /// Whether `coords` are plausible for `city_name`; unknown cities pass
    pub fn validate(&self, coords: (f64, f64), city_name: &str) -> bool {
        match self.lookup(city_name) {
            Some((_, bounds)) if bounds.contains(coords) => true,
            Some((name, bounds)) => {
                tracing::warn!(
                    ?coords,
                    city = city_name,
                    matched = name,
                    lat = ?bounds.lat,
                    lon = ?bounds.lon,
                    "coordinates outside city bounds"
                );
                false
            }
            None => true,
        }
    }
}
