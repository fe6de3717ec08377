//! Address lookup with provider and query-variant fallback.

pub mod bounds;
pub mod rate_limit;

pub use bounds::{Bounds, CityBounds};
pub use rate_limit::RateLimiter;

use anyhow::{Result, anyhow};
use std::time::Duration;

use crate::api::NominatimClient;
use crate::config::GeocodingConfig;

/// Forward geocoding provider
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;

    /// Best (lat, lon) for a free-form query, `None` if nothing matched
    fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>>;
}

/// Reverse geocoding provider
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(&self, lat: f64, lon: f64, language: &str) -> Result<Option<String>>;
}

/// Named Nominatim endpoint
pub struct NominatimGeocoder {
    name: String,
    client: NominatimClient,
}

impl NominatimGeocoder {
    pub fn new(name: impl Into<String>, client: NominatimClient) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
        Ok(self.client.search(query)?.map(|place| (place.lat, place.lon)))
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, lat: f64, lon: f64, language: &str) -> Result<Option<String>> {
        self.client.reverse(lat, lon, language)
    }
}

/// Parse "lat, lon" if it is a pair of in-range floats
pub fn parse_coordinates(address: &str) -> Option<(f64, f64)> {
    let mut parts = address.split(',');
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    let lon: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)).then_some((lat, lon))
}

/// Query strings to try, in order
pub fn search_variants(address: &str, city_name: Option<&str>) -> Vec<String> {
    match city_name {
        Some(city) => vec![
            format!("{}, {}", address, city),
            format!("{}, {}, Россия", address, city),
            format!("{}, {}, Russia", address, city),
            format!("{}, {}, РФ", address, city),
        ],
        None => vec![
            address.to_string(),
            format!("{}, Россия", address),
            format!("{}, Russia", address),
            format!("{}, РФ", address),
        ],
    }
}

/// City name as used in query variants: trimmed, without a ", Russia" suffix
fn normalize_city(city_name: Option<&str>) -> Option<&str> {
    let city = city_name.map(str::trim).filter(|c| !c.is_empty())?;
    Some(city.strip_suffix(", Russia").map(str::trim).unwrap_or(city))
}

/// Forward and reverse geocoding over several providers
pub struct GeocodingChain {
    providers: Vec<Box<dyn Geocoder>>,
    reverse: Option<Box<dyn ReverseGeocoder>>,
    bounds: CityBounds,
    limiter: RateLimiter,
}

impl GeocodingChain {
    pub fn new(
        providers: Vec<Box<dyn Geocoder>>,
        reverse: Option<Box<dyn ReverseGeocoder>>,
        bounds: CityBounds,
        reverse_min_delay: Duration,
    ) -> Self {
        Self {
            providers,
            reverse,
            bounds,
            limiter: RateLimiter::new(reverse_min_delay),
        }
    }

    /// Nominatim providers from configuration; the first also serves reverse lookups
    pub fn from_config(config: &GeocodingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Box<dyn Geocoder>> = Vec::new();
        for provider in &config.providers {
            let client = NominatimClient::new(&provider.url, &config.user_agent, timeout)?;
            providers.push(Box::new(NominatimGeocoder::new(&provider.name, client)));
        }

        let first = config
            .providers
            .first()
            .ok_or_else(|| anyhow!("No geocoding providers configured"))?;
        let reverse_client = NominatimClient::new(&first.url, &config.user_agent, timeout)?;
        let reverse: Box<dyn ReverseGeocoder> =
            Box::new(NominatimGeocoder::new(&first.name, reverse_client));

        Ok(Self::new(
            providers,
            Some(reverse),
            CityBounds::with_extra(&config.city_bounds),
            Duration::from_millis(config.reverse_min_delay_ms),
        ))
    }

    pub fn bounds(&self) -> &CityBounds {
        &self.bounds
    }

    /// Resolve an address to (lat, lon).
    ///
    /// Literal "lat, lon" input is returned as is. Otherwise every provider
    /// is tried with every query variant; with a city, results outside that
    /// city's known bounds are rejected. Provider errors only move on to the
    /// next attempt.
    pub fn address_to_coords(&self, address: &str, city_name: Option<&str>) -> Option<(f64, f64)> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        if let Some(coords) = parse_coordinates(address) {
            return Some(coords);
        }

        let city = normalize_city(city_name);
        let variants = search_variants(address, city);

        for provider in &self.providers {
            for query in &variants {
                tracing::info!(query = %query, provider = provider.name(), "looking up coordinates");
                match provider.geocode(query) {
                    Ok(Some(coords)) => {
                        tracing::info!(?coords, "found coordinates");
                        if let Some(city) = city
                            && !self.bounds.validate(coords, city)
                        {
                            continue;
                        }
                        return Some(coords);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(query = %query, provider = provider.name(), error = %e, "geocoding failed");
                    }
                }
            }
        }

        tracing::warn!(address, "no coordinates found for address");
        None
    }

    /// Formatted address for a point, `None` on failure or no match
    pub fn coords_to_address(&self, lat: f64, lon: f64, language: &str) -> Option<String> {
        let reverse = self.reverse.as_deref()?;
        match self.limiter.run(|| reverse.reverse(lat, lon, language)) {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(lat, lon, error = %e, "reverse geocoding failed");
                None
            }
        }
    }
}
