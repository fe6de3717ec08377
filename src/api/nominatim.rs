use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Bounding box as returned by Nominatim
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// A geocoded place
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
    pub bbox: Option<BoundingBox>,
}

impl TryFrom<NominatimResult> for Place {
    type Error = anyhow::Error;

    fn try_from(result: NominatimResult) -> Result<Self> {
        let lat: f64 = result
            .lat
            .parse()
            .context("Failed to parse latitude from Nominatim response")?;
        let lon: f64 = result
            .lon
            .parse()
            .context("Failed to parse longitude from Nominatim response")?;

        // Nominatim orders the box as [south, north, west, east]
        let bbox = match result.boundingbox.as_deref() {
            Some([s, n, w, e]) => Some(BoundingBox {
                south: s.parse().context("Invalid bounding box south")?,
                north: n.parse().context("Invalid bounding box north")?,
                west: w.parse().context("Invalid bounding box west")?,
                east: e.parse().context("Invalid bounding box east")?,
            }),
            _ => None,
        };

        Ok(Place {
            lat,
            lon,
            display_name: result.display_name,
            bbox,
        })
    }
}

/// Blocking client for a Nominatim-compatible endpoint
#[derive(Debug, Clone)]
pub struct NominatimClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Look up a free-form query.
    ///
    /// # Returns
    /// * `Ok(Some(place))` - Best match
    /// * `Ok(None)` - Nominatim found nothing
    /// * `Err` - Transport or API error
    pub fn search(&self, query: &str) -> Result<Option<Place>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .context("Failed to send request to Nominatim API")?;

        if !response.status().is_success() {
            bail!("Nominatim API returned error status: {}", response.status());
        }

        let results: Vec<NominatimResult> = response
            .json()
            .context("Failed to parse Nominatim JSON response")?;

        results.into_iter().next().map(Place::try_from).transpose()
    }

    /// Turn coordinates into a formatted address
    pub fn reverse(&self, lat: f64, lon: f64, language: &str) -> Result<Option<String>> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
                ("accept-language", language),
            ])
            .send()
            .context("Failed to send request to Nominatim API")?;

        if !response.status().is_success() {
            bail!("Nominatim API returned error status: {}", response.status());
        }

        let result: ReverseResult = response
            .json()
            .context("Failed to parse Nominatim JSON response")?;

        if let Some(error) = result.error {
            tracing::debug!(%error, "reverse geocoding returned no address");
            return Ok(None);
        }
        Ok(result.display_name.filter(|s| !s.trim().is_empty()))
    }
}
