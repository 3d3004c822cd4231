//! Reverse geocoding against a Nominatim-style endpoint.
//!
//! The resolver is total: every failure mode maps to a readable label so
//! callers never have to branch on geocoding errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Source of the device's current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> anyhow::Result<Coordinates>;
}

/// Position source backed by a fixed coordinate pair, or nothing at all.
///
/// Stands in for platform geolocation: configured coordinates come from
/// the config file or CLI flags.
pub struct FixedPosition {
    coords: Option<Coordinates>,
}

impl FixedPosition {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { coords }
    }

    pub fn unavailable() -> Self {
        Self { coords: None }
    }
}

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> anyhow::Result<Coordinates> {
        self.coords
            .ok_or_else(|| anyhow::anyhow!("No position configured"))
    }
}

/// Turns coordinates into a human-readable place label.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Never fails: unresolvable positions come back as a readable label.
    async fn resolve(&self, coords: Coordinates) -> String;
}

/// Reverse geocoder for a Nominatim-compatible API
pub struct NominatimClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: Address,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    #[serde(default)]
    village: String,
    #[serde(default)]
    suburb: String,
    #[serde(default)]
    neighbourhood: String,
    #[serde(default)]
    town: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    county: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    region: String,
}

impl NominatimClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sightsound/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    fn api_url(&self, coords: Coordinates) -> String {
        format!(
            "{}?format=json&lat={}&lon={}",
            self.endpoint.trim_end_matches('/'),
            coords.latitude,
            coords.longitude
        )
    }
}

#[async_trait]
impl LocationResolver for NominatimClient {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn resolve(&self, coords: Coordinates) -> String {
        let response = match self.client.get(self.api_url(coords)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Reverse geocode request failed: {}", e);
                return "Location access failed".to_string();
            }
        };

        if !response.status().is_success() {
            warn!("Reverse geocode returned status {}", response.status());
            return "Location not found".to_string();
        }

        let parsed: ReverseGeocodeResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Reverse geocode response unreadable: {}", e);
                return "Location access failed".to_string();
            }
        };

        let label = compose_label(&parsed);
        debug!("Resolved {} to {}", coords, label);
        label
    }
}

/// Pick the most local non-empty name per tier, then join the tiers.
///
/// Falls back to the full display name when no tier matches, and to a
/// fixed label when the response is empty altogether.
fn compose_label(response: &ReverseGeocodeResponse) -> String {
    let address = &response.address;
    let tiers = [
        first_non_empty(&[&address.village, &address.suburb, &address.neighbourhood]),
        first_non_empty(&[&address.town, &address.city, &address.county]),
        first_non_empty(&[&address.state, &address.region]),
    ];

    let parts: Vec<&str> = tiers.iter().filter_map(|t| *t).collect();
    if !parts.is_empty() {
        return parts.join(", ");
    }

    if !response.display_name.is_empty() {
        return response.display_name.clone();
    }

    "Unknown location".to_string()
}

fn first_non_empty<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| !c.is_empty())
}
