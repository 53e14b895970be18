//! Location Provider
//!
//! Permission, current-position and reverse-geocoding seam for the SOS
//! pipeline, plus a Nominatim-backed geocoder.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::report::Coordinates;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> Result<Permission>;

    /// A fix within `timeout`; callers also bound the call themselves
    async fn current_position(&self, timeout: Duration) -> Result<Coordinates>;

    async fn reverse_geocode(&self, at: Coordinates) -> Result<String>;
}

#[derive(Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

/// Reverse geocoding through an OpenStreetMap Nominatim instance
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("patrolnet/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build geocoder HTTP client")?;
        Ok(Self { client, base_url: base_url.into() })
    }

    pub async fn reverse(&self, at: Coordinates) -> Result<String> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom=18&addressdetails=1",
            self.base_url.trim_end_matches('/'),
            at.latitude,
            at.longitude
        );
        debug!("Reverse geocoding {}", at.formatted());

        let body: NominatimReverse = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send reverse geocoding request")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse reverse geocoding response")?;

        body.display_name
            .filter(|name| !name.trim().is_empty())
            .context("No address found for coordinates")
    }
}

/// Provider for hosts without a GPS: the position comes from configuration
/// and permission is granted only when one is configured.
pub struct ConfiguredLocationProvider {
    position: Option<Coordinates>,
    geocoder: Option<NominatimGeocoder>,
}

impl ConfiguredLocationProvider {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position, geocoder: None }
    }

    pub fn with_geocoder(mut self, geocoder: NominatimGeocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocationProvider {
    async fn request_permission(&self) -> Result<Permission> {
        Ok(if self.position.is_some() { Permission::Granted } else { Permission::Denied })
    }

    async fn current_position(&self, _timeout: Duration) -> Result<Coordinates> {
        self.position.context("No device position configured")
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<String> {
        match &self.geocoder {
            Some(geocoder) => geocoder.reverse(at).await,
            None => anyhow::bail!("No geocoder configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_provider_without_position_denies() {
        let provider = ConfiguredLocationProvider::new(None);
        assert_eq!(provider.request_permission().await.unwrap(), Permission::Denied);
        assert!(provider.current_position(Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_configured_provider_returns_fixed_position() {
        let at = Coordinates::new(14.6, 121.0);
        let provider = ConfiguredLocationProvider::new(Some(at));
        assert_eq!(provider.request_permission().await.unwrap(), Permission::Granted);
        assert_eq!(provider.current_position(Duration::from_secs(1)).await.unwrap(), at);
        assert!(provider.reverse_geocode(at).await.is_err());
    }
}
