//! Configuration
//!
//! Loaded from the process environment (and `.env` via `dotenv` in the
//! binary). Every key is optional; malformed values are errors.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::identity::Surface;
use crate::sos::location::NOMINATIM_URL;
use crate::sos::{Coordinates, EmergencyContact, SosConfig};

#[derive(Debug, Clone)]
pub struct PatrolConfig {
    /// Base URL of the PatrolNet REST backend
    pub api_url: String,
    pub surface: Surface,
    /// Where the login marker is persisted
    pub session_file: PathBuf,
    pub request_timeout: Duration,
    pub location_timeout: Duration,
    pub geocoder_url: String,
    pub emergency_number: String,
    /// Fixed device position for hosts without a GPS
    pub device_position: Option<Coordinates>,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            surface: Surface::WebAdmin,
            session_file: PathBuf::from("patrolnet_session.json"),
            request_timeout: Duration::from_secs(10),
            location_timeout: Duration::from_secs(15),
            geocoder_url: NOMINATIM_URL.to_string(),
            emergency_number: EmergencyContact::default().number,
            device_position: None,
        }
    }
}

impl PatrolConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("PATROLNET_API_URL") {
            config.api_url = url;
        }
        if let Some(surface) = get("PATROLNET_SURFACE") {
            config.surface = surface.parse::<Surface>().context("Invalid PATROLNET_SURFACE")?;
        }
        if let Some(path) = get("PATROLNET_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        if let Some(secs) = get("PATROLNET_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs(&secs).context("Invalid PATROLNET_REQUEST_TIMEOUT_SECS")?;
        }
        if let Some(secs) = get("PATROLNET_LOCATION_TIMEOUT_SECS") {
            config.location_timeout = parse_secs(&secs).context("Invalid PATROLNET_LOCATION_TIMEOUT_SECS")?;
        }
        if let Some(url) = get("PATROLNET_GEOCODER_URL") {
            config.geocoder_url = url;
        }
        if let Some(number) = get("PATROLNET_EMERGENCY_NUMBER") {
            config.emergency_number = number;
        }

        match (get("PATROLNET_DEVICE_LAT"), get("PATROLNET_DEVICE_LON")) {
            (Some(lat), Some(lon)) => {
                let at = Coordinates::new(
                    lat.parse::<f64>().context("Invalid PATROLNET_DEVICE_LAT")?,
                    lon.parse::<f64>().context("Invalid PATROLNET_DEVICE_LON")?,
                );
                if !at.is_valid() {
                    anyhow::bail!("Device position {} is out of range", at.formatted());
                }
                config.device_position = Some(at);
            }
            (None, None) => {}
            _ => anyhow::bail!("PATROLNET_DEVICE_LAT and PATROLNET_DEVICE_LON must be set together"),
        }

        Ok(config)
    }

    pub fn sos_config(&self) -> SosConfig {
        SosConfig {
            location_timeout: self.location_timeout,
            geocode_timeout: self.request_timeout,
            submit_timeout: self.request_timeout,
            contact: EmergencyContact::new(self.emergency_number.clone()),
            ..SosConfig::default()
        }
    }
}

fn parse_secs(value: &str) -> Result<Duration> {
    let secs: u64 = value.parse()?;
    if secs == 0 {
        anyhow::bail!("timeout must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}
