//! Incident Sink - emergency report endpoint

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::report::{SosReport, LOCATION_UNAVAILABLE};

pub const INCIDENT_TYPE: &str = "EMERGENCY - SOS";
pub const DESCRIPTION: &str = "EMERGENCY SOS ALERT - Immediate assistance required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
}

/// Body posted to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosPayload {
    pub user_id: String,
    pub username: String,
    pub reporter_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: String,
    pub priority: Priority,
    pub incident_type: String,
    pub description: String,
    pub status: String,
    /// When the alert was raised; unchanged across retries
    pub timestamp: DateTime<Utc>,
}

impl SosPayload {
    pub fn from_report(report: &SosReport) -> Self {
        let coordinates = report.coordinates();
        let location = report
            .resolved_address()
            .map(str::to_string)
            .or_else(|| coordinates.map(|c| c.formatted()))
            .unwrap_or_else(|| LOCATION_UNAVAILABLE.to_string());

        Self {
            user_id: report.reporter_id().to_string(),
            username: report.reporter_username().to_string(),
            reporter_name: report.reporter_display_name().to_string(),
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            location,
            priority: Priority::Critical,
            incident_type: INCIDENT_TYPE.to_string(),
            description: DESCRIPTION.to_string(),
            status: "PENDING".to_string(),
            timestamp: report.created_at(),
        }
    }
}

/// Sink acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn submit(&self, payload: &SosPayload) -> Result<SinkAck>;
}

/// Sink backed by `POST /sos-report`
pub struct HttpIncidentSink {
    client: Client,
    endpoint: String,
}

impl HttpIncidentSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build incident sink HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/sos-report", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl IncidentSink for HttpIncidentSink {
    async fn submit(&self, payload: &SosPayload) -> Result<SinkAck> {
        debug!("POST {} for {}", self.endpoint, payload.username);

        let res = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .context("Failed to reach incident sink")?
            .error_for_status()?;

        let ack = res.json::<SinkAck>().await.context("Malformed incident sink response")?;
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Principal, PrincipalId, Role};
    use crate::sos::report::Coordinates;

    fn report() -> SosReport {
        let mut p = Principal::from_role(Role::Tanod);
        p.id = PrincipalId::new("9");
        p.username = "tanod9".to_string();
        p.display_name = Some("Pedro".to_string());
        SosReport::draft(&p)
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut r = report();
        r.record_fix(Coordinates::new(14.5, 121.25));
        r.set_address("Barangay Hall, Quezon City".to_string());

        let json = serde_json::to_value(SosPayload::from_report(&r)).unwrap();
        assert_eq!(json["userId"], "9");
        assert_eq!(json["username"], "tanod9");
        assert_eq!(json["reporterName"], "Pedro");
        assert_eq!(json["latitude"], 14.5);
        assert_eq!(json["longitude"], 121.25);
        assert_eq!(json["location"], "Barangay Hall, Quezon City");
        assert_eq!(json["priority"], "CRITICAL");
        assert_eq!(json["incidentType"], INCIDENT_TYPE);
        assert_eq!(json["status"], "PENDING");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_payload_timestamp_is_alert_creation_time() {
        let r = report();
        let first = SosPayload::from_report(&r);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = SosPayload::from_report(&r);
        assert_eq!(first.timestamp, r.created_at());
        assert_eq!(second.timestamp, first.timestamp);
    }

    #[test]
    fn test_degraded_payload_has_null_coordinates() {
        let mut r = report();
        r.degrade();
        let payload = SosPayload::from_report(&r);
        assert_eq!(payload.latitude, None);
        assert_eq!(payload.longitude, None);
        assert_eq!(payload.location, LOCATION_UNAVAILABLE);
    }

    #[test]
    fn test_ack_requires_success_field() {
        assert!(serde_json::from_str::<SinkAck>(r#"{"success": true}"#).is_ok());
        assert!(serde_json::from_str::<SinkAck>(r#"{"message": "ok"}"#).is_err());
    }
}
