use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::identity::{Principal, PrincipalId};

/// Address recorded when the user sends an alert without a location fix
pub const LOCATION_UNAVAILABLE: &str = "Location unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Fallback address when reverse geocoding yields nothing
    pub fn formatted(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Why an SOS run stopped short of `Sent`. `Display` is the user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SosFailure {
    #[error("Location access is needed to send your emergency location to authorities.")]
    PermissionDenied,
    #[error("Unable to get your current location. Send emergency alert without location?")]
    LocationTimeout,
    #[error("Failed to send emergency alert ({0}). Please try again or call emergency services directly.")]
    SubmissionError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    Draft,
    AcquiringPermission,
    AcquiringLocation,
    Submitting,
    Sent,
    Failed(SosFailure),
}

impl SubmissionState {
    /// A pipeline step is running
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::AcquiringPermission | SubmissionState::AcquiringLocation | SubmissionState::Submitting
        )
    }

    pub fn failure(&self) -> Option<&SosFailure> {
        match self {
            SubmissionState::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// What the user can do next with a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Affordance {
    Retry,
    SendWithoutLocation,
    OpenSettings,
    CallEmergency { uri: String },
    Dismiss,
}

/// Hotline offered as a direct-call fallback on every SOS screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub number: String,
}

impl EmergencyContact {
    pub fn new(number: impl Into<String>) -> Self {
        Self { number: number.into() }
    }

    pub fn dial_uri(&self) -> String {
        let digits: String = self.number.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        format!("tel:{}", digits)
    }
}

impl Default for EmergencyContact {
    fn default() -> Self {
        Self::new("+639123456789")
    }
}

/// One emergency alert, owned by the pipeline for its whole life
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosReport {
    id: Uuid,
    reporter_id: PrincipalId,
    reporter_username: String,
    reporter_display_name: String,
    coordinates: Option<Coordinates>,
    located_at: Option<DateTime<Utc>>,
    resolved_address: Option<String>,
    created_at: DateTime<Utc>,
    submission_state: SubmissionState,
    degraded: bool,
    attempts: u32,
}

impl SosReport {
    pub(crate) fn draft(reporter: &Principal) -> Self {
        Self {
            id: Uuid::new_v4(),
            reporter_id: reporter.id.clone(),
            reporter_username: reporter.username.clone(),
            reporter_display_name: reporter.label().to_string(),
            coordinates: None,
            located_at: None,
            resolved_address: None,
            created_at: Utc::now(),
            submission_state: SubmissionState::Draft,
            degraded: false,
            attempts: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reporter_id(&self) -> &PrincipalId {
        &self.reporter_id
    }

    pub fn reporter_username(&self) -> &str {
        &self.reporter_username
    }

    pub fn reporter_display_name(&self) -> &str {
        &self.reporter_display_name
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn resolved_address(&self) -> Option<&str> {
        self.resolved_address.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn submission_state(&self) -> &SubmissionState {
        &self.submission_state
    }

    /// Sent (or to be sent) without a location fix
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of submissions attempted so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A retry can skip straight to submission
    pub fn has_reusable_fix(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        if self.coordinates.is_none() {
            return false;
        }
        match (max_age, self.located_at) {
            (None, _) => true,
            (Some(max_age), Some(at)) => (now - at).to_std().map(|age| age <= max_age).unwrap_or(true),
            (Some(_), None) => false,
        }
    }

    pub fn affordances(&self, contact: &EmergencyContact) -> Vec<Affordance> {
        let mut actions = match &self.submission_state {
            SubmissionState::Failed(SosFailure::PermissionDenied) => {
                vec![Affordance::OpenSettings, Affordance::SendWithoutLocation]
            }
            SubmissionState::Failed(SosFailure::LocationTimeout) => {
                vec![Affordance::SendWithoutLocation, Affordance::Retry]
            }
            SubmissionState::Failed(SosFailure::SubmissionError(_)) => vec![Affordance::Retry],
            _ => Vec::new(),
        };
        actions.push(Affordance::CallEmergency { uri: contact.dial_uri() });
        if self.submission_state.failure().is_some() {
            actions.push(Affordance::Dismiss);
        }
        actions
    }

    pub(crate) fn set_state(&mut self, state: SubmissionState) {
        self.submission_state = state;
    }

    pub(crate) fn record_fix(&mut self, at: Coordinates) {
        self.coordinates = Some(at);
        self.located_at = Some(Utc::now());
        self.resolved_address = None;
        self.degraded = false;
    }

    pub(crate) fn set_address(&mut self, address: String) {
        self.resolved_address = Some(address);
    }

    pub(crate) fn forget_fix(&mut self) {
        self.coordinates = None;
        self.located_at = None;
        self.resolved_address = None;
    }

    pub(crate) fn degrade(&mut self) {
        self.forget_fix();
        self.resolved_address = Some(LOCATION_UNAVAILABLE.to_string());
        self.degraded = true;
    }

    pub(crate) fn count_attempt(&mut self) {
        self.attempts += 1;
    }
}
