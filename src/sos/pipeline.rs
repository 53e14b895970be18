//! Emergency Alert Pipeline
//!
//! permission -> location -> reverse geocode (best effort) -> submission.
//! Steps run strictly in order; every I/O step is time-bounded and every
//! failure lands in the report as a [`SosFailure`] instead of escaping.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::location::{LocationProvider, Permission};
use super::report::{EmergencyContact, SosFailure, SosReport, SubmissionState};
use super::sink::{IncidentSink, SosPayload};
use crate::identity::Principal;

#[derive(Debug, Clone)]
pub struct SosConfig {
    pub location_timeout: Duration,
    pub geocode_timeout: Duration,
    pub submit_timeout: Duration,
    /// Oldest fix a retry may reuse; `None` reuses any fix
    pub fix_max_age: Option<Duration>,
    pub contact: EmergencyContact,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            location_timeout: Duration::from_secs(15),
            geocode_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(10),
            fix_max_age: None,
            contact: EmergencyContact::default(),
        }
    }
}

/// Why a run could not start
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    #[error("An emergency alert is already being sent")]
    Busy,
    #[error("User data not found. Please log in again.")]
    MissingReporter,
}

/// Clears the running flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct EmergencyPipeline {
    location: Arc<dyn LocationProvider>,
    sink: Arc<dyn IncidentSink>,
    config: SosConfig,
    running: AtomicBool,
    progress: watch::Sender<SubmissionState>,
}

impl EmergencyPipeline {
    pub fn new(location: Arc<dyn LocationProvider>, sink: Arc<dyn IncidentSink>) -> Self {
        Self::with_config(location, sink, SosConfig::default())
    }

    pub fn with_config(location: Arc<dyn LocationProvider>, sink: Arc<dyn IncidentSink>, config: SosConfig) -> Self {
        let (progress, _) = watch::channel(SubmissionState::Draft);
        Self {
            location,
            sink,
            config,
            running: AtomicBool::new(false),
            progress,
        }
    }

    pub fn config(&self) -> &SosConfig {
        &self.config
    }

    /// Whether the SOS affordance should be disabled right now
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// State of the most recent run, step by step
    pub fn progress(&self) -> watch::Receiver<SubmissionState> {
        self.progress.subscribe()
    }

    fn begin(&self) -> Result<RunGuard<'_>, TriggerError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TriggerError::Busy)?;
        Ok(RunGuard(&self.running))
    }

    fn advance(&self, report: &mut SosReport, state: SubmissionState) {
        debug!("SOS {}: {:?}", report.id(), state);
        report.set_state(state.clone());
        self.progress.send_replace(state);
    }

    fn fail(&self, report: &mut SosReport, failure: SosFailure) {
        warn!("🚨 SOS {} failed: {}", report.id(), failure);
        self.advance(report, SubmissionState::Failed(failure));
    }

    /// Capture and send one alert for `reporter`
    pub async fn trigger(&self, reporter: &Principal) -> Result<SosReport, TriggerError> {
        if reporter.is_partial() {
            return Err(TriggerError::MissingReporter);
        }
        let _guard = self.begin()?;

        let mut report = SosReport::draft(reporter);
        info!("🚨 SOS triggered by '{}' ({})", reporter.username, report.id());
        self.progress.send_replace(SubmissionState::Draft);

        if self.acquire(&mut report).await {
            self.submit(&mut report).await;
        }
        Ok(report)
    }

    /// Re-run a failed report. A report that still holds a usable fix (or was
    /// explicitly degraded) goes straight to submission; anything else starts
    /// over at the permission step. Non-failed reports come back untouched.
    pub async fn retry(&self, mut report: SosReport) -> Result<SosReport, TriggerError> {
        if report.submission_state().failure().is_none() {
            debug!("SOS {} is not failed; nothing to retry", report.id());
            return Ok(report);
        }
        let _guard = self.begin()?;

        if report.is_degraded() || report.has_reusable_fix(self.config.fix_max_age, Utc::now()) {
            info!("Retrying SOS {} submission with existing location", report.id());
            self.submit(&mut report).await;
        } else {
            info!("Retrying SOS {} from the permission step", report.id());
            report.forget_fix();
            if self.acquire(&mut report).await {
                self.submit(&mut report).await;
            }
        }
        Ok(report)
    }

    /// Send without a location, at the user's explicit request
    pub async fn confirm_fallback(&self, mut report: SosReport) -> Result<SosReport, TriggerError> {
        if report.submission_state() == &SubmissionState::Sent {
            return Ok(report);
        }
        let _guard = self.begin()?;

        info!("Sending SOS {} without location", report.id());
        report.degrade();
        self.submit(&mut report).await;
        Ok(report)
    }

    /// Steps 1-3. Returns false when the report ended `Failed`.
    async fn acquire(&self, report: &mut SosReport) -> bool {
        self.advance(report, SubmissionState::AcquiringPermission);
        match self.location.request_permission().await {
            Ok(Permission::Granted) => {}
            Ok(Permission::Denied) => {
                self.fail(report, SosFailure::PermissionDenied);
                return false;
            }
            Err(e) => {
                warn!("Permission request errored: {:#}", e);
                self.fail(report, SosFailure::PermissionDenied);
                return false;
            }
        }

        self.advance(report, SubmissionState::AcquiringLocation);
        let window = self.config.location_timeout;
        let fix = match timeout(window, self.location.current_position(window)).await {
            Ok(Ok(fix)) if fix.is_valid() => fix,
            Ok(Ok(fix)) => {
                warn!("Discarding invalid location fix {:?}", fix);
                self.fail(report, SosFailure::LocationTimeout);
                return false;
            }
            Ok(Err(e)) => {
                warn!("Location error: {:#}", e);
                self.fail(report, SosFailure::LocationTimeout);
                return false;
            }
            Err(_) => {
                self.fail(report, SosFailure::LocationTimeout);
                return false;
            }
        };
        report.record_fix(fix);

        let address = match timeout(self.config.geocode_timeout, self.location.reverse_geocode(fix)).await {
            Ok(Ok(address)) if !address.trim().is_empty() => address,
            Ok(Ok(_)) => fix.formatted(),
            Ok(Err(e)) => {
                warn!("Reverse geocoding error: {:#}", e);
                fix.formatted()
            }
            Err(_) => {
                warn!("Reverse geocoding timed out");
                fix.formatted()
            }
        };
        report.set_address(address);
        true
    }

    /// Steps 4-5
    async fn submit(&self, report: &mut SosReport) {
        self.advance(report, SubmissionState::Submitting);
        report.count_attempt();
        let payload = SosPayload::from_report(report);

        match timeout(self.config.submit_timeout, self.sink.submit(&payload)).await {
            Ok(Ok(ack)) if ack.success => {
                self.advance(report, SubmissionState::Sent);
                info!("✅ SOS {} sent to authorities", report.id());
            }
            Ok(Ok(ack)) => {
                let reason = ack.message.unwrap_or_else(|| "report rejected".to_string());
                self.fail(report, SosFailure::SubmissionError(reason));
            }
            Ok(Err(e)) => self.fail(report, SosFailure::SubmissionError(format!("{:#}", e))),
            Err(_) => self.fail(report, SosFailure::SubmissionError("request timed out".to_string())),
        }
    }
}
