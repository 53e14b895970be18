//! SOS Module
//!
//! One-tap emergency alerts for field users: permission, location,
//! best-effort address resolution and submission, with a cheap retry path
//! and an explicit send-without-location fallback.

pub mod location;
mod pipeline;
mod report;
pub mod sink;

pub use location::{ConfiguredLocationProvider, LocationProvider, NominatimGeocoder, Permission};
pub use pipeline::{EmergencyPipeline, SosConfig, TriggerError};
pub use report::{Affordance, Coordinates, EmergencyContact, SosFailure, SosReport, SubmissionState, LOCATION_UNAVAILABLE};
pub use sink::{HttpIncidentSink, IncidentSink, Priority, SinkAck, SosPayload};
