//! PatrolNet Client Core
//!
//! Community incident-reporting and patrol-management client logic:
//! - Session & access control (login, role admission, logout, persistence)
//! - Role-gated route admission for the admin console and field app
//! - Emergency SOS pipeline (permission, location, geocoding, submission)

pub mod config;
pub mod identity;
pub mod session;
pub mod sos;
pub mod utils;

// Re-exports for convenience
pub use config::PatrolConfig;
pub use identity::{Principal, Role, Surface};
pub use session::{AuthError, Session, SessionController};
pub use sos::{EmergencyPipeline, SosReport};
