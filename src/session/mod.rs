//! Session Module
//!
//! Login, role-based admission, logout and session persistence for one
//! client surface.

mod controller;
mod error;
pub mod gateway;
mod routes;
mod state;
pub mod store;

pub use controller::SessionController;
pub use error::AuthError;
pub use gateway::{CredentialGateway, GatewayError, HttpCredentialGateway, LoginResponse, UserRecord};
pub use routes::{admitted_routes, RouteAdmission, ViewId};
pub use state::{AuthState, Credentials, Session};
pub use store::{FileSessionStore, MemorySessionStore, SessionMarker, SessionStore};
