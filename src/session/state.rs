use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::AuthError;
use super::routes::{admitted_routes, RouteAdmission};
use crate::identity::{Principal, Surface};

/// Authentication lifecycle of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
    LoggingOut,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::LoggingOut => "logging out",
        };
        f.write_str(label)
    }
}

/// Read-only snapshot of who is logged in on a surface.
///
/// Only the constructors below build sessions, which keeps
/// `Authenticated` and `principal.is_some()` equivalent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    principal: Option<Principal>,
    surface: Surface,
    auth_state: AuthState,
}

impl Session {
    pub(crate) fn anonymous(surface: Surface) -> Self {
        Self { principal: None, surface, auth_state: AuthState::Anonymous }
    }

    pub(crate) fn authenticating(surface: Surface) -> Self {
        Self { principal: None, surface, auth_state: AuthState::Authenticating }
    }

    pub(crate) fn authenticated(surface: Surface, principal: Principal) -> Self {
        Self { principal: Some(principal), surface, auth_state: AuthState::Authenticated }
    }

    pub(crate) fn logging_out(surface: Surface) -> Self {
        Self { principal: None, surface, auth_state: AuthState::LoggingOut }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_state == AuthState::Authenticated
    }

    /// Views this session may navigate to
    pub fn routes(&self) -> RouteAdmission {
        admitted_routes(self)
    }
}

/// Username/password pair submitted at login. The password never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation(
                "Please enter both username and password".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
