//! Session & Access-Control Controller
//!
//! Owns the [`Session`] for one surface. Every mutation goes through the
//! transition functions here; views only see snapshots published on a
//! `watch` channel.
//!
//! Each session change bumps an epoch. A gateway response is applied only if
//! the epoch it was issued under is still current, so a logout that lands
//! while a login is in flight discards the late response.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::gateway::{CredentialGateway, LoginResponse, UserRecord};
use super::routes::RouteAdmission;
use super::state::{AuthState, Credentials, Session};
use super::store::{SessionMarker, SessionStore};
use crate::identity::{Principal, Role, Surface};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct Inner {
    session: Session,
    epoch: u64,
}

pub struct SessionController {
    surface: Surface,
    gateway: Arc<dyn CredentialGateway>,
    store: Arc<dyn SessionStore>,
    request_timeout: Duration,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<Session>,
}

impl SessionController {
    /// Start anonymous; call [`restore_session`](Self::restore_session) to rehydrate
    pub fn new(surface: Surface, gateway: Arc<dyn CredentialGateway>, store: Arc<dyn SessionStore>) -> Self {
        let session = Session::anonymous(surface);
        let (snapshots, _) = watch::channel(session.clone());
        Self {
            surface,
            gateway,
            store,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            inner: Mutex::new(Inner { session, epoch: 0 }),
            snapshots,
        }
    }

    /// Upper bound for each gateway round-trip
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Build a controller and rehydrate it from the store in one go
    pub async fn restore(
        surface: Surface,
        gateway: Arc<dyn CredentialGateway>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let controller = Self::new(surface, gateway, store);
        controller.restore_session().await;
        controller
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Current snapshot; never blocks on an in-flight transition
    pub fn session(&self) -> Session {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshots.subscribe()
    }

    pub fn admitted_routes(&self) -> RouteAdmission {
        self.session().routes()
    }

    fn publish(&self, session: &Session) {
        self.snapshots.send_replace(session.clone());
    }

    /// Rehydrate from the persisted marker. Missing, unreadable or
    /// disallowed markers all yield an anonymous session. Only applies while
    /// anonymous; otherwise returns the current session untouched.
    pub async fn restore_session(&self) -> Session {
        let mut inner = self.inner.lock().await;
        if inner.session.auth_state() != AuthState::Anonymous {
            return inner.session.clone();
        }

        let marker = match self.store.load().await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Ignoring unreadable session marker: {:#}", e);
                None
            }
        };

        let session = session_from_marker(self.surface, marker);
        if let Some(principal) = session.principal() {
            info!("💾 Session restored for role {} on {}", principal.role, self.surface);
        }
        inner.epoch += 1;
        inner.session = session;
        self.publish(&inner.session);
        inner.session.clone()
    }

    /// Authenticate against the gateway and admit the principal if its role
    /// is allowed on this surface.
    pub async fn login(&self, credentials: Credentials) -> Result<Principal, AuthError> {
        credentials.validate()?;

        let ticket = {
            let mut inner = self.inner.lock().await;
            match inner.session.auth_state() {
                AuthState::Anonymous => {}
                other => return Err(AuthError::Busy(other)),
            }
            inner.epoch += 1;
            inner.session = Session::authenticating(self.surface);
            self.publish(&inner.session);
            inner.epoch
        };
        info!("🔐 Login attempt for '{}' on {}", credentials.username, self.surface);

        let outcome = match timeout(self.request_timeout, self.gateway.login(&credentials, self.surface)).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::Transport(format!(
                "no response within {}s",
                self.request_timeout.as_secs_f32()
            ))),
        };
        let admitted = outcome.and_then(|response| self.admit(response, &credentials.username));

        let mut inner = self.inner.lock().await;
        if inner.epoch != ticket {
            debug!("Discarding login response for '{}': session moved on", credentials.username);
            return Err(AuthError::Superseded);
        }

        let principal = match admitted {
            Ok(principal) => principal,
            Err(e) => {
                warn!("Login for '{}' rejected: {}", credentials.username, e);
                inner.session = Session::anonymous(self.surface);
                self.publish(&inner.session);
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&SessionMarker::for_principal(&principal)).await {
            warn!("Login successful but failed to persist session marker: {:#}", e);
        }

        inner.session = Session::authenticated(self.surface, principal.clone());
        self.publish(&inner.session);
        info!("✅ '{}' signed in as {}", principal.username, principal.role);

        Ok(principal)
    }

    /// Local authorization gate on top of remote authentication
    fn admit(&self, response: LoginResponse, username: &str) -> Result<Principal, AuthError> {
        if !response.success {
            let message = if response.message.trim().is_empty() {
                "Invalid username or password".to_string()
            } else {
                response.message
            };
            return Err(AuthError::InvalidCredentials(message));
        }

        let user = response
            .user
            .ok_or_else(|| AuthError::Transport("login response carried no user record".to_string()))?;

        let role = match user.role.as_deref().map(str::parse::<Role>) {
            Some(Ok(role)) => role,
            Some(Err(e)) => {
                debug!("{}", e);
                return Err(AuthError::AccessDenied(self.surface.denial_message().to_string()));
            }
            None => return Err(AuthError::Transport("login response carried no role".to_string())),
        };

        if !self.surface.admits(role) {
            return Err(AuthError::AccessDenied(self.surface.denial_message().to_string()));
        }

        Ok(user.into_principal(username, role))
    }

    /// Two-phase logout: `LoggingOut` while the marker is cleared, then
    /// `Anonymous`. A no-op when already anonymous.
    pub async fn logout(&self) -> Session {
        let mut inner = self.inner.lock().await;
        if inner.session.auth_state() == AuthState::Anonymous {
            debug!("Logout requested while anonymous; nothing to do");
            return inner.session.clone();
        }

        inner.epoch += 1;
        inner.session = Session::logging_out(self.surface);
        self.publish(&inner.session);
        info!("🔴 Logout initiated on {}", self.surface);

        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear session marker: {:#}", e);
        }

        inner.session = Session::anonymous(self.surface);
        self.publish(&inner.session);
        info!("Session cleared");
        inner.session.clone()
    }

    /// Re-fetch display attributes for the signed-in principal. The role
    /// always stays the one admitted at login.
    pub async fn refresh_profile(&self) -> Result<Principal, AuthError> {
        let (ticket, username) = {
            let inner = self.inner.lock().await;
            let principal = inner
                .session
                .principal()
                .ok_or_else(|| AuthError::Validation("No active session".to_string()))?;
            if principal.username.is_empty() {
                return Err(AuthError::Validation(
                    "Session has no username; please log in again".to_string(),
                ));
            }
            (inner.epoch, principal.username.clone())
        };

        let record = match timeout(self.request_timeout, self.gateway.fetch_profile(&username)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => return Err(AuthError::Transport(e.to_string())),
            Err(_) => return Err(AuthError::Transport("profile request timed out".to_string())),
        };

        let mut inner = self.inner.lock().await;
        if inner.epoch != ticket {
            return Err(AuthError::Superseded);
        }
        let current = inner.session.principal().cloned().ok_or(AuthError::Superseded)?;
        let refreshed = merge_profile(current, record);

        inner.session = Session::authenticated(self.surface, refreshed.clone());
        self.publish(&inner.session);
        debug!("Profile refreshed for '{}'", refreshed.username);
        Ok(refreshed)
    }
}

/// Rehydration rule: a marker admits a session only when it says logged in
/// and carries a role this surface allows.
pub(crate) fn session_from_marker(surface: Surface, marker: Option<SessionMarker>) -> Session {
    let Some(marker) = marker else {
        return Session::anonymous(surface);
    };
    if !marker.logged_in {
        return Session::anonymous(surface);
    }

    let role = match marker.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            warn!("Ignoring session marker: {}", e);
            return Session::anonymous(surface);
        }
    };
    if !surface.admits(role) {
        warn!("Ignoring session marker: role {} is not allowed on {}", role, surface);
        return Session::anonymous(surface);
    }

    let principal = marker
        .principal
        .filter(|p| p.role == role)
        .unwrap_or_else(|| Principal::from_role(role));
    Session::authenticated(surface, principal)
}

fn merge_profile(mut principal: Principal, record: UserRecord) -> Principal {
    if let Some(id) = record.id_string() {
        principal.id = crate::identity::PrincipalId::new(id);
    }
    let fresh = record.into_principal(&principal.username, principal.role);
    principal.display_name = fresh.display_name.or(principal.display_name);
    principal.email = fresh.email.or(principal.email);
    principal.address = fresh.address.or(principal.address);
    principal.status = fresh.status.or(principal.status);
    principal.avatar_ref = fresh.avatar_ref.or(principal.avatar_ref);
    principal
}
