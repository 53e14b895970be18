//! Identity Module
//!
//! Shared taxonomy for both client surfaces: roles, surfaces and the
//! authenticated principal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles assigned by the credential gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Tanod,
    Resident,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Tanod => "Tanod",
            Role::Resident => "Resident",
        }
    }

    /// Field users share the single-view mobile/home experience
    pub fn is_field_user(&self) -> bool {
        matches!(self, Role::Tanod | Role::Resident)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "tanod" => Ok(Role::Tanod),
            "resident" => Ok(Role::Resident),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A distinct client application context with its own allowed-role set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Surface {
    WebAdmin,
    MobileField,
}

impl Surface {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Surface::WebAdmin => &[Role::Admin],
            Surface::MobileField => &[Role::Tanod, Role::Resident],
        }
    }

    pub fn admits(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    /// Value sent to the gateway as `clientType`
    pub fn client_type(&self) -> &'static str {
        match self {
            Surface::WebAdmin => "web",
            Surface::MobileField => "mobile",
        }
    }

    /// Denial text shown when the gateway authenticates a role this surface refuses
    pub fn denial_message(&self) -> &'static str {
        match self {
            Surface::WebAdmin => "Access denied. Only Admin users are allowed to login.",
            Surface::MobileField => {
                "Only Tanod and Resident users are allowed to access the mobile application."
            }
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::WebAdmin => write!(f, "web-admin"),
            Surface::MobileField => write!(f, "mobile-field"),
        }
    }
}

impl FromStr for Surface {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web-admin" | "web" => Ok(Surface::WebAdmin),
            "mobile-field" | "mobile" => Ok(Surface::MobileField),
            other => anyhow::bail!("unknown surface '{}' (expected web-admin or mobile-field)", other),
        }
    }
}

/// Opaque identifier issued by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated actor.
///
/// `role` is only ever taken from the credential gateway at login time (or
/// from the marker that login persisted); nothing else writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub avatar_ref: Option<String>,
}

impl Principal {
    /// Minimal principal rebuilt from a persisted role alone
    pub fn from_role(role: Role) -> Self {
        Self {
            id: PrincipalId::default(),
            username: String::new(),
            display_name: None,
            role,
            status: None,
            email: None,
            address: None,
            avatar_ref: None,
        }
    }

    /// True when identity attributes still need to be fetched
    pub fn is_partial(&self) -> bool {
        self.id.is_empty() || self.username.is_empty()
    }

    /// Name to show in headers and reports
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
