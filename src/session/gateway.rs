//! Credential Gateway
//!
//! Remote authentication against the PatrolNet backend (`POST /login`) and
//! user record lookup (`GET /api/user/{username}`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::state::Credentials;
use crate::identity::{Principal, PrincipalId, Role, Surface};

/// Transport-level outcome of a gateway call, before it is mapped into
/// [`AuthError`](super::AuthError).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway returned HTTP {status}")]
    Status { status: u16, message: Option<String> },
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait CredentialGateway: Send + Sync {
    async fn login(&self, credentials: &Credentials, surface: Surface) -> Result<LoginResponse, GatewayError>;

    async fn fetch_profile(&self, username: &str) -> Result<UserRecord, GatewayError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    client_type: &'static str,
}

/// Body of a 2xx `/login` reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// User row as returned by the backend. Column names come back either
/// lower-case or upper-case depending on the endpoint; when both appear the
/// lower-case one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "UserRow")]
pub struct UserRecord {
    pub id: Value,
    pub username: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    pub image: Option<String>,
}

/// Both spellings of every column, as sent
#[derive(Deserialize)]
struct UserRow {
    #[serde(default)]
    id: Value,
    #[serde(default, rename = "ID")]
    id_upper: Value,
    username: Option<String>,
    #[serde(rename = "USER")]
    username_upper: Option<String>,
    role: Option<String>,
    #[serde(rename = "ROLE")]
    role_upper: Option<String>,
    name: Option<String>,
    #[serde(rename = "NAME")]
    name_upper: Option<String>,
    email: Option<String>,
    #[serde(rename = "EMAIL")]
    email_upper: Option<String>,
    address: Option<String>,
    #[serde(rename = "ADDRESS")]
    address_upper: Option<String>,
    status: Option<String>,
    #[serde(rename = "STATUS")]
    status_upper: Option<String>,
    image: Option<String>,
    #[serde(rename = "IMAGE")]
    image_upper: Option<String>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: if row.id.is_null() { row.id_upper } else { row.id },
            username: row.username.or(row.username_upper),
            role: row.role.or(row.role_upper),
            name: row.name.or(row.name_upper),
            email: row.email.or(row.email_upper),
            address: row.address.or(row.address_upper),
            status: row.status.or(row.status_upper),
            image: row.image.or(row.image_upper),
        }
    }
}

impl UserRecord {
    /// Ids arrive as numbers or strings
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn into_principal(self, fallback_username: &str, role: Role) -> Principal {
        let id = PrincipalId::new(self.id_string().unwrap_or_default());
        Principal {
            id,
            username: non_empty(self.username).unwrap_or_else(|| fallback_username.to_string()),
            display_name: non_empty(self.name),
            role,
            status: non_empty(self.status),
            email: non_empty(self.email),
            address: non_empty(self.address),
            avatar_ref: non_empty(self.image),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Gateway backed by the PatrolNet REST API
pub struct HttpCredentialGateway {
    client: Client,
    base_url: String,
}

impl HttpCredentialGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build gateway HTTP client")?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn read<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, GatewayError> {
        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.or(b.message));
            return Err(GatewayError::Status { status: status.as_u16(), message });
        }
        res.json::<T>().await.map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl CredentialGateway for HttpCredentialGateway {
    async fn login(&self, credentials: &Credentials, surface: Surface) -> Result<LoginResponse, GatewayError> {
        let body = LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            client_type: surface.client_type(),
        };
        debug!("POST {} as {}", self.endpoint("login"), surface.client_type());

        let res = self
            .client
            .post(self.endpoint("login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::read(res).await
    }

    async fn fetch_profile(&self, username: &str) -> Result<UserRecord, GatewayError> {
        let url = self.endpoint(&format!("api/user/{}", urlencoding::encode(username)));
        debug!("GET {}", url);

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::read(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_request_wire_shape() {
        let body = LoginRequest { username: "admin1", password: "x", client_type: "web" };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"username": "admin1", "password": "x", "clientType": "web"}));
    }

    #[test]
    fn test_user_record_accepts_upper_case_role() {
        let response: LoginResponse = serde_json::from_value(json!({
            "success": true,
            "message": "Login successful",
            "user": {"ID": 7, "ROLE": "Tanod", "NAME": "Juan"}
        }))
        .unwrap();
        let user = response.user.unwrap();
        assert_eq!(user.role.as_deref(), Some("Tanod"));
        assert_eq!(user.id_string().as_deref(), Some("7"));
    }

    #[test]
    fn test_user_record_with_both_spellings_prefers_lower_case() {
        let response: LoginResponse = serde_json::from_value(json!({
            "success": true,
            "user": {"id": 1, "ID": 99, "role": "Admin", "ROLE": "Tanod", "name": "A", "NAME": "B", "EMAIL": "a@example.com"}
        }))
        .unwrap();
        let user = response.user.unwrap();
        assert_eq!(user.role.as_deref(), Some("Admin"));
        assert_eq!(user.id_string().as_deref(), Some("1"));
        assert_eq!(user.name.as_deref(), Some("A"));
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_into_principal_uses_login_username_as_fallback() {
        let record: UserRecord = serde_json::from_value(json!({
            "id": "u-1", "role": "Admin", "name": "A", "email": "", "image": null
        }))
        .unwrap();
        let principal = record.into_principal("admin1", Role::Admin);
        assert_eq!(principal.id.as_str(), "u-1");
        assert_eq!(principal.username, "admin1");
        assert_eq!(principal.display_name.as_deref(), Some("A"));
        assert_eq!(principal.email, None);
        assert_eq!(principal.avatar_ref, None);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let gateway = HttpCredentialGateway::new("http://localhost:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(gateway.endpoint("login"), "http://localhost:3001/login");
        assert_eq!(gateway.endpoint("/api/user/x"), "http://localhost:3001/api/user/x");
    }
}
