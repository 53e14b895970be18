use super::gateway::GatewayError;
use super::state::AuthState;

/// Failures surfaced to views by the session controller.
///
/// Every gateway or storage problem is folded into one of these before it
/// leaves the controller. The `Display` text is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Bad local input; no network call was made
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidCredentials(String),
    /// Role not permitted on this surface, or an explicit denial from the gateway
    #[error("{0}")]
    AccessDenied(String),
    #[error("Login failed. Please try again. ({0})")]
    Transport(String),
    /// Another login is in flight or a session is already active
    #[error("Session is {0}; finish or log out first")]
    Busy(AuthState),
    /// The session changed (logout) while this request was in flight
    #[error("Login was cancelled")]
    Superseded,
}

impl AuthError {
    /// True when re-entering credentials could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Validation(_) | AuthError::InvalidCredentials(_) | AuthError::Transport(_)
        )
    }
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Status { status: 401, .. } => {
                AuthError::InvalidCredentials("Invalid username or password".to_string())
            }
            GatewayError::Status { status: 400, message } => AuthError::Validation(
                message.unwrap_or_else(|| "Please check your input".to_string()),
            ),
            GatewayError::Status { status: 403, message } => {
                AuthError::AccessDenied(message.unwrap_or_else(|| "Access denied".to_string()))
            }
            GatewayError::Status { status, message } => AuthError::Transport(match message {
                Some(m) => format!("HTTP {}: {}", status, m),
                None => format!("HTTP {}", status),
            }),
            GatewayError::Transport(e) => AuthError::Transport(e),
            GatewayError::Malformed(e) => AuthError::Transport(format!("unexpected response: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, message: Option<&str>) -> GatewayError {
        GatewayError::Status { status, message: message.map(str::to_string) }
    }

    #[test]
    fn test_gateway_status_mapping() {
        assert!(matches!(AuthError::from(status(401, None)), AuthError::InvalidCredentials(_)));
        assert_eq!(
            AuthError::from(status(400, Some("username too long"))),
            AuthError::Validation("username too long".to_string())
        );
        assert_eq!(
            AuthError::from(status(403, Some("Account suspended"))),
            AuthError::AccessDenied("Account suspended".to_string())
        );
        assert_eq!(
            AuthError::from(status(403, None)),
            AuthError::AccessDenied("Access denied".to_string())
        );
        assert!(matches!(AuthError::from(status(500, None)), AuthError::Transport(_)));
        assert!(matches!(AuthError::from(status(302, None)), AuthError::Transport(_)));
    }

    #[test]
    fn test_transport_and_malformed_map_to_transport() {
        let err = AuthError::from(GatewayError::Transport("connection refused".into()));
        assert_eq!(err, AuthError::Transport("connection refused".into()));

        let err = AuthError::from(GatewayError::Malformed("missing field `success`".into()));
        assert!(matches!(err, AuthError::Transport(m) if m.contains("missing field")));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(AuthError::InvalidCredentials("x".into()).is_retryable());
        assert!(AuthError::Transport("x".into()).is_retryable());
        assert!(!AuthError::AccessDenied("x".into()).is_retryable());
        assert!(!AuthError::Superseded.is_retryable());
    }
}
