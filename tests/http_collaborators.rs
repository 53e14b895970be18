//! HTTP collaborators against an in-process mock backend

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use patrolnet::identity::{Principal, PrincipalId, Role, Surface};
use patrolnet::session::{
    AuthError, CredentialGateway, Credentials, GatewayError, HttpCredentialGateway, MemorySessionStore,
    SessionController,
};
use patrolnet::sos::{
    Coordinates, EmergencyPipeline, HttpIncidentSink, IncidentSink, LocationProvider, NominatimGeocoder,
    Permission, SosFailure, SosPayload, SubmissionState,
};

type Received = Arc<Mutex<Vec<Value>>>;

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let username = body["username"].as_str().unwrap_or_default();
    let client_type = body["clientType"].as_str().unwrap_or_default();
    match username {
        "" => (StatusCode::BAD_REQUEST, Json(json!({"error": "Username and password are required"}))),
        "admin1" => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Login successful",
                "user": {"ID": 1, "USER": "admin1", "ROLE": "Admin", "NAME": "Alma Reyes", "STATUS": "Active"}
            })),
        ),
        "resident1" if client_type == "mobile" => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "user": {"id": "31", "username": "resident1", "role": "Resident", "name": "Rosa"}
            })),
        ),
        "suspended" => (StatusCode::FORBIDDEN, Json(json!({"error": "Account is suspended"}))),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid credentials"}))),
    }
}

async fn user(Path(username): Path<String>) -> (StatusCode, Json<Value>) {
    if username == "admin1" {
        (
            StatusCode::OK,
            Json(json!({"ID": 1, "USER": "admin1", "ROLE": "Admin", "NAME": "Alma Reyes", "EMAIL": "alma@example.com"})),
        )
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"message": "User not found"})))
    }
}

async fn sos_report(State(received): State<Received>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let flaky = body["username"] == "flaky";
    received.lock().unwrap().push(body);
    if flaky {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false})))
    } else {
        (StatusCode::CREATED, Json(json!({"success": true, "message": "SOS report received"})))
    }
}

async fn reverse(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let lat = params.get("lat").cloned().unwrap_or_default();
    Json(json!({"display_name": format!("Barangay near {}", lat)}))
}

/// Serve the mock backend on an ephemeral port
async fn spawn_backend() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/login", post(login))
        .route("/api/user/{username}", get(user))
        .route("/sos-report", post(sos_report))
        .route("/reverse", get(reverse))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), received)
}

fn gateway(base: &str) -> HttpCredentialGateway {
    HttpCredentialGateway::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_gateway_status_codes() {
    let (base, _) = spawn_backend().await;
    let gateway = gateway(&base);

    let ok = gateway.login(&Credentials::new("admin1", "pw"), Surface::WebAdmin).await.unwrap();
    assert!(ok.success);
    assert_eq!(ok.user.unwrap().role.as_deref(), Some("Admin"));

    let denied = gateway.login(&Credentials::new("nobody", "pw"), Surface::WebAdmin).await;
    assert_eq!(
        denied.unwrap_err(),
        GatewayError::Status { status: 401, message: Some("Invalid credentials".into()) }
    );

    let suspended = gateway.login(&Credentials::new("suspended", "pw"), Surface::WebAdmin).await;
    assert_eq!(
        suspended.unwrap_err(),
        GatewayError::Status { status: 403, message: Some("Account is suspended".into()) }
    );

    let missing = gateway.login(&Credentials::new("", "pw"), Surface::WebAdmin).await;
    assert!(matches!(missing, Err(GatewayError::Status { status: 400, .. })));
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    // nothing listens on the discard port
    let gateway = HttpCredentialGateway::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let result = gateway.login(&Credentials::new("admin1", "pw"), Surface::WebAdmin).await;
    assert!(matches!(result, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_controller_over_http() {
    let (base, _) = spawn_backend().await;
    let store = Arc::new(MemorySessionStore::new());
    let controller = SessionController::new(Surface::WebAdmin, Arc::new(gateway(&base)), store.clone());

    let err = controller.login(Credentials::new("nobody", "pw")).await.unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials("Invalid username or password".into()));
    let err = controller.login(Credentials::new("suspended", "pw")).await.unwrap_err();
    assert_eq!(err, AuthError::AccessDenied("Account is suspended".into()));

    let principal = controller.login(Credentials::new("admin1", "pw")).await.unwrap();
    assert_eq!(principal.id.as_str(), "1");
    assert_eq!(principal.label(), "Alma Reyes");
    assert!(store.raw().unwrap().contains("\"loggedIn\":true"));

    let refreshed = controller.refresh_profile().await.unwrap();
    assert_eq!(refreshed.email.as_deref(), Some("alma@example.com"));
}

#[tokio::test]
async fn test_mobile_controller_over_http() {
    let (base, _) = spawn_backend().await;
    let store = Arc::new(MemorySessionStore::new());
    let mobile = SessionController::new(Surface::MobileField, Arc::new(gateway(&base)), store);

    let principal = mobile.login(Credentials::new("resident1", "pw")).await.unwrap();
    assert_eq!(principal.role, Role::Resident);
    assert_eq!(principal.id.as_str(), "31");

    // admins are turned away from the field app
    let store = Arc::new(MemorySessionStore::new());
    let field = SessionController::new(Surface::MobileField, Arc::new(gateway(&base)), store.clone());
    let denied = field.login(Credentials::new("admin1", "pw")).await;
    assert!(matches!(denied, Err(AuthError::AccessDenied(_))));
    assert!(!field.session().is_authenticated());
    assert_eq!(store.save_count(), 0);
}

fn reporter(username: &str) -> Principal {
    let mut p = Principal::from_role(Role::Resident);
    p.id = PrincipalId::new("31");
    p.username = username.to_string();
    p
}

/// Fixed position with geocoding through the mock Nominatim
struct FixedLocation {
    geocoder: NominatimGeocoder,
}

#[async_trait::async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> anyhow::Result<Permission> {
        Ok(Permission::Granted)
    }
    async fn current_position(&self, _timeout: Duration) -> anyhow::Result<Coordinates> {
        Ok(Coordinates::new(14.5995, 120.9842))
    }
    async fn reverse_geocode(&self, at: Coordinates) -> anyhow::Result<String> {
        self.geocoder.reverse(at).await
    }
}

#[tokio::test]
async fn test_incident_sink_posts_payload() {
    let (base, received) = spawn_backend().await;
    let geocoder = NominatimGeocoder::new(base.clone(), Duration::from_secs(5)).unwrap();
    let sink = Arc::new(HttpIncidentSink::new(&base, Duration::from_secs(5)).unwrap());
    let pipeline = EmergencyPipeline::new(Arc::new(FixedLocation { geocoder }), sink);

    let report = pipeline.trigger(&reporter("resident1")).await.unwrap();
    assert_eq!(report.submission_state(), &SubmissionState::Sent);
    assert_eq!(report.resolved_address(), Some("Barangay near 14.5995"));

    let bodies = received.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["userId"], "31");
    assert_eq!(bodies[0]["priority"], "CRITICAL");
    assert_eq!(bodies[0]["incidentType"], "EMERGENCY - SOS");
    assert_eq!(bodies[0]["status"], "PENDING");
    assert_eq!(bodies[0]["location"], "Barangay near 14.5995");
}

#[tokio::test]
async fn test_incident_sink_server_error() {
    let (base, _) = spawn_backend().await;
    let sink = HttpIncidentSink::new(&base, Duration::from_secs(5)).unwrap();
    let payload: SosPayload = serde_json::from_value(json!({
        "userId": "31",
        "username": "flaky",
        "reporterName": "flaky",
        "latitude": null,
        "longitude": null,
        "location": "Location unavailable",
        "priority": "CRITICAL",
        "incidentType": "EMERGENCY - SOS",
        "description": "EMERGENCY SOS ALERT - Immediate assistance required",
        "status": "PENDING",
        "timestamp": "2026-01-01T00:00:00Z"
    }))
    .unwrap();
    assert!(sink.submit(&payload).await.is_err());

    let geocoder = NominatimGeocoder::new(base.clone(), Duration::from_secs(5)).unwrap();
    let pipeline = EmergencyPipeline::new(Arc::new(FixedLocation { geocoder }), Arc::new(sink));
    let report = pipeline.trigger(&reporter("flaky")).await.unwrap();
    assert!(matches!(
        report.submission_state(),
        SubmissionState::Failed(SosFailure::SubmissionError(_))
    ));
}
