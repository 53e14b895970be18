//! PatrolNet console client
//!
//! Drives the session controller and SOS pipeline against a live PatrolNet
//! backend from the terminal.

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

use patrolnet::config::PatrolConfig;
use patrolnet::session::{
    AuthState, Credentials, FileSessionStore, HttpCredentialGateway, SessionController, ViewId,
};
use patrolnet::sos::{
    Affordance, ConfiguredLocationProvider, EmergencyPipeline, HttpIncidentSink, NominatimGeocoder,
    SosReport, SubmissionState,
};
use patrolnet::utils::logging::{init_logging, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_logging(DEFAULT_FILTER)?;

    let config = PatrolConfig::from_env()?;

    println!("\n{}", "═".repeat(60));
    println!("🚓 PatrolNet v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!("Surface: {} | Backend: {}", config.surface, config.api_url);
    println!("{}\n", "═".repeat(60));

    let gateway = Arc::new(HttpCredentialGateway::new(&config.api_url, config.request_timeout)?);
    let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
    let controller = SessionController::restore(config.surface, gateway, store)
        .await
        .with_request_timeout(config.request_timeout);

    let geocoder = NominatimGeocoder::new(&config.geocoder_url, config.request_timeout)?;
    let location = Arc::new(ConfiguredLocationProvider::new(config.device_position).with_geocoder(geocoder));
    let sink = Arc::new(HttpIncidentSink::new(&config.api_url, config.request_timeout)?);
    let pipeline = EmergencyPipeline::with_config(location, sink, config.sos_config());

    let mut current_view = controller.admitted_routes().landing();
    let mut last_report: Option<SosReport> = None;

    if let Some(principal) = controller.session().principal() {
        println!("💾 Session restored: logged in as {}", principal.role);
    }
    print_help();

    loop {
        print!("🚓 {} > ", current_view.path());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let mut parts = input.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "quit" | "exit" => break,
            "help" => print_help(),
            "login" => {
                let (Some(username), Some(password)) = (parts.next(), parts.next()) else {
                    println!("Usage: login <username> <password>");
                    continue;
                };
                match controller.login(Credentials::new(username, password)).await {
                    Ok(principal) => {
                        current_view = controller.admitted_routes().landing();
                        println!("✅ Logged in as: {} ({})", principal.label(), principal.role);
                    }
                    Err(e) => println!("❌ {}", e),
                }
            }
            "logout" => {
                let session = controller.logout().await;
                last_report = None;
                current_view = session.routes().landing();
                println!("👋 Logged out");
            }
            "whoami" => {
                let session = controller.session();
                match session.principal() {
                    Some(p) => println!(
                        "{} | role: {} | id: {} | status: {}",
                        p.label(),
                        p.role,
                        p.id,
                        p.status.as_deref().unwrap_or("-")
                    ),
                    None => println!("Not logged in ({})", session.auth_state()),
                }
            }
            "profile" => match controller.refresh_profile().await {
                Ok(p) => println!("Profile refreshed: {} <{}>", p.label(), p.email.as_deref().unwrap_or("-")),
                Err(e) => println!("❌ {}", e),
            },
            "routes" => {
                let routes = controller.admitted_routes();
                for view in routes.views() {
                    let marker = if *view == routes.landing() { " (landing)" } else { "" };
                    println!("  {}{}", view.path(), marker);
                }
            }
            "open" => {
                let requested = parts.next().unwrap_or("/");
                let routes = controller.admitted_routes();
                let resolved = routes.resolve_path(requested);
                if ViewId::from_path(requested) != Some(resolved) {
                    println!("↪ Redirected to {}", resolved.path());
                }
                current_view = resolved;
            }
            "sos" => {
                let session = controller.session();
                let Some(principal) = session.principal().filter(|p| p.role.is_field_user()) else {
                    println!("SOS is available to signed-in Tanod and Resident users");
                    continue;
                };
                match pipeline.trigger(principal).await {
                    Ok(report) => last_report = Some(show_report(&pipeline, report)),
                    Err(e) => println!("❌ {}", e),
                }
            }
            "retry" | "fallback" => {
                let Some(report) = last_report.take() else {
                    println!("No emergency alert to act on");
                    continue;
                };
                let result = if command == "retry" {
                    pipeline.retry(report.clone()).await
                } else {
                    pipeline.confirm_fallback(report.clone()).await
                };
                match result {
                    Ok(report) => last_report = Some(show_report(&pipeline, report)),
                    Err(e) => {
                        println!("❌ {}", e);
                        last_report = Some(report);
                    }
                }
            }
            "dismiss" => {
                if last_report.take().is_some() {
                    println!("Alert dismissed");
                }
            }
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }

        if controller.session().auth_state() == AuthState::Anonymous && current_view == ViewId::FieldHome {
            current_view = ViewId::Home;
        }
    }

    info!("PatrolNet console exiting");
    Ok(())
}

fn show_report(pipeline: &EmergencyPipeline, report: SosReport) -> SosReport {
    match report.submission_state() {
        SubmissionState::Sent => {
            println!("🚨 SOS Sent Successfully. Help is on the way.");
            println!("   Location: {}", report.resolved_address().unwrap_or("-"));
        }
        SubmissionState::Failed(failure) => println!("⚠️  {}", failure),
        other => println!("SOS state: {:?}", other),
    }

    for action in report.affordances(&pipeline.config().contact) {
        match action {
            Affordance::Retry => println!("   • retry      - try sending again"),
            Affordance::SendWithoutLocation => println!("   • fallback   - send without location"),
            Affordance::OpenSettings => println!("   • enable location access in system settings"),
            Affordance::CallEmergency { uri } => println!("   • call       - {}", uri),
            Affordance::Dismiss => println!("   • dismiss    - discard this alert"),
        }
    }
    report
}

fn print_help() {
    println!("💡 Commands: login <user> <pass> | logout | whoami | profile | routes | open <path>");
    println!("             sos | retry | fallback | dismiss | help | quit\n");
}
