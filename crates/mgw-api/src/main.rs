//! # mgw-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Membership Gateway.
//! Binds to a configurable port (default 8080).

use mgw_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok();
    let config = AppConfig { port, auth_token };

    // Attempt to create the CRM client from environment.
    let crm = match mgw_crm_client::CrmConfig::from_env() {
        Ok(crm_config) => {
            tracing::info!("CRM client configured");
            match mgw_crm_client::CrmClient::new(crm_config) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!("Failed to create CRM client: {e}");
                    return Err(e.into());
                }
            }
        }
        Err(e) => {
            tracing::warn!("CRM client not configured: {e}. Endpoints will return 503.");
            None
        }
    };

    let state = AppState::with_config(config, crm);
    let app = mgw_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Membership Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
