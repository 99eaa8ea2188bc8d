//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the intake REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging against a records backend. The workspace's main
//! `intake-run` binary serves the same router.

use api_rest::AppState;
use intake_core::{SubmissionClient, DEFAULT_REST_ADDR};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the intake REST API server
///
/// # Environment Variables
/// - `INTAKE_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `PATIENT_API_URL`: Records backend endpoint (required)
/// - `PATIENT_API_TOKEN`, `INTAKE_SUBMIT_*`: see `api_rest::submission_config_from_env`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the submission configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("intake_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("INTAKE_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = api_rest::submission_config_from_env()?;

    tracing::info!("-- Starting intake REST API on {}", addr);
    tracing::info!("-- Submitting records to {}", config.endpoint());

    let state = AppState::new(SubmissionClient::new(config)?);
    api_rest::serve(&addr, state).await
}
