//! # Intake runner
//!
//! Main binary for the patient intake service: loads `.env`, resolves the submission
//! configuration once, and serves the REST API until it fails or receives Ctrl-C.

use api_rest::AppState;
use intake_core::{SubmissionClient, DEFAULT_REST_ADDR};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake_run=info".parse()?)
                .add_directive("intake_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("INTAKE_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = api_rest::submission_config_from_env()?;

    tracing::info!("++ Starting intake REST on {}", rest_addr);
    tracing::info!(
        "++ Records endpoint {} ({} attempts, {:?} timeout, worst case {:?})",
        config.endpoint(),
        config.max_attempts(),
        config.attempt_timeout(),
        config.worst_case_latency()
    );

    let state = AppState::new(SubmissionClient::new(config)?);

    tokio::select! {
        result = api_rest::serve(&rest_addr, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("++ Shutting down");
        }
    }

    Ok(())
}
