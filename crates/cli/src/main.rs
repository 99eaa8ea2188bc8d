use anyhow::Context;
use clap::{Parser, Subcommand};
use intake_core::{
    record::tool_definition, reply, PatientRecord, SubmissionClient, SubmissionConfig,
    SubmissionEnv,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Patient intake submission CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a record file to the records backend
    Submit {
        /// Path to the record JSON (`PatientInformation` and `Address` groups)
        file: PathBuf,
        /// Endpoint to submit to (overrides PATIENT_API_URL)
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the save tool definition and parameters schema
    Schema,
    /// Print the read-back summary of a complete record file
    Summary {
        /// Path to the record JSON
        file: PathBuf,
    },
    /// List the fields a record file is missing
    Check {
        /// Path to the record JSON
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Submit { file, endpoint }) => {
            let record = load_record(&file)?;
            let config = submission_config(endpoint)?;
            let client = SubmissionClient::new(config)?;

            let outcome = client.submit(&record).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            println!(
                "{}",
                reply::outcome_message(&outcome, Some(record.personal.first_name.as_str()))
            );
            if !outcome.is_success() {
                anyhow::bail!("submission failed");
            }
        }
        Some(Commands::Schema) => {
            println!("{}", serde_json::to_string_pretty(&tool_definition())?);
        }
        Some(Commands::Summary { file }) => {
            let record = load_record(&file)?;
            record.ensure_complete()?;
            println!("{}", reply::confirmation_summary(&record));
        }
        Some(Commands::Check { file }) => {
            let record = load_record(&file)?;
            let missing = record.missing_fields();
            if missing.is_empty() {
                println!("Record is complete.");
            } else {
                for field in &missing {
                    println!("missing: {} ({})", field.wire_name(), field.label());
                }
                anyhow::bail!("{} field(s) missing", missing.len());
            }
        }
        None => {
            println!("Use 'intake --help' for commands");
        }
    }

    Ok(())
}

fn load_record(path: &Path) -> anyhow::Result<PatientRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading record file {}", path.display()))?;
    PatientRecord::from_json(&text).with_context(|| format!("parsing {}", path.display()))
}

fn submission_config(endpoint: Option<String>) -> anyhow::Result<SubmissionConfig> {
    let config = SubmissionConfig::from_env(SubmissionEnv {
        endpoint: endpoint.or_else(|| std::env::var("PATIENT_API_URL").ok()),
        bearer_token: std::env::var("PATIENT_API_TOKEN").ok(),
        timeout_secs: std::env::var("INTAKE_SUBMIT_TIMEOUT_SECS").ok(),
        max_attempts: std::env::var("INTAKE_SUBMIT_MAX_ATTEMPTS").ok(),
        backoff_ms: std::env::var("INTAKE_SUBMIT_BACKOFF_MS").ok(),
    })?;
    Ok(config)
}
