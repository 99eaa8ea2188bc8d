//! # API REST
//!
//! REST API for patient intake.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Each call gets a collection session; the conversational layer reports field values into it,
//! reads back the summary, and submits once the caller confirms. Record logic lives in
//! `intake-core`.

#![warn(rust_2018_idioms)]

pub mod sessions;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use intake_core::{
    record::tool_definition, reply, CollectionSession, DuplicateSignal, IntakeError,
    IntakeResult, RecordField, SessionState, SubmissionClient, SubmissionConfig, SubmissionEnv,
    SubmissionOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

pub use sessions::SessionRegistry;

type ApiError = (StatusCode, String);

/// Application state for the REST API server
///
/// The submission client is shared by every session; the registry holds the open sessions.
#[derive(Clone)]
pub struct AppState {
    client: SubmissionClient,
    sessions: SessionRegistry,
}

impl AppState {
    pub fn new(client: SubmissionClient) -> Self {
        Self {
            client,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        tool_schema,
        create_session,
        get_session,
        record_field,
        revert_field,
        session_summary,
        submit_session,
        delete_session,
    ),
    components(schemas(
        HealthRes,
        CreateSessionRes,
        SessionRes,
        RecordValueReq,
        RecordValueRes,
        RevertRes,
        SummaryRes,
        SubmitRes,
    ))
)]
pub struct ApiDoc;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRes {
    pub session_id: String,
}

/// Snapshot of a session's collected values.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub session_id: String,
    /// `collecting` or `submitting`
    pub state: String,
    pub created_at: String,
    pub complete: bool,
    pub missing_fields: Vec<String>,
    /// Current value per field name; `null` when not yet provided.
    pub fields: BTreeMap<String, Option<String>>,
}

impl SessionRes {
    fn from_session(session: &CollectionSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            state: state_name(session.state()).into(),
            created_at: session.created_at().to_rfc3339(),
            complete: session.is_complete(),
            missing_fields: field_names(&session.missing_fields()),
            fields: session
                .entries()
                .map(|(field, entry)| {
                    (
                        field.as_str().to_string(),
                        entry.current_value().map(str::to_owned),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordValueReq {
    pub value: String,
}

/// Result of reporting a field value.
///
/// `signal` is `first_time`, `unchanged` or `changed`; the old and new values are only set for
/// `changed`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordValueRes {
    pub field: String,
    pub signal: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub complete: bool,
    pub missing_fields: Vec<String>,
}

impl RecordValueRes {
    fn new(field: RecordField, signal: DuplicateSignal, missing: &[RecordField]) -> Self {
        let (signal, old_value, new_value) = match signal {
            DuplicateSignal::FirstTime => ("first_time", None, None),
            DuplicateSignal::Unchanged => ("unchanged", None, None),
            DuplicateSignal::Changed {
                old_value,
                new_value,
            } => ("changed", Some(old_value), Some(new_value)),
        };
        Self {
            field: field.as_str().to_string(),
            signal: signal.into(),
            old_value,
            new_value,
            complete: missing.is_empty(),
            missing_fields: field_names(missing),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevertRes {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryRes {
    pub summary: String,
}

/// Submission result plus the reply to speak.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRes {
    /// `success` or `failure`
    pub status: String,
    #[schema(value_type = Option<Object>)]
    pub response: Option<Value>,
    pub error_message: Option<String>,
    pub is_network_error: bool,
    pub should_terminate_session: bool,
    pub message: String,
}

impl SubmitRes {
    fn new(outcome: SubmissionOutcome, message: String) -> Self {
        let should_terminate_session = outcome.should_terminate_session();
        match outcome {
            SubmissionOutcome::Success { response } => Self {
                status: "success".into(),
                response: Some(response),
                error_message: None,
                is_network_error: false,
                should_terminate_session,
                message,
            },
            SubmissionOutcome::Failure {
                error_message,
                is_network_error,
            } => Self {
                status: "failure".into(),
                response: None,
                error_message: Some(error_message),
                is_network_error,
                should_terminate_session,
                message,
            },
        }
    }
}

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tool-schema", get(tool_schema))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/fields/:field", put(record_field))
        .route("/sessions/:id/fields/:field/revert", post(revert_field))
        .route("/sessions/:id/summary", get(session_summary))
        .route("/sessions/:id/submit", post(submit_session))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the API until the server fails.
///
/// # Errors
/// Returns an error if the address cannot be bound or the HTTP server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Read the submission settings from the process environment.
///
/// # Errors
/// Returns [`IntakeError::InvalidConfig`] when `PATIENT_API_URL` is missing or any setting is
/// malformed.
pub fn submission_config_from_env() -> IntakeResult<SubmissionConfig> {
    SubmissionConfig::from_env(SubmissionEnv {
        endpoint: std::env::var("PATIENT_API_URL").ok(),
        bearer_token: std::env::var("PATIENT_API_TOKEN").ok(),
        timeout_secs: std::env::var("INTAKE_SUBMIT_TIMEOUT_SECS").ok(),
        max_attempts: std::env::var("INTAKE_SUBMIT_MAX_ATTEMPTS").ok(),
        backoff_ms: std::env::var("INTAKE_SUBMIT_BACKOFF_MS").ok(),
    })
}

/// Reopens a session left in `submitting` when the submit handler fails or its future is
/// dropped mid-request.
struct SubmissionGuard<'a> {
    sessions: &'a SessionRegistry,
    id: Uuid,
    armed: bool,
}

impl<'a> SubmissionGuard<'a> {
    fn new(sessions: &'a SessionRegistry, id: Uuid) -> Self {
        Self {
            sessions,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sessions
                .update(self.id, |session| session.finish_submission(false));
        }
    }
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Collecting => "collecting",
        SessionState::Submitting => "submitting",
        SessionState::Submitted => "submitted",
        SessionState::Abandoned => "abandoned",
    }
}

fn field_names(fields: &[RecordField]) -> Vec<String> {
    fields.iter().map(|f| f.as_str().to_string()).collect()
}

fn parse_session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|e| {
        tracing::error!("Invalid session UUID: {:?}", e);
        (StatusCode::BAD_REQUEST, "Invalid session UUID".into())
    })
}

fn session_not_found() -> ApiError {
    (StatusCode::NOT_FOUND, "Session not found".into())
}

fn intake_error(err: IntakeError) -> ApiError {
    match &err {
        IntakeError::UnknownField(_) | IntakeError::EmptyValue { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        IntakeError::IncompleteRecord { .. }
        | IntakeError::NothingToRevert { .. }
        | IntakeError::SessionClosed(_)
        | IntakeError::SubmissionInProgress(_) => (StatusCode::CONFLICT, err.to_string()),
        _ => {
            tracing::error!("Intake error: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Intake REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/tool-schema",
    responses(
        (status = 200, description = "Save tool name, description and parameters schema")
    )
)]
/// Definition of the save tool offered to the conversational layer
#[axum::debug_handler]
async fn tool_schema(State(_state): State<AppState>) -> Json<Value> {
    Json(tool_definition())
}

#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created", body = CreateSessionRes)
    )
)]
/// Open a collection session for a new call
#[axum::debug_handler]
async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreateSessionRes>) {
    let id = state.sessions.create();
    tracing::info!(session = %id, "session opened");
    (
        StatusCode::CREATED,
        Json(CreateSessionRes {
            session_id: id.to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionRes),
        (status = 400, description = "Invalid session UUID"),
        (status = 404, description = "Session not found")
    )
)]
/// Current values, missing fields and state of a session
#[axum::debug_handler]
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionRes>, ApiError> {
    let id = parse_session_id(&id)?;
    let res = state
        .sessions
        .read(id, SessionRes::from_session)
        .ok_or_else(session_not_found)?;
    Ok(Json(res))
}

#[utoipa::path(
    put,
    path = "/sessions/{id}/fields/{field}",
    params(
        ("id" = String, Path, description = "Session UUID"),
        ("field" = String, Path, description = "Field name, e.g. `first_name` or `SSN`")
    ),
    request_body = RecordValueReq,
    responses(
        (status = 200, description = "Value recorded", body = RecordValueRes),
        (status = 400, description = "Unknown field, empty value or invalid session UUID"),
        (status = 404, description = "Session not found")
    )
)]
/// Report a value the caller gave for one field
///
/// The response says whether this is the first value for the field, a repeat of the stored
/// value, or a change that the conversational layer should confirm with the caller.
#[axum::debug_handler]
async fn record_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
    Json(req): Json<RecordValueReq>,
) -> Result<Json<RecordValueRes>, ApiError> {
    let id = parse_session_id(&id)?;
    let field: RecordField = field.parse().map_err(intake_error)?;

    let (signal, missing) = state
        .sessions
        .update(id, |session| {
            let signal = session.record_value(field, &req.value)?;
            Ok::<_, IntakeError>((signal, session.missing_fields()))
        })
        .ok_or_else(session_not_found)?
        .map_err(intake_error)?;

    Ok(Json(RecordValueRes::new(field, signal, &missing)))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/fields/{field}/revert",
    params(
        ("id" = String, Path, description = "Session UUID"),
        ("field" = String, Path, description = "Field name")
    ),
    responses(
        (status = 200, description = "Earlier value restored", body = RevertRes),
        (status = 400, description = "Unknown field or invalid session UUID"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "No change to revert")
    )
)]
/// Undo the last change to a field after the caller declined it
#[axum::debug_handler]
async fn revert_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
) -> Result<Json<RevertRes>, ApiError> {
    let id = parse_session_id(&id)?;
    let field: RecordField = field.parse().map_err(intake_error)?;

    let value = state
        .sessions
        .update(id, |session| session.revert_change(field))
        .ok_or_else(session_not_found)?
        .map_err(intake_error)?;

    Ok(Json(RevertRes {
        field: field.as_str().to_string(),
        value,
    }))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/summary",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Read-back of the collected record", body = SummaryRes),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Record incomplete")
    )
)]
/// Read-back of the collected details, spoken before asking to submit
#[axum::debug_handler]
async fn session_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryRes>, ApiError> {
    let id = parse_session_id(&id)?;
    let record = state
        .sessions
        .read(id, CollectionSession::to_record)
        .ok_or_else(session_not_found)?
        .map_err(intake_error)?;

    Ok(Json(SummaryRes {
        summary: reply::confirmation_summary(&record),
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/submit",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Submission attempted; see `status`", body = SubmitRes),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Record incomplete or already being submitted")
    )
)]
/// Submit the collected record to the records backend
///
/// On success the session is closed and removed. On failure it stays open so the caller can
/// retry or be offered a call back. While the backend call is in flight the session refuses
/// updates and further submits.
///
/// # Errors
/// Returns `409 Conflict` if any field is still missing or a submission is already running;
/// nothing is sent in either case.
#[axum::debug_handler]
async fn submit_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmitRes>, ApiError> {
    let id = parse_session_id(&id)?;
    let record = state
        .sessions
        .update(id, CollectionSession::begin_submission)
        .ok_or_else(session_not_found)?
        .map_err(intake_error)?;
    let mut guard = SubmissionGuard::new(&state.sessions, id);

    let outcome = state.client.submit(&record).await.map_err(intake_error)?;
    let message = reply::outcome_message(&outcome, Some(record.personal.first_name.as_str()));

    if outcome.should_terminate_session() {
        guard.disarm();
        let closed = state
            .sessions
            .remove_with(id, |session| {
                session.finish_submission(true);
                Ok(())
            })
            .and_then(Result::ok)
            .map(|session| session.state());
        tracing::info!(session = %id, state = ?closed, "session submitted and closed");
    } else {
        tracing::warn!(
            session = %id,
            network = outcome.is_network_error(),
            "submission failed, session kept open"
        );
    }

    Ok(Json(SubmitRes::new(outcome, message)))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 204, description = "Session abandoned"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Submission in progress")
    )
)]
/// Abandon a session without submitting
#[axum::debug_handler]
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state
        .sessions
        .remove_with(id, CollectionSession::abandon)
        .ok_or_else(session_not_found)?
        .map_err(intake_error)?;
    tracing::info!(session = %id, "session abandoned");
    Ok(StatusCode::NO_CONTENT)
}
