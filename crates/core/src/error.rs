use crate::record::RecordField;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("empty value for {field}")]
    EmptyValue { field: RecordField },
    #[error("record is incomplete, missing: {}", format_fields(.missing))]
    IncompleteRecord { missing: Vec<RecordField> },
    #[error("no previous value to restore for {field}")]
    NothingToRevert { field: RecordField },
    #[error("session {0} is closed")]
    SessionClosed(uuid::Uuid),
    #[error("session {0} is already being submitted")]
    SubmissionInProgress(uuid::Uuid),

    #[error("record schema mismatch at {path}: {message}")]
    RecordSchema { path: String, message: String },
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

fn format_fields(fields: &[RecordField]) -> String {
    fields
        .iter()
        .map(|f| f.wire_name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type IntakeResult<T> = std::result::Result<T, IntakeError>;
