//! # Intake Core
//!
//! Core logic for collecting a patient's registration details over a call and submitting them
//! to the records backend.
//!
//! This crate contains:
//! - The submission record model and field catalogue ([`record`])
//! - Per-call collection state with duplicate/change detection ([`session`])
//! - A retrying, classifying submission client ([`submission`])
//! - Read-back and outcome wording ([`reply`])
//!
//! **No API concerns**: HTTP serving, CLI parsing and environment loading belong in `api-rest`,
//! `intake-cli` and the runner binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod record;
pub mod reply;
pub mod session;
pub mod submission;

pub use config::{SubmissionConfig, SubmissionEnv};
pub use constants::DEFAULT_REST_ADDR;
pub use error::{IntakeError, IntakeResult};
pub use record::{AddressInfo, PatientRecord, PersonalInfo, RecordField};
pub use session::{CollectionSession, DuplicateSignal, FieldTrackingEntry, SessionState};
pub use submission::{SubmissionClient, SubmissionOutcome};
