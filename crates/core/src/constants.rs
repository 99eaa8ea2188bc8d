//! Constants used throughout the intake core crate.
//!
//! Retry schedule defaults, wire-level header values and the synthetic response returned for
//! bodiless successes live here so the client, the CLI and the tests agree on them.

use std::time::Duration;

/// Total attempts (first try included) before a network failure is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay after the first failed attempt; doubled after each subsequent failure.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Per-attempt timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default REST bind address for the runner binaries.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Media type sent and accepted by the submission endpoint.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// `Cache-Control` value sent with every submission.
pub const NO_CACHE: &str = "no-cache";

/// Message of the synthetic body returned when the endpoint answers 2xx without JSON.
pub const SYNTHETIC_SUCCESS_MESSAGE: &str = "created";

/// Name of the conversational tool whose arguments are a full record.
pub const SAVE_TOOL_NAME: &str = "save_patient_details";

/// Upper bound accepted for the total attempt count.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Upper bound accepted for the per-attempt timeout.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(600);

/// Upper bound accepted for the initial backoff from the environment.
pub const MAX_INITIAL_BACKOFF: Duration = Duration::from_secs(60);
