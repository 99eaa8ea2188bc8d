//! Resilient record submission.
//!
//! [`SubmissionClient::submit`] POSTs a complete [`PatientRecord`] to the configured endpoint
//! and reports the result as a [`SubmissionOutcome`]. Transport and application failures never
//! escape as errors; they become `Failure` outcomes the caller turns into a reply. The only
//! `Err` is a precondition violation (submitting an incomplete record).
//!
//! Retry policy:
//! - each attempt is bounded by the configured timeout; a timeout is a network failure
//! - a failed attempt is retried only if the classifier calls it a network error and attempts
//!   remain; the wait before attempt `n + 1` is `initial_backoff * 2^(n - 1)`
//! - any HTTP response, including 4xx/5xx, ends the loop

mod classify;
mod transport;

pub use classify::{MessageClassifier, NetworkErrorClassifier, NETWORK_ERROR_PATTERNS};
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError, TransportErrorKind};

use crate::config::SubmissionConfig;
use crate::constants::SYNTHETIC_SUCCESS_MESSAGE;
use crate::record::PatientRecord;
use crate::IntakeResult;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Result of one `submit` call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// The backend accepted the record. `response` is its JSON body, or the synthetic
    /// `{"success": true, "message": "created"}` when it sent none.
    Success { response: Value },
    /// The record was not accepted.
    Failure {
        error_message: String,
        /// `true` when no response was obtained (retries, if any, are exhausted).
        is_network_error: bool,
    },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success { .. })
    }

    /// Success ends the call; a failure keeps it alive so the caller can retry or escalate.
    pub fn should_terminate_session(&self) -> bool {
        self.is_success()
    }

    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            SubmissionOutcome::Failure {
                is_network_error: true,
                ..
            }
        )
    }
}

/// Submits records with bounded retries.
///
/// Cheap to clone; clones share the underlying transport and classifier, so one client can
/// serve many concurrent sessions.
pub struct SubmissionClient<T = HttpTransport> {
    config: Arc<SubmissionConfig>,
    transport: Arc<T>,
    classifier: Arc<dyn NetworkErrorClassifier>,
}

impl<T> Clone for SubmissionClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl SubmissionClient<HttpTransport> {
    /// Client backed by `reqwest` with the default classifier.
    pub fn new(config: SubmissionConfig) -> IntakeResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> SubmissionClient<T> {
    pub fn with_transport(config: SubmissionConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            classifier: Arc::new(MessageClassifier::default()),
        }
    }

    pub fn with_classifier(mut self, classifier: impl NetworkErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Submit `record`, retrying network failures per the configured schedule.
    ///
    /// # Errors
    ///
    /// [`IntakeError::IncompleteRecord`](crate::IntakeError::IncompleteRecord) if any field is
    /// blank; nothing is sent in that case. Every other failure is returned as
    /// `Ok(SubmissionOutcome::Failure { .. })`.
    pub async fn submit(&self, record: &PatientRecord) -> IntakeResult<SubmissionOutcome> {
        record.ensure_complete()?;
        let body = record.to_json_body()?;

        tracing::info!(endpoint = %self.config.endpoint(), "submitting patient record");

        let outcome = match self.send_with_retry(&body).await {
            Ok(response) => interpret_response(response),
            Err(err) => SubmissionOutcome::Failure {
                is_network_error: self.classifier.is_network_error(&err),
                error_message: err.to_string(),
            },
        };

        match &outcome {
            SubmissionOutcome::Success { .. } => tracing::info!("patient record submitted"),
            SubmissionOutcome::Failure {
                error_message,
                is_network_error,
            } => tracing::error!(
                network = *is_network_error,
                error = %error_message,
                "patient record submission failed"
            ),
        }
        Ok(outcome)
    }

    async fn send_with_retry(&self, body: &[u8]) -> Result<HttpResponse, TransportError> {
        let max_attempts = self.config.max_attempts().max(1);
        let attempt_timeout = self.config.attempt_timeout();
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(
                attempt_timeout,
                self.transport.post_json(self.config.endpoint(), body),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::timeout(format!(
                    "request timed out after {}ms (ETIMEDOUT)",
                    attempt_timeout.as_millis()
                ))),
            };

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            tracing::warn!(attempt, max_attempts, error = %err, "submission attempt failed");

            if attempt >= max_attempts || !self.classifier.is_network_error(&err) {
                return Err(err);
            }

            let delay = self.config.backoff_for(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn synthetic_success() -> Value {
    json!({ "success": true, "message": SYNTHETIC_SUCCESS_MESSAGE })
}

fn interpret_response(response: HttpResponse) -> SubmissionOutcome {
    if !response.is_success() {
        let mut error_message = format!("API responded with status {}", response.status);
        if !response.body.is_empty() {
            error_message.push_str(": ");
            error_message.push_str(&response.body);
        }
        return SubmissionOutcome::Failure {
            error_message,
            is_network_error: false,
        };
    }

    if !response.is_json() || response.body.trim().is_empty() {
        return SubmissionOutcome::Success {
            response: synthetic_success(),
        };
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(response) => SubmissionOutcome::Success { response },
        Err(e) => SubmissionOutcome::Failure {
            error_message: format!("malformed response from API (status {}): {e}", response.status),
            is_network_error: false,
        },
    }
}
