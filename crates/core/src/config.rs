//! Submission runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the submission client.
//! Nothing in this crate reads process-wide environment variables; binaries collect the raw
//! values into [`SubmissionEnv`] and call [`SubmissionConfig::from_env`], which keeps parsing
//! testable and lets tests run several clients against different endpoints side by side.

use crate::constants::{
    DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT,
    MAX_ATTEMPT_TIMEOUT, MAX_INITIAL_BACKOFF,
};
use crate::{IntakeError, IntakeResult};
use std::time::Duration;

/// Submission endpoint and retry schedule.
#[derive(Clone, Debug)]
pub struct SubmissionConfig {
    endpoint: reqwest::Url,
    bearer_token: Option<String>,
    max_attempts: u32,
    initial_backoff: Duration,
    attempt_timeout: Duration,
}

impl SubmissionConfig {
    /// Create a configuration for `endpoint` with the default schedule
    /// (3 attempts, 1s initial backoff, 30s per attempt).
    ///
    /// # Errors
    ///
    /// [`IntakeError::InvalidConfig`] if the endpoint is blank, not an absolute URL, or not
    /// `http`/`https`.
    pub fn new(endpoint: impl AsRef<str>) -> IntakeResult<Self> {
        let raw = endpoint.as_ref().trim();
        if raw.is_empty() {
            return Err(IntakeError::InvalidConfig(
                "submission endpoint cannot be empty".into(),
            ));
        }
        let endpoint = reqwest::Url::parse(raw).map_err(|e| {
            IntakeError::InvalidConfig(format!("submission endpoint '{raw}' is not a URL: {e}"))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(IntakeError::InvalidConfig(format!(
                "submission endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            bearer_token: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        })
    }

    /// Build a configuration from raw environment values.
    pub fn from_env(env: SubmissionEnv) -> IntakeResult<Self> {
        let endpoint = env.endpoint.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            IntakeError::InvalidConfig("PATIENT_API_URL must be set".into())
        })?;

        let mut config = Self::new(endpoint)?;
        if let Some(token) = env.bearer_token.filter(|t| !t.trim().is_empty()) {
            config = config.with_bearer_token(token.trim());
        }
        if let Some(secs) = u64_from_env_value("INTAKE_SUBMIT_TIMEOUT_SECS", env.timeout_secs)? {
            if secs > MAX_ATTEMPT_TIMEOUT.as_secs() {
                return Err(IntakeError::InvalidConfig(format!(
                    "INTAKE_SUBMIT_TIMEOUT_SECS must be at most {}, got {secs}",
                    MAX_ATTEMPT_TIMEOUT.as_secs()
                )));
            }
            config = config.with_attempt_timeout(Duration::from_secs(secs))?;
        }
        if let Some(attempts) = u64_from_env_value("INTAKE_SUBMIT_MAX_ATTEMPTS", env.max_attempts)?
        {
            let attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
            config = config.with_max_attempts(attempts)?;
        }
        if let Some(ms) = u64_from_env_value("INTAKE_SUBMIT_BACKOFF_MS", env.backoff_ms)? {
            if ms > MAX_INITIAL_BACKOFF.as_millis() as u64 {
                return Err(IntakeError::InvalidConfig(format!(
                    "INTAKE_SUBMIT_BACKOFF_MS must be at most {}, got {ms}",
                    MAX_INITIAL_BACKOFF.as_millis()
                )));
            }
            config = config.with_initial_backoff(Duration::from_millis(ms));
        }
        Ok(config)
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Total attempts including the first one. Must be between 1 and 10.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> IntakeResult<Self> {
        if max_attempts == 0 || max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(IntakeError::InvalidConfig(format!(
                "max attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {max_attempts}"
            )));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Per-attempt timeout. Must be non-zero and at most ten minutes.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> IntakeResult<Self> {
        if attempt_timeout.is_zero() || attempt_timeout > MAX_ATTEMPT_TIMEOUT {
            return Err(IntakeError::InvalidConfig(format!(
                "attempt timeout must be greater than zero and at most {}s",
                MAX_ATTEMPT_TIMEOUT.as_secs()
            )));
        }
        self.attempt_timeout = attempt_timeout;
        Ok(self)
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `initial_backoff * 2^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }

    /// Upper bound on how long a single `submit` can suspend its caller.
    pub fn worst_case_latency(&self) -> Duration {
        let backoff = (1..self.max_attempts)
            .map(|a| self.backoff_for(a))
            .fold(Duration::ZERO, Duration::saturating_add);
        self.attempt_timeout
            .saturating_mul(self.max_attempts)
            .saturating_add(backoff)
    }
}

/// Raw, unparsed configuration values as read from the environment.
#[derive(Clone, Debug, Default)]
pub struct SubmissionEnv {
    /// `PATIENT_API_URL`
    pub endpoint: Option<String>,
    /// `PATIENT_API_TOKEN`
    pub bearer_token: Option<String>,
    /// `INTAKE_SUBMIT_TIMEOUT_SECS`
    pub timeout_secs: Option<String>,
    /// `INTAKE_SUBMIT_MAX_ATTEMPTS`
    pub max_attempts: Option<String>,
    /// `INTAKE_SUBMIT_BACKOFF_MS`
    pub backoff_ms: Option<String>,
}

/// Parse an optional unsigned integer environment value.
///
/// `None` and blank values yield `Ok(None)`.
pub fn u64_from_env_value(name: &str, value: Option<String>) -> IntakeResult<Option<u64>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    value
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                IntakeError::InvalidConfig(format!("{name} must be a non-negative integer, got '{v}'"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retry_policy() {
        let cfg = SubmissionConfig::new("https://api.example.com/patients").unwrap();
        assert_eq!(cfg.max_attempts(), 3);
        assert_eq!(cfg.initial_backoff(), Duration::from_millis(1000));
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(30));
        assert!(cfg.bearer_token().is_none());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = SubmissionConfig::new("http://localhost/patients").unwrap();
        assert_eq!(cfg.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(cfg.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(cfg.backoff_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn worst_case_latency_is_timeouts_plus_backoff() {
        let cfg = SubmissionConfig::new("http://localhost/patients").unwrap();
        assert_eq!(cfg.worst_case_latency(), Duration::from_secs(93));
    }

    #[test]
    fn rejects_blank_and_non_http_endpoints() {
        assert!(matches!(
            SubmissionConfig::new("  "),
            Err(IntakeError::InvalidConfig(msg)) if msg.contains("cannot be empty")
        ));
        assert!(matches!(
            SubmissionConfig::new("not a url"),
            Err(IntakeError::InvalidConfig(msg)) if msg.contains("not a URL")
        ));
        assert!(matches!(
            SubmissionConfig::new("ftp://example.com/upload"),
            Err(IntakeError::InvalidConfig(msg)) if msg.contains("http or https")
        ));
    }

    #[test]
    fn rejects_zero_attempts_and_zero_timeout() {
        let cfg = SubmissionConfig::new("http://localhost/patients").unwrap();
        assert!(cfg.clone().with_max_attempts(0).is_err());
        assert!(cfg.with_attempt_timeout(Duration::ZERO).is_err());
    }

    #[test]
    fn rejects_out_of_range_limits() {
        let cfg = SubmissionConfig::new("http://localhost/patients").unwrap();
        assert!(cfg.clone().with_max_attempts(11).is_err());
        assert!(cfg.clone().with_max_attempts(10).is_ok());
        assert!(cfg.clone().with_attempt_timeout(Duration::from_secs(601)).is_err());
        assert!(cfg.with_attempt_timeout(Duration::from_secs(600)).is_ok());
    }

    #[test]
    fn from_env_rejects_oversized_values_instead_of_overflowing() {
        let env = |timeout: Option<&str>, attempts: Option<&str>, backoff: Option<&str>| {
            SubmissionConfig::from_env(SubmissionEnv {
                endpoint: Some("http://localhost/patients".into()),
                bearer_token: None,
                timeout_secs: timeout.map(str::to_string),
                max_attempts: attempts.map(str::to_string),
                backoff_ms: backoff.map(str::to_string),
            })
        };
        let max = u64::MAX.to_string();

        for result in [
            env(Some(&max), None, None),
            env(None, Some(&max), None),
            env(None, None, Some(&max)),
        ] {
            assert!(matches!(result, Err(IntakeError::InvalidConfig(_))));
        }
    }

    #[test]
    fn worst_case_latency_saturates_at_the_limits() {
        let cfg = SubmissionConfig::new("http://localhost/patients")
            .unwrap()
            .with_max_attempts(10)
            .unwrap()
            .with_attempt_timeout(Duration::from_secs(600))
            .unwrap()
            .with_initial_backoff(Duration::MAX);
        assert_eq!(cfg.worst_case_latency(), Duration::MAX);
    }

    #[test]
    fn from_env_requires_endpoint() {
        let err = SubmissionConfig::from_env(SubmissionEnv::default()).expect_err("missing url");
        assert!(matches!(err, IntakeError::InvalidConfig(msg) if msg.contains("PATIENT_API_URL")));
    }

    #[test]
    fn from_env_applies_overrides() {
        let cfg = SubmissionConfig::from_env(SubmissionEnv {
            endpoint: Some("https://api.example.com/patients".into()),
            bearer_token: Some(" secret ".into()),
            timeout_secs: Some("10".into()),
            max_attempts: Some("5".into()),
            backoff_ms: Some("250".into()),
        })
        .unwrap();

        assert_eq!(cfg.endpoint().as_str(), "https://api.example.com/patients");
        assert_eq!(cfg.bearer_token(), Some("secret"));
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.max_attempts(), 5);
        assert_eq!(cfg.initial_backoff(), Duration::from_millis(250));
    }

    #[test]
    fn from_env_ignores_blank_values() {
        let cfg = SubmissionConfig::from_env(SubmissionEnv {
            endpoint: Some("http://localhost:8080/patients".into()),
            bearer_token: Some("   ".into()),
            timeout_secs: Some("".into()),
            max_attempts: None,
            backoff_ms: Some(" ".into()),
        })
        .unwrap();
        assert!(cfg.bearer_token().is_none());
        assert_eq!(cfg.max_attempts(), 3);
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn u64_from_env_value_reports_variable_name() {
        let err = u64_from_env_value("INTAKE_SUBMIT_BACKOFF_MS", Some("soon".into()))
            .expect_err("not a number");
        assert!(
            matches!(err, IntakeError::InvalidConfig(msg) if msg.contains("INTAKE_SUBMIT_BACKOFF_MS") && msg.contains("soon"))
        );
    }
}
