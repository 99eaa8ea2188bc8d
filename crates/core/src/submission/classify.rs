//! Network-error classification.
//!
//! Only failures classified as network errors are retried. The classifier is a trait so a
//! transport whose errors read differently can ship its own matcher without touching the retry
//! loop.

use super::transport::{TransportError, TransportErrorKind};

/// Message fragments that mark a transport failure as a network error. Matched
/// case-insensitively as substrings.
pub const NETWORK_ERROR_PATTERNS: [&str; 9] = [
    "failed to fetch",
    "network error",
    "networkerror when attempting to fetch resource",
    "load failed",
    "connection failed",
    "econnrefused",
    "enotfound",
    "etimedout",
    "econnreset",
];

pub trait NetworkErrorClassifier: Send + Sync {
    /// `true` if `error` is transient and the attempt may be retried.
    fn is_network_error(&self, error: &TransportError) -> bool;
}

impl<F> NetworkErrorClassifier for F
where
    F: Fn(&TransportError) -> bool + Send + Sync,
{
    fn is_network_error(&self, error: &TransportError) -> bool {
        self(error)
    }
}

/// Default classifier.
///
/// Connect and timeout failures are network errors whatever their wording; everything else is
/// matched against a list of message fragments.
#[derive(Clone, Debug)]
pub struct MessageClassifier {
    patterns: Vec<String>,
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self::with_patterns(NETWORK_ERROR_PATTERNS)
    }
}

impl MessageClassifier {
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches_message(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }
}

impl NetworkErrorClassifier for MessageClassifier {
    fn is_network_error(&self, error: &TransportError) -> bool {
        match error.kind() {
            TransportErrorKind::Connect | TransportErrorKind::Timeout => true,
            TransportErrorKind::Other => self.matches_message(error.message()),
        }
    }
}
