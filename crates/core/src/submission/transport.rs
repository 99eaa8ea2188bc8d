//! HTTP transport seam for the submission client.
//!
//! The client only needs "POST these bytes, give me status, content type and body text". The
//! [`Transport`] trait captures exactly that so the retry loop can be exercised with scripted
//! transports, and so alternate stacks can be plugged in together with a matching
//! [`NetworkErrorClassifier`](super::NetworkErrorClassifier).

use crate::config::SubmissionConfig;
use crate::constants::{JSON_MEDIA_TYPE, NO_CACHE};
use crate::{IntakeError, IntakeResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use std::error::Error as _;

/// Coarse origin of a transport failure, as far as the transport can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No connection could be established (refused, DNS, reset during connect).
    Connect,
    /// The attempt did not finish in time.
    Timeout,
    /// Anything else; classification falls back to the message text.
    Other,
}

/// A failure where no HTTP response was obtained.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };

        // reqwest's top-level message hides the OS error ("Connection refused") in the chain.
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(kind, message)
    }
}

/// What the client needs to know about an HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(JSON_MEDIA_TYPE))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `url` and read the full response.
    ///
    /// Must return `Err` only when no response was obtained; any HTTP status, including 4xx and
    /// 5xx, is an `Ok` response.
    async fn post_json(&self, url: &reqwest::Url, body: &[u8]) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client that sends the JSON, no-cache and (optional) bearer headers on every
    /// request.
    pub fn new(config: &SubmissionConfig) -> IntakeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        if let Some(token) = config.bearer_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                IntakeError::InvalidConfig("bearer token contains invalid header characters".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(IntakeError::HttpClient)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &reqwest::Url, body: &[u8]) -> Result<HttpResponse, TransportError> {
        let response = self.client.post(url.clone()).body(body.to_vec()).send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match response.text().await {
            Ok(body) => body,
            // The status already says the request was refused; the body is only detail.
            Err(err) if !(200..300).contains(&status) => {
                tracing::debug!(status, error = %err, "could not read error response body");
                String::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
