//! HTTP client port.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use relay_domain::{RequestSpec, ResponseSpec};

/// Errors from the HTTP transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpClientError {
    /// The full send-plus-receive exceeded the configured timeout.
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Connection, DNS, TLS, or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The body could not be composed (missing upload file, bad path).
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The host cancelled the request before completion.
    #[error("request cancelled")]
    Cancelled,
}

/// Port for issuing HTTP requests.
///
/// The engine shares one client per scenario for connection reuse; the
/// implementation must be safe to call from parallel workers.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends the request and collects the full response.
    async fn send(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError>;
}
