//! Fully materialized request, ready for the transport.
//!
//! All templates are resolved, the body is serialized (or reduced to file
//! references the transport streams itself), auth has been applied to the
//! header set, and TLS policy is concrete.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scenario::HttpMethod;

/// Server certificate verification, resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerifyPolicy {
    /// Verify against the system trust store.
    #[default]
    Enabled,
    /// Skip verification.
    Disabled,
    /// Verify against a specific CA bundle.
    CaBundle(PathBuf),
}

/// Client certificate, resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientCert {
    /// Single PEM file holding certificate and key.
    Combined(PathBuf),
    /// Separate certificate and key files.
    Pair { cert: PathBuf, key: PathBuf },
}

/// Resolved TLS settings for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SslSettings {
    /// Server verification policy.
    pub verify: VerifyPolicy,
    /// Optional client certificate.
    pub client_cert: Option<ClientCert>,
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPart {
    /// Form field name.
    pub name: String,
    /// File to stream; opened by the transport for the duration of the
    /// request only.
    pub file_path: PathBuf,
}

/// Wire payload of a materialized request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyPayload {
    /// No body.
    Empty,
    /// Pre-serialized bytes.
    Bytes(Vec<u8>),
    /// Body streamed from a file by the transport.
    File(PathBuf),
    /// Multipart form; the transport composes the boundary and streams the
    /// parts.
    Multipart(Vec<MultipartPart>),
}

impl BodyPayload {
    /// Returns true if the request carries no body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A fully materialized HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL, without query parameters.
    pub url: String,
    /// Query parameters, in authored order; list-valued parameters appear
    /// as repeated keys.
    pub query: Vec<(String, String)>,
    /// Headers, in authored order, auth already applied.
    pub headers: Vec<(String, String)>,
    /// Body payload.
    pub payload: BodyPayload,
    /// Total send-plus-receive timeout.
    pub timeout: Duration,
    /// Whether the transport follows redirects.
    pub allow_redirects: bool,
    /// TLS policy.
    pub ssl: SslSettings,
}

impl RequestSpec {
    /// Creates a bare GET request, mainly for tests.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            payload: BodyPayload::Empty,
            timeout: Duration::from_secs(30),
            allow_redirects: true,
            ssl: SslSettings::default(),
        }
    }

    /// Looks up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if a header with this name is already present.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}
