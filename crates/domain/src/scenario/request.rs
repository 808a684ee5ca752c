//! HTTP request configuration for a stage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::body::RequestBody;
use super::common::Templatable;
use super::function::UserFunctionCall;
use super::ssl::SslConfig;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Canonical upper-case method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage's HTTP request, as authored.
///
/// String-valued fields may contain `{{ ... }}` templates; typed fields that
/// admit templates use [`Templatable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Target URL (templated).
    pub url: String,

    /// HTTP method, default `GET`.
    #[serde(default)]
    pub method: Templatable<HttpMethod>,

    /// Query parameters; values may be scalars or lists (a list expands to
    /// one `key=value` pair per element).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, JsonValue>,

    /// Request headers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    /// Optional body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,

    /// Auth factory; overrides the scenario-level default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<UserFunctionCall>,

    /// TLS overrides; fields not set here fall back to the scenario level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,

    /// Timeout in seconds, default 30.
    #[serde(default = "default_timeout")]
    pub timeout: Templatable<f64>,

    /// Whether to follow redirects, default true.
    #[serde(default = "default_allow_redirects")]
    pub allow_redirects: Templatable<bool>,
}

fn default_timeout() -> Templatable<f64> {
    Templatable::Value(DEFAULT_TIMEOUT_SECS)
}

fn default_allow_redirects() -> Templatable<bool> {
    Templatable::Value(true)
}

impl Request {
    /// Creates a minimal GET request for the given URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Templatable::Value(HttpMethod::Get),
            params: IndexMap::new(),
            headers: IndexMap::new(),
            body: None,
            auth: None,
            ssl: None,
            timeout: default_timeout(),
            allow_redirects: default_allow_redirects(),
        }
    }
}
