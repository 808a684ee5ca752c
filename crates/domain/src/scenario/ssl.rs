//! TLS policy as authored in a scenario.

use serde::{Deserialize, Serialize};

/// Certificate verification policy.
///
/// `true` verifies against the system store, `false` disables verification,
/// and a string names a CA bundle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SslVerify {
    /// Verify (`true`) or skip verification (`false`).
    Flag(bool),
    /// Path to a CA bundle, or a template resolving to one.
    CaBundle(String),
}

impl Default for SslVerify {
    fn default() -> Self {
        Self::Flag(true)
    }
}

/// Client certificate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SslCert {
    /// A single PEM file holding certificate and key.
    Combined(String),
    /// A `(certificate, key)` file pair.
    Pair(String, String),
}

/// TLS configuration attached to a scenario or an individual request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SslConfig {
    /// Server certificate verification policy.
    pub verify: SslVerify,
    /// Optional client certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<SslCert>,
}
