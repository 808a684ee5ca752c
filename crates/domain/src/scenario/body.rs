//! Request body variants.
//!
//! The body is a discriminated union keyed by which single field is present:
//! `{"json": ...}`, `{"form": {...}}`, `{"xml": "..."}`, and so on. The
//! variant determines the wire encoding and the default `Content-Type`.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A GraphQL query with optional variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphqlQuery {
    /// The query document.
    pub query: String,
    /// Query variables, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<JsonValue>,
}

/// Request body, discriminated by its single authoring key.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON value, sent as `application/json`.
    Json(JsonValue),
    /// Key-value pairs, sent URL-encoded as
    /// `application/x-www-form-urlencoded`.
    Form(IndexMap<String, JsonValue>),
    /// XML text, sent as `application/xml`.
    Xml(String),
    /// Plain text, sent as `text/plain`.
    Text(String),
    /// Base64-encoded bytes, decoded before sending as
    /// `application/octet-stream`.
    Base64(String),
    /// Path to a file whose bytes become the body; content type guessed from
    /// the extension.
    Binary(String),
    /// Multipart upload: field name to file path.
    Files(IndexMap<String, String>),
    /// GraphQL request, sent as `application/json`.
    Graphql(GraphqlQuery),
}

const BODY_KEYS: [&str; 8] = [
    "json", "form", "xml", "text", "base64", "binary", "files", "graphql",
];

impl RequestBody {
    /// The authoring key that discriminates this variant.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Form(_) => "form",
            Self::Xml(_) => "xml",
            Self::Text(_) => "text",
            Self::Base64(_) => "base64",
            Self::Binary(_) => "binary",
            Self::Files(_) => "files",
            Self::Graphql(_) => "graphql",
        }
    }

    /// Default `Content-Type` contributed when the headers do not already
    /// set one. Multipart bodies get their content type (with boundary) from
    /// the transport.
    #[must_use]
    pub const fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Json(_) | Self::Graphql(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
            Self::Xml(_) => Some("application/xml"),
            Self::Text(_) => Some("text/plain"),
            Self::Base64(_) => Some("application/octet-stream"),
            Self::Binary(_) | Self::Files(_) => None,
        }
    }
}

impl Serialize for RequestBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Json(v) => map.serialize_entry("json", v)?,
            Self::Form(v) => map.serialize_entry("form", v)?,
            Self::Xml(v) => map.serialize_entry("xml", v)?,
            Self::Text(v) => map.serialize_entry("text", v)?,
            Self::Base64(v) => map.serialize_entry("base64", v)?,
            Self::Binary(v) => map.serialize_entry("binary", v)?,
            Self::Files(v) => map.serialize_entry("files", v)?,
            Self::Graphql(v) => map.serialize_entry("graphql", v)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RequestBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| D::Error::custom("body must be an object with exactly one variant key"))?;

        let mut found: Vec<&str> = Vec::new();
        for key in BODY_KEYS {
            if object.contains_key(key) {
                found.push(key);
            }
        }
        match found.as_slice() {
            [_] => {}
            [] => {
                return Err(D::Error::custom(format!(
                    "body must contain one of: {}",
                    BODY_KEYS.join(", ")
                )))
            }
            many => {
                return Err(D::Error::custom(format!(
                    "body variants are mutually exclusive, found: {}",
                    many.join(", ")
                )))
            }
        }
        if let Some(extra) = object.keys().find(|k| found[0] != k.as_str()) {
            return Err(D::Error::custom(format!(
                "unexpected key '{extra}' alongside body variant '{}'",
                found[0]
            )));
        }

        let inner = object[found[0]].clone();
        let parse = |what: &str, e: serde_json::Error| D::Error::custom(format!("{what}: {e}"));
        Ok(match found[0] {
            "json" => Self::Json(inner),
            "form" => Self::Form(serde_json::from_value(inner).map_err(|e| parse("form", e))?),
            "xml" => Self::Xml(serde_json::from_value(inner).map_err(|e| parse("xml", e))?),
            "text" => Self::Text(serde_json::from_value(inner).map_err(|e| parse("text", e))?),
            "base64" => {
                Self::Base64(serde_json::from_value(inner).map_err(|e| parse("base64", e))?)
            }
            "binary" => {
                Self::Binary(serde_json::from_value(inner).map_err(|e| parse("binary", e))?)
            }
            "files" => Self::Files(serde_json::from_value(inner).map_err(|e| parse("files", e))?),
            "graphql" => {
                Self::Graphql(serde_json::from_value(inner).map_err(|e| parse("graphql", e))?)
            }
            _ => unreachable!("found is restricted to BODY_KEYS"),
        })
    }
}
