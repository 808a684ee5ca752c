//! Response processing steps.
//!
//! A stage's `response` is an ordered list of steps, each either a `verify`
//! (assert properties of the response) or a `save` (promote extracted values
//! into the context). The list may also be authored as a keyed mapping whose
//! keys are documentary only.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::common::{OneOrMany, Templatable};
use super::function::UserFunctionCall;
use super::substitution::Substitution;

/// A JSON Schema for body validation: inline document or path to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    /// Path to a schema file, resolved relative to the scenario file.
    Path(String),
    /// Inline schema document.
    Inline(JsonValue),
}

/// Body-level verification checks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BodyChecks {
    /// JSON Schema the parsed response body must validate against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaSource>,
    /// Substrings that must occur in the body text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<String>,
    /// Substrings that must not occur in the body text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_contains: Vec<String>,
    /// Regular expressions that must match somewhere in the body text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
    /// Regular expressions that must not match anywhere in the body text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_matches: Vec<String>,
}

impl BodyChecks {
    /// Returns true if no body check is configured.
    pub fn is_empty(&self) -> bool {
        self.schema.is_none()
            && self.contains.is_empty()
            && self.not_contains.is_empty()
            && self.matches.is_empty()
            && self.not_matches.is_empty()
    }
}

/// A verify step: every configured check must hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Verify {
    /// Expected status code, or list of acceptable codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Templatable<OneOrMany<u16>>>,
    /// Headers that must be present with exactly these values
    /// (case-insensitive names, case-sensitive values).
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Context variables that must equal the given values.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub vars: IndexMap<String, JsonValue>,
    /// Template expressions that must each evaluate truthy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
    /// Body-level checks.
    #[serde(skip_serializing_if = "BodyChecks::is_empty")]
    pub body: BodyChecks,
    /// User functions called with the response; each must return truthy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunctionCall>,
}

/// A save step: extracted values are merged and promoted to the context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Save {
    /// `name → JMESPath expression`, evaluated over the response projection.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub jmespath: IndexMap<String, String>,
    /// Substitutions evaluated at this point in the step sequence.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
    /// User functions called with the response; each returns a map of
    /// values merged into the saved set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_functions: Vec<UserFunctionCall>,
}

/// One response-processing step, discriminated by its authoring key.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseStep {
    /// Assert properties of the response.
    Verify(Verify),
    /// Extract values and promote them into the context.
    Save(Save),
}

impl Serialize for ResponseStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Verify(v) => map.serialize_entry("verify", v)?,
            Self::Save(v) => map.serialize_entry("save", v)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResponseStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| D::Error::custom("response step must be an object"))?;

        let has_verify = object.contains_key("verify");
        let has_save = object.contains_key("save");
        if has_verify == has_save {
            return Err(D::Error::custom(
                "response step must contain exactly one of 'verify' or 'save'",
            ));
        }
        if object.len() != 1 {
            return Err(D::Error::custom(
                "response step must not carry keys besides its variant",
            ));
        }

        if has_verify {
            let verify = serde_json::from_value(object["verify"].clone())
                .map_err(|e| D::Error::custom(format!("verify: {e}")))?;
            Ok(Self::Verify(verify))
        } else {
            let save = serde_json::from_value(object["save"].clone())
                .map_err(|e| D::Error::custom(format!("save: {e}")))?;
            Ok(Self::Save(save))
        }
    }
}

/// The ordered list of response steps for a stage.
///
/// Authored either as a JSON array or as an object whose keys merely label
/// the steps; order is preserved as encountered.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ResponseSteps(pub Vec<ResponseStep>);

impl<'de> Deserialize<'de> for ResponseSteps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<ResponseStep>),
            Keyed(IndexMap<String, ResponseStep>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(steps) => Self(steps),
            Repr::Keyed(map) => Self(map.into_values().collect()),
        })
    }
}

impl ResponseSteps {
    /// Iterates over steps in authored order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResponseStep> {
        self.0.iter()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no step is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
