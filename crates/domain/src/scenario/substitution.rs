//! Substitution entries.
//!
//! A substitution inserts named bindings into the current context layer,
//! either as literals (`vars`) or as the results of calling user functions
//! with no response argument (`functions`).

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::function::UserFunctionCall;

/// A single substitution entry, discriminated by its authoring key.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    /// Literal bindings, in authored order. Values may contain templates.
    Vars(IndexMap<String, JsonValue>),
    /// Bindings computed by invoking the referenced functions.
    Functions(IndexMap<String, UserFunctionCall>),
}

impl Substitution {
    /// Names bound by this entry, in authored order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Vars(m) => m.keys().map(String::as_str).collect(),
            Self::Functions(m) => m.keys().map(String::as_str).collect(),
        }
    }
}

impl Serialize for Substitution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Vars(v) => map.serialize_entry("vars", v)?,
            Self::Functions(v) => map.serialize_entry("functions", v)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Substitution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        let object = value
            .as_object()
            .ok_or_else(|| D::Error::custom("substitution must be an object"))?;

        let has_vars = object.contains_key("vars");
        let has_functions = object.contains_key("functions");
        if has_vars == has_functions {
            return Err(D::Error::custom(
                "substitution must contain exactly one of 'vars' or 'functions'",
            ));
        }
        if object.len() != 1 {
            return Err(D::Error::custom(
                "substitution must not carry keys besides its variant",
            ));
        }

        if has_vars {
            let vars = serde_json::from_value(object["vars"].clone())
                .map_err(|e| D::Error::custom(format!("vars: {e}")))?;
            Ok(Self::Vars(vars))
        } else {
            let functions = serde_json::from_value(object["functions"].clone())
                .map_err(|e| D::Error::custom(format!("functions: {e}")))?;
            Ok(Self::Functions(functions))
        }
    }
}
