//! User function references.
//!
//! A scenario may call externally provided functions for verification,
//! extraction, authentication, or substitution. References are written
//! either as `"module.path:symbol"` or as a bare `"symbol"` resolved by the
//! host's search order, optionally wrapped in an object carrying keyword
//! arguments.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::ValidationError;

/// A parsed function reference: optional module path plus symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    raw: String,
    module: Option<String>,
    symbol: String,
}

impl FunctionRef {
    /// Parses a reference of the form `module.path:symbol` or `symbol`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFunctionRef` if the string does not
    /// match either form.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (module, symbol) = match raw.split_once(':') {
            Some((module, symbol)) => (Some(module), symbol),
            None => (None, raw),
        };

        if let Some(module) = module {
            if !is_module_path(module) {
                return Err(ValidationError::InvalidFunctionRef(raw.to_string()));
            }
        }
        if !is_identifier(symbol) {
            return Err(ValidationError::InvalidFunctionRef(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            module: module.map(str::to_string),
            symbol: symbol.to_string(),
        })
    }

    /// The reference exactly as authored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The module path, when the reference is fully qualified.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// The symbol name.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns true for bare references that rely on the host's search order.
    #[must_use]
    pub const fn is_bare(&self) -> bool {
        self.module.is_none()
    }
}

impl std::fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_module_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

impl Serialize for FunctionRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FunctionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// A function reference together with its call-time keyword arguments.
///
/// Authored either as a plain string or as
/// `{"function": "mod:sym", "kwargs": {...}}`. Keyword argument values are
/// template-substituted before the call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserFunctionCall {
    /// The referenced function.
    pub function: FunctionRef,
    /// Keyword arguments, in authored order.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub kwargs: IndexMap<String, JsonValue>,
}

impl UserFunctionCall {
    /// Creates a call with no arguments.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFunctionRef` on a malformed reference.
    pub fn named(reference: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            function: FunctionRef::parse(reference)?,
            kwargs: IndexMap::new(),
        })
    }
}

impl<'de> Deserialize<'de> for UserFunctionCall {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Object {
            function: FunctionRef,
            #[serde(default)]
            kwargs: IndexMap<String, JsonValue>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Object(Object),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(raw) => Ok(Self {
                function: FunctionRef::parse(&raw).map_err(D::Error::custom)?,
                kwargs: IndexMap::new(),
            }),
            Repr::Object(o) => Ok(Self {
                function: o.function,
                kwargs: o.kwargs,
            }),
        }
    }
}
