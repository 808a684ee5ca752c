//! Shared building blocks for the scenario model.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A field that holds either a concrete value or a `{{ ... }}` template
/// string to be resolved before use.
///
/// Deserialization tries the concrete type first, so `"GET"` parses as a
/// method while `"{{ method }}"` falls through to the template form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Templatable<T> {
    /// A concrete, ready-to-use value.
    Value(T),
    /// A template string, resolved by substitution before the value is needed.
    Template(String),
}

impl<T> Templatable<T> {
    /// Returns the concrete value, if present.
    #[must_use]
    pub const fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Template(_) => None,
        }
    }

    /// Returns true if this field still holds an unresolved template.
    #[must_use]
    pub const fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Returns the concrete value or a validation error naming the field.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnresolvedTemplate` if the field still holds
    /// a template string.
    pub fn expect_value(&self, field: &str, expected: &'static str) -> Result<&T, ValidationError> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Template(t) => Err(ValidationError::UnresolvedTemplate {
                field: field.to_string(),
                template: t.clone(),
                expected,
            }),
        }
    }
}

impl<T> From<T> for Templatable<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: Default> Default for Templatable<T> {
    fn default() -> Self {
        Self::Value(T::default())
    }
}

/// A scalar or a list of scalars, as authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    /// Returns true if `candidate` equals the single value or is a member of
    /// the list.
    #[must_use]
    pub fn contains(&self, candidate: &T) -> bool {
        match self {
            Self::One(v) => v == candidate,
            Self::Many(vs) => vs.contains(candidate),
        }
    }

    /// Iterates over all values.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Self::One(v) => Box::new(std::iter::once(v)),
            Self::Many(vs) => Box::new(vs.iter()),
        }
    }
}
