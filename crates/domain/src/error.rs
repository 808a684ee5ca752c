//! Domain error types

use thiserror::Error;

/// Errors raised while validating a scenario document against the model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The document could not be deserialized into the model at all.
    #[error("malformed scenario document: {0}")]
    Malformed(String),

    /// A stage name appears more than once within a scenario.
    #[error("duplicate stage name: '{0}'")]
    DuplicateStageName(String),

    /// A stage has an empty name.
    #[error("stage at index {0} has an empty name")]
    EmptyStageName(usize),

    /// A fixture name is listed more than once in the same fixture list.
    #[error("duplicate fixture '{name}' in {scope}")]
    DuplicateFixture { name: String, scope: String },

    /// A fixture name collides with a variable defined by a substitution.
    #[error("fixture '{0}' collides with a substitution variable of the same name")]
    FixtureCollision(String),

    /// A parameter block's `ids` length does not match its value count.
    #[error("parameter ids count ({ids}) does not match value count ({values}) in stage '{stage}'")]
    ParameterIdsMismatch {
        stage: String,
        ids: usize,
        values: usize,
    },

    /// Combination rows in a single block must share the same key set.
    #[error("combination row {row} in stage '{stage}' has a different key set than row 0")]
    CombinationKeysMismatch { stage: String, row: usize },

    /// A numeric field is outside its permitted range.
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: String,
        requirement: &'static str,
        value: String,
    },

    /// An expected status code is not a valid HTTP status.
    #[error("invalid HTTP status code {0} in stage '{1}'")]
    InvalidStatusCode(u16, String),

    /// A field that must hold a concrete value still holds a template.
    #[error("field '{field}' still holds template '{template}' where a concrete {expected} is required")]
    UnresolvedTemplate {
        field: String,
        template: String,
        expected: &'static str,
    },

    /// A user function reference is not in `module.path:symbol` or `symbol` form.
    #[error("invalid function reference '{0}'")]
    InvalidFunctionRef(String),

    /// A stage combines `parametrize` with `parallel`.
    #[error("stage '{0}' uses both parametrize and parallel; pick one")]
    ParametrizeWithParallel(String),
}

/// Errors raised while loading engine configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value failed its constraint.
    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, ValidationError>;
