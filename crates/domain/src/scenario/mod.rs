//! Scenario model.
//!
//! A scenario is a single test document describing an ordered chain of HTTP
//! interactions with variable threading, verification, and extraction. The
//! types here are the validated representation of a fully resolved document
//! (no `$ref` keys remain).

pub mod body;
pub mod common;
pub mod function;
pub mod params;
pub mod request;
pub mod response;
pub mod ssl;
pub mod stage;
pub mod substitution;
mod validate;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub use body::{GraphqlQuery, RequestBody};
pub use common::{OneOrMany, Templatable};
pub use function::{FunctionRef, UserFunctionCall};
pub use params::{
    CombinationsBlock, ForeachConfig, IndividualBlock, ParallelConfig, ParameterBlock,
    RepeatConfig,
};
pub use request::{HttpMethod, Request, DEFAULT_TIMEOUT_SECS};
pub use response::{BodyChecks, ResponseStep, ResponseSteps, Save, SchemaSource, Verify};
pub use ssl::{SslCert, SslConfig, SslVerify};
pub use stage::{Stage, StageList};
pub use substitution::Substitution;

use crate::error::{DomainResult, ValidationError};

/// A complete test scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Host-framework marker strings applied at scenario scope.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<String>,

    /// Host-provided values injected for every stage.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixtures: Vec<String>,

    /// Default auth factory, overridable per request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<UserFunctionCall>,

    /// Scenario-wide TLS policy.
    pub ssl: SslConfig,

    /// Substitution entries seeding the scenario context.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,

    /// The ordered stages.
    pub stages: StageList,
}

impl Scenario {
    /// Deserializes and validates a fully resolved scenario document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the document does not fit the model or
    /// fails a cross-field check.
    pub fn from_document(document: JsonValue) -> DomainResult<Self> {
        let scenario: Self = serde_json::from_value(document)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }
}
