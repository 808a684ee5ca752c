//! Response processing: verify and save steps.
//!
//! Steps run in author order. A verify step fails on its first check that
//! does not hold; a save step produces a map of values merged into the
//! stage's saved set (later entries overwrite earlier ones).

use std::path::Path;

use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

use relay_domain::{ResponseSpec, Save, SchemaSource, ValidationError, Verify};

use crate::context::LayeredContext;
use crate::ports::user_functions::{Kwargs, SavedVars};
use crate::ports::{BindError, UserFunctionRegistry};
use crate::runner::request_builder::{resolve_under_root, BuildError};
use crate::template::{self, TemplateError};

/// A verify step that did not hold, carrying the failing check.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerifyError {
    #[error("status code mismatch: expected {expected}, got {actual}")]
    Status { expected: String, actual: u16 },

    #[error("header '{name}' mismatch: expected '{expected}', got {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("variable '{name}' not defined in context")]
    VarMissing { name: String },

    #[error("variable '{name}' mismatch: expected {expected}, got {actual}")]
    Var {
        name: String,
        expected: JsonValue,
        actual: JsonValue,
    },

    #[error("expression '{{{{ {expr} }}}}' is not truthy")]
    Expression { expr: String },

    #[error("body does not contain '{0}'")]
    BodyContains(String),

    #[error("body contains '{0}' while it should not")]
    BodyNotContains(String),

    #[error("body does not match /{0}/")]
    BodyMatches(String),

    #[error("body matches /{0}/ while it should not")]
    BodyNotMatches(String),

    #[error("invalid pattern /{pattern}/: {message}")]
    BadPattern { pattern: String, message: String },

    #[error("response body is not JSON, cannot validate against schema")]
    BodyNotJson,

    #[error("schema is invalid: {0}")]
    SchemaInvalid(String),

    #[error("body schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("verify function '{0}' returned false")]
    Function(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Unresolved(#[from] ValidationError),
}

/// A save step that failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SaveError {
    #[error("saving '{name}': invalid JMESPath expression: {message}")]
    BadExpression { name: String, message: String },

    #[error("saving '{name}': {message}")]
    Search { name: String, message: String },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Runs every check of a (substituted) verify step.
///
/// # Errors
///
/// Returns the first failing check as a [`VerifyError`].
pub fn process_verify(
    verify: &Verify,
    ctx: &LayeredContext,
    response: &ResponseSpec,
    response_json: Option<&JsonValue>,
    registry: &UserFunctionRegistry,
    scenario_dir: &Path,
    root_path: &Path,
    max_comprehension_length: usize,
) -> Result<(), VerifyError> {
    if let Some(status) = &verify.status {
        let expected = status.expect_value("verify.status", "status code")?;
        if !expected.contains(&response.status) {
            return Err(VerifyError::Status {
                expected: expected
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" | "),
                actual: response.status,
            });
        }
    }

    for (name, expected) in &verify.headers {
        let actual = response.header(name);
        if actual != Some(expected.as_str()) {
            return Err(VerifyError::Header {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.map(str::to_string),
            });
        }
    }

    for (name, expected) in &verify.vars {
        let Some(actual) = ctx.get(name) else {
            return Err(VerifyError::VarMissing { name: name.clone() });
        };
        if !crate::template::eval::values_equal(actual, expected) {
            return Err(VerifyError::Var {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
    }

    for expr in &verify.expressions {
        let source = template::as_complete_template(expr)
            .unwrap_or_else(|| expr.clone());
        if !template::evaluate_truthy(&source, ctx, max_comprehension_length)? {
            return Err(VerifyError::Expression { expr: source });
        }
    }

    if let Some(schema) = &verify.body.schema {
        check_schema(schema, response_json, scenario_dir, root_path)?;
    }

    let text = response.text();
    for needle in &verify.body.contains {
        if !text.contains(needle) {
            return Err(VerifyError::BodyContains(needle.clone()));
        }
    }
    for needle in &verify.body.not_contains {
        if text.contains(needle) {
            return Err(VerifyError::BodyNotContains(needle.clone()));
        }
    }
    for pattern in &verify.body.matches {
        if !compile_pattern(pattern)?.is_match(&text) {
            return Err(VerifyError::BodyMatches(pattern.clone()));
        }
    }
    for pattern in &verify.body.not_matches {
        if compile_pattern(pattern)?.is_match(&text) {
            return Err(VerifyError::BodyNotMatches(pattern.clone()));
        }
    }

    for call in &verify.user_functions {
        let kwargs = walk_kwargs(&call.kwargs, ctx, max_comprehension_length)?;
        if !registry.call_verify(&call.function, response, &kwargs)? {
            return Err(VerifyError::Function(call.function.as_str().to_string()));
        }
    }

    Ok(())
}

fn compile_pattern(pattern: &str) -> Result<Regex, VerifyError> {
    Regex::new(pattern).map_err(|e| VerifyError::BadPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn check_schema(
    schema: &SchemaSource,
    response_json: Option<&JsonValue>,
    scenario_dir: &Path,
    root_path: &Path,
) -> Result<(), VerifyError> {
    let document = match schema {
        SchemaSource::Inline(document) => document.clone(),
        SchemaSource::Path(path) => {
            let resolved = resolve_under_root(path, scenario_dir, root_path).map_err(|e| {
                match e {
                    BuildError::PathOutsideRoot { path } => VerifyError::SchemaInvalid(format!(
                        "schema path '{path}' resolves outside the scenario root"
                    )),
                    other => VerifyError::SchemaInvalid(other.to_string()),
                }
            })?;
            let raw = std::fs::read_to_string(&resolved).map_err(|e| {
                VerifyError::SchemaInvalid(format!("cannot read '{}': {e}", resolved.display()))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                VerifyError::SchemaInvalid(format!("'{}' is not JSON: {e}", resolved.display()))
            })?
        }
    };

    let Some(instance) = response_json else {
        return Err(VerifyError::BodyNotJson);
    };

    let validator = jsonschema::validator_for(&document)
        .map_err(|e| VerifyError::SchemaInvalid(e.to_string()))?;
    if let Some(error) = validator.iter_errors(instance).next() {
        return Err(VerifyError::SchemaValidation(error.to_string()));
    }
    Ok(())
}

/// Runs a (substituted) save step and returns its merged output map.
///
/// JMESPath extractions run first, then substitutions, then user functions;
/// later entries overwrite earlier ones on name conflicts. JMESPath
/// expressions evaluate against the parsed JSON body; when a lookup yields
/// nothing there, the projection `{headers, status}` is consulted so header
/// and status values stay reachable.
///
/// # Errors
///
/// Returns [`SaveError`] if an extraction, substitution, or function fails.
pub fn process_save(
    save: &Save,
    ctx: &LayeredContext,
    response: &ResponseSpec,
    response_json: Option<&JsonValue>,
    registry: &UserFunctionRegistry,
    max_comprehension_length: usize,
) -> Result<SavedVars, SaveError> {
    let mut saved = SavedVars::new();

    let body = response_json.cloned().unwrap_or(JsonValue::Null);
    for (name, expression) in &save.jmespath {
        let compiled = jmespath::compile(expression).map_err(|e| SaveError::BadExpression {
            name: name.clone(),
            message: e.to_string(),
        })?;
        let mut result = search_value(&compiled, &body, name)?;
        if result.is_null() {
            result = search_value(&compiled, &response_projection(response), name)?;
        }
        saved.insert(name.clone(), result);
    }

    for substitution in &save.substitutions {
        match substitution {
            relay_domain::Substitution::Vars(vars) => {
                for (name, value) in vars {
                    saved.insert(
                        name.clone(),
                        template::walk(value, ctx, max_comprehension_length)?,
                    );
                }
            }
            relay_domain::Substitution::Functions(functions) => {
                for (name, call) in functions {
                    let kwargs = walk_kwargs(&call.kwargs, ctx, max_comprehension_length)
                        .map_err(SaveError::Template)?;
                    let value = registry.call_substitution(&call.function, &kwargs)?;
                    saved.insert(name.clone(), value);
                }
            }
        }
    }

    for call in &save.user_functions {
        let kwargs = walk_kwargs(&call.kwargs, ctx, max_comprehension_length)
            .map_err(SaveError::Template)?;
        let values = registry.call_save(&call.function, response, &kwargs)?;
        for (name, value) in values {
            saved.insert(name, value);
        }
    }

    Ok(saved)
}

fn response_projection(response: &ResponseSpec) -> JsonValue {
    serde_json::json!({
        "status": response.status,
        "headers": response
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), JsonValue::String(v.clone())))
            .collect::<serde_json::Map<_, _>>(),
    })
}

fn search_value(
    compiled: &jmespath::Expression<'_>,
    document: &JsonValue,
    name: &str,
) -> Result<JsonValue, SaveError> {
    let search_error = |message: String| SaveError::Search {
        name: name.to_string(),
        message,
    };
    let data =
        jmespath::Variable::from_serializable(document).map_err(|e| search_error(e.to_string()))?;
    let result = compiled
        .search(data)
        .map_err(|e| search_error(e.to_string()))?;
    serde_json::to_value(&*result).map_err(|e| search_error(e.to_string()))
}

fn walk_kwargs(
    kwargs: &indexmap::IndexMap<String, JsonValue>,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<Kwargs, TemplateError> {
    let mut walked = Kwargs::with_capacity(kwargs.len());
    for (name, value) in kwargs {
        walked.insert(
            name.clone(),
            template::walk(value, ctx, max_comprehension_length)?,
        );
    }
    Ok(walked)
}
