//! Template engine.
//!
//! Strings may embed `{{ expr }}` tokens. A string that is exactly one token
//! is a *complete template*: evaluation returns the raw expression result
//! and preserves its type. Any other occurrence is *inline*: each token is
//! replaced by the string form of its result.
//!
//! [`walk`] applies substitution recursively over JSON values;
//! [`walk_model`] round-trips a typed model through JSON so its string
//! fields are substituted and the result is revalidated.

pub mod eval;
pub mod lexer;
pub mod parser;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::context::LayeredContext;
use eval::Evaluator;

/// What went wrong while evaluating an expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateErrorKind {
    /// The expression does not parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A bare name was not found in any context layer.
    #[error("undefined name '{0}'")]
    UndefinedName(String),

    /// A call to a function the engine does not provide.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// An operation applied to incompatible values.
    #[error("type error: {0}")]
    Type(String),

    /// A bad list index or missing dict key.
    #[error("{0}")]
    Index(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A comprehension (or `range`) produced more elements than allowed.
    #[error("comprehension exceeds the limit of {0} elements")]
    ComprehensionLimit(usize),

    /// A substituted model no longer fits its schema.
    #[error("substituted value failed revalidation: {0}")]
    Revalidate(String),
}

/// An expression evaluation failure, carrying the offending expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("in '{{{{ {expr} }}}}': {kind}")]
pub struct TemplateError {
    /// The expression text as authored.
    pub expr: String,
    /// The failure.
    pub kind: TemplateErrorKind,
}

impl TemplateError {
    fn new(expr: &str, kind: TemplateErrorKind) -> Self {
        Self {
            expr: expr.to_string(),
            kind,
        }
    }
}

/// A `{{ ... }}` token found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateToken {
    /// Byte range of the whole token, braces included.
    pub span: std::ops::Range<usize>,
    /// The trimmed expression text.
    pub expr: String,
}

/// Scans a string for template tokens, left to right.
///
/// Tokens are non-greedy: each opens at `{{` and closes at the first
/// following `}}`. Empty expressions are ignored.
pub fn find_tokens(input: &str) -> Vec<TemplateToken> {
    let mut tokens = Vec::new();
    let mut from = 0;
    while let Some(open) = input[from..].find("{{") {
        let start = from + open;
        let Some(close) = input[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close + 2;
        let expr = input[start + 2..end - 2].trim();
        if !expr.is_empty() {
            tokens.push(TemplateToken {
                span: start..end,
                expr: expr.to_string(),
            });
        }
        from = end;
    }
    tokens
}

/// Returns the inner expression when the whole string (modulo surrounding
/// whitespace) is a single template token.
pub fn as_complete_template(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let tokens = find_tokens(trimmed);
    match tokens.as_slice() {
        [only] if only.span == (0..trimmed.len()) => Some(only.expr.clone()),
        _ => None,
    }
}

/// Returns true if the string contains at least one template token.
pub fn has_template(input: &str) -> bool {
    !find_tokens(input).is_empty()
}

/// Evaluates a single expression against the context.
///
/// # Errors
///
/// Returns `TemplateError` carrying the expression text on any lexing,
/// parsing, or evaluation failure.
pub fn evaluate(
    expr: &str,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<JsonValue, TemplateError> {
    let tokens = lexer::tokenize(expr)
        .map_err(|(message, offset)| {
            TemplateError::new(expr, TemplateErrorKind::Syntax(format!("{message} at offset {offset}")))
        })?;
    let ast = parser::parse(&tokens).map_err(|(message, offset)| {
        TemplateError::new(expr, TemplateErrorKind::Syntax(format!("{message} at offset {offset}")))
    })?;
    Evaluator::new(ctx, max_comprehension_length)
        .eval(&ast)
        .map_err(|kind| TemplateError::new(expr, kind))
}

/// Evaluates an expression and reports whether the result is truthy.
///
/// # Errors
///
/// Same conditions as [`evaluate`].
pub fn evaluate_truthy(
    expr: &str,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<bool, TemplateError> {
    evaluate(expr, ctx, max_comprehension_length).map(|v| eval::truthy(&v))
}

/// Renders string content: a complete template yields the raw result; a
/// string with inline tokens yields a string with each token substituted;
/// a plain string passes through unchanged.
///
/// # Errors
///
/// Returns `TemplateError` on any evaluation failure.
pub fn render(
    input: &str,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<JsonValue, TemplateError> {
    if let Some(expr) = as_complete_template(input) {
        return evaluate(&expr, ctx, max_comprehension_length);
    }

    let tokens = find_tokens(input);
    if tokens.is_empty() {
        return Ok(JsonValue::String(input.to_string()));
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for token in &tokens {
        out.push_str(&input[last..token.span.start]);
        let value = evaluate(&token.expr, ctx, max_comprehension_length)?;
        out.push_str(&to_display_string(&value));
        last = token.span.end;
    }
    out.push_str(&input[last..]);
    Ok(JsonValue::String(out))
}

/// Type-directed recursive substitution over a JSON value.
///
/// Strings are rendered; mappings get each value walked (keys untouched);
/// lists get each item walked; everything else passes through.
///
/// # Errors
///
/// Returns `TemplateError` on any evaluation failure.
pub fn walk(
    value: &JsonValue,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<JsonValue, TemplateError> {
    match value {
        JsonValue::String(s) => render(s, ctx, max_comprehension_length),
        JsonValue::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), walk(item, ctx, max_comprehension_length)?);
            }
            Ok(JsonValue::Object(out))
        }
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, ctx, max_comprehension_length)?);
            }
            Ok(JsonValue::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Returns true if any string inside the value contains a template token.
pub fn contains_template(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => has_template(s),
        JsonValue::Object(map) => map.values().any(contains_template),
        JsonValue::Array(items) => items.iter().any(contains_template),
        _ => false,
    }
}

/// Walks a typed model: dump to JSON, substitute, revalidate into the same
/// type. Models without any template pass through unchanged.
///
/// # Errors
///
/// Returns `TemplateError` on evaluation failure, or
/// `TemplateErrorKind::Revalidate` if the substituted document no longer
/// fits the model.
pub fn walk_model<T>(
    model: &T,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<T, TemplateError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let dumped = serde_json::to_value(model).map_err(|e| {
        TemplateError::new("<model>", TemplateErrorKind::Revalidate(e.to_string()))
    })?;
    if !contains_template(&dumped) {
        return Ok(model.clone());
    }
    let substituted = walk(&dumped, ctx, max_comprehension_length)?;
    serde_json::from_value(substituted)
        .map_err(|e| TemplateError::new("<model>", TemplateErrorKind::Revalidate(e.to_string())))
}

/// String form used when a token is substituted inline: strings are bare,
/// everything else is compact JSON.
pub fn to_display_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
