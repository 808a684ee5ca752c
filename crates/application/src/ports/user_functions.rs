//! User function binder.
//!
//! Scenarios reference externally provided callables by string. The host
//! registers typed callables up front; the engine resolves references at
//! call time against that registry. Four arities exist, one per use:
//! save, verify, auth factory, and substitution.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

use relay_domain::scenario::FunctionRef;
use relay_domain::{Authenticator, ResponseSpec};

/// Keyword arguments delivered to a user function (template-substituted).
pub type Kwargs = IndexMap<String, JsonValue>;

/// A map of saved names to values, as returned by save functions.
pub type SavedVars = IndexMap<String, JsonValue>;

/// Errors from function resolution or invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No registered function matches the reference.
    #[error("function '{0}' is not registered")]
    NotFound(String),

    /// A function was found but registered under a different arity.
    #[error("function '{name}' is registered as a {actual} function, expected {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The function itself failed.
    #[error("function '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

type SaveFn = Arc<dyn Fn(&ResponseSpec, &Kwargs) -> Result<SavedVars, String> + Send + Sync>;
type VerifyFn = Arc<dyn Fn(&ResponseSpec, &Kwargs) -> Result<bool, String> + Send + Sync>;
type AuthFn = Arc<dyn Fn(&Kwargs) -> Result<Authenticator, String> + Send + Sync>;
type SubstitutionFn = Arc<dyn Fn(&Kwargs) -> Result<JsonValue, String> + Send + Sync>;

/// A registered callable, tagged with its arity.
#[derive(Clone)]
pub enum UserFunction {
    /// `(response, kwargs) → name→value map`.
    Save(SaveFn),
    /// `(response, kwargs) → bool`.
    Verify(VerifyFn),
    /// `(kwargs) → authenticator`.
    Auth(AuthFn),
    /// `(kwargs) → value`.
    Substitution(SubstitutionFn),
}

impl UserFunction {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Save(_) => "save",
            Self::Verify(_) => "verify",
            Self::Auth(_) => "auth",
            Self::Substitution(_) => "substitution",
        }
    }
}

impl std::fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserFunction::{}", self.kind())
    }
}

/// Registry of host-provided callables.
///
/// Keys are either fully qualified (`module.path:symbol`) or bare
/// (`symbol`). A bare reference resolves to a bare registration first,
/// then to the first qualified registration (in registration order) whose
/// symbol matches.
#[derive(Debug, Default, Clone)]
pub struct UserFunctionRegistry {
    functions: IndexMap<String, UserFunction>,
}

impl UserFunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable under a reference string.
    pub fn register(&mut self, name: impl Into<String>, function: UserFunction) {
        self.functions.insert(name.into(), function);
    }

    /// Registers a save function.
    pub fn register_save<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&ResponseSpec, &Kwargs) -> Result<SavedVars, String> + Send + Sync + 'static,
    {
        self.register(name, UserFunction::Save(Arc::new(f)));
    }

    /// Registers a verify function.
    pub fn register_verify<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&ResponseSpec, &Kwargs) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.register(name, UserFunction::Verify(Arc::new(f)));
    }

    /// Registers an auth factory.
    pub fn register_auth<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Kwargs) -> Result<Authenticator, String> + Send + Sync + 'static,
    {
        self.register(name, UserFunction::Auth(Arc::new(f)));
    }

    /// Registers a substitution function.
    pub fn register_substitution<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Kwargs) -> Result<JsonValue, String> + Send + Sync + 'static,
    {
        self.register(name, UserFunction::Substitution(Arc::new(f)));
    }

    /// Resolves a reference to a registered callable.
    ///
    /// # Errors
    ///
    /// Returns `BindError::NotFound` if nothing matches.
    pub fn resolve(&self, reference: &FunctionRef) -> Result<&UserFunction, BindError> {
        if let Some(found) = self.functions.get(reference.as_str()) {
            return Ok(found);
        }
        if reference.is_bare() {
            // Fall back to qualified registrations with a matching symbol,
            // in registration order.
            let suffix = format!(":{}", reference.symbol());
            if let Some((_, found)) = self
                .functions
                .iter()
                .find(|(key, _)| key.ends_with(&suffix))
            {
                return Ok(found);
            }
        }
        Err(BindError::NotFound(reference.as_str().to_string()))
    }

    /// Resolves and calls a save function.
    ///
    /// # Errors
    ///
    /// `BindError::NotFound`, `WrongKind`, or `Failed`.
    pub fn call_save(
        &self,
        reference: &FunctionRef,
        response: &ResponseSpec,
        kwargs: &Kwargs,
    ) -> Result<SavedVars, BindError> {
        match self.resolve(reference)? {
            UserFunction::Save(f) => f(response, kwargs).map_err(|message| BindError::Failed {
                name: reference.as_str().to_string(),
                message,
            }),
            other => Err(self.wrong_kind(reference, "save", other)),
        }
    }

    /// Resolves and calls a verify function.
    ///
    /// # Errors
    ///
    /// `BindError::NotFound`, `WrongKind`, or `Failed`.
    pub fn call_verify(
        &self,
        reference: &FunctionRef,
        response: &ResponseSpec,
        kwargs: &Kwargs,
    ) -> Result<bool, BindError> {
        match self.resolve(reference)? {
            UserFunction::Verify(f) => f(response, kwargs).map_err(|message| BindError::Failed {
                name: reference.as_str().to_string(),
                message,
            }),
            other => Err(self.wrong_kind(reference, "verify", other)),
        }
    }

    /// Resolves and calls an auth factory.
    ///
    /// # Errors
    ///
    /// `BindError::NotFound`, `WrongKind`, or `Failed`.
    pub fn call_auth(
        &self,
        reference: &FunctionRef,
        kwargs: &Kwargs,
    ) -> Result<Authenticator, BindError> {
        match self.resolve(reference)? {
            UserFunction::Auth(f) => f(kwargs).map_err(|message| BindError::Failed {
                name: reference.as_str().to_string(),
                message,
            }),
            other => Err(self.wrong_kind(reference, "auth", other)),
        }
    }

    /// Resolves and calls a substitution function.
    ///
    /// # Errors
    ///
    /// `BindError::NotFound`, `WrongKind`, or `Failed`.
    pub fn call_substitution(
        &self,
        reference: &FunctionRef,
        kwargs: &Kwargs,
    ) -> Result<JsonValue, BindError> {
        match self.resolve(reference)? {
            UserFunction::Substitution(f) => f(kwargs).map_err(|message| BindError::Failed {
                name: reference.as_str().to_string(),
                message,
            }),
            other => Err(self.wrong_kind(reference, "substitution", other)),
        }
    }

    fn wrong_kind(
        &self,
        reference: &FunctionRef,
        expected: &'static str,
        actual: &UserFunction,
    ) -> BindError {
        BindError::WrongKind {
            name: reference.as_str().to_string(),
            expected,
            actual: actual.kind(),
        }
    }
}
