//! Host integration port.
//!
//! The host embeds the engine: it supplies fixture values, receives
//! per-stage outcomes, interprets marker strings, and owns the cancellation
//! signal.

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors from fixture resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host does not define the requested fixture.
    #[error("unknown fixture '{0}'")]
    UnknownFixture(String),
}

/// Where a set of markers applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScope {
    /// Scenario-level markers.
    Scenario,
    /// Stage-level markers.
    Stage,
}

/// What the engine requires from its embedder.
pub trait Host: Send + Sync {
    /// Resolves a fixture name to a value.
    ///
    /// # Errors
    ///
    /// Returns `HostError::UnknownFixture` for names the host does not
    /// provide.
    fn fixture_value(&self, name: &str) -> Result<JsonValue, HostError>;

    /// Reports a passed stage iteration.
    fn report_pass(&self, stage: &str, iteration: Option<&str>);

    /// Reports a failed stage iteration with its error text.
    fn report_fail(&self, stage: &str, iteration: Option<&str>, error: &str);

    /// Reports a stage iteration that did not run (failed predecessor
    /// without `always_run`, or cancellation before dispatch).
    fn report_skip(&self, stage: &str, iteration: Option<&str>, reason: &str);

    /// Returns true once the host has requested cancellation. The scheduler
    /// stops dispatching new work; in-flight requests run to their timeout.
    fn cancelled(&self) -> bool;

    /// Hands marker strings to the host. The engine does not interpret
    /// their semantics.
    fn apply_markers(&self, scope: MarkerScope, target: &str, markers: &[String]);
}
