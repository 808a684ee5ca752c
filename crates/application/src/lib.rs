//! Relay Application - the scenario engine
//!
//! This crate holds the executable core of Relay: the layered name
//! resolution context, the template engine, the ports the engine consumes
//! (HTTP transport, user functions, host integration), and the runner that
//! drives stages, response processing, parameterization, and parallel
//! iteration. It performs no network or filesystem I/O of its own beyond
//! reading schema files referenced by verify steps; transports and loaders
//! live behind the ports.

pub mod context;
pub mod ports;
pub mod runner;
pub mod template;

pub use context::{ContextError, FrameKind, LayeredContext};
pub use ports::{
    BindError, Host, HostError, HttpClient, HttpClientError, Kwargs, SavedVars,
    UserFunctionRegistry,
};
pub use runner::response::{SaveError, VerifyError};
pub use runner::stage::{
    IterationOutcome, IterationReport, StageError, StageErrorKind, StageRunResult,
};
pub use runner::{ScenarioError, ScenarioOutcome, ScenarioRunner};
pub use template::{TemplateError, TemplateErrorKind};
