//! Relay Infrastructure - adapters around the engine
//!
//! Everything that touches the outside world on the engine's behalf: the
//! `$ref` reference resolver and scenario loader (filesystem), scenario
//! file discovery, and the reqwest-backed HTTP transport.

pub mod adapters;
pub mod loader;
pub mod resolver;

pub use adapters::ReqwestHttpClient;
pub use loader::{discover, load_scenario, scenario_name, LoadError, ScenarioFile};
pub use resolver::{ReferenceResolver, ResolveError};
