//! Relay Domain - scenario model and transport types
//!
//! This crate defines the data model for the Relay HTTP scenario engine.
//! All types here are pure Rust with no I/O dependencies: the authoring
//! model (`scenario`), the materialized transport types (`transport`), the
//! engine configuration, and the validation errors.

pub mod config;
pub mod error;
pub mod scenario;
pub mod transport;

pub use config::EngineConfig;
pub use error::{ConfigError, DomainResult, ValidationError};
pub use scenario::{
    BodyChecks, FunctionRef, GraphqlQuery, HttpMethod, OneOrMany, ParallelConfig, ParameterBlock,
    Request, RequestBody, ResponseStep, ResponseSteps, Save, Scenario, SchemaSource, SslConfig,
    Stage, Substitution, Templatable, UserFunctionCall, Verify,
};
pub use transport::{
    Authenticator, BodyPayload, ClientCert, MultipartPart, RequestSpec, ResponseSpec, SslSettings,
    VerifyPolicy,
};
