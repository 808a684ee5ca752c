//! Ports: the capabilities the engine consumes from its embedder.

pub mod host;
pub mod http_client;
pub mod user_functions;

pub use host::{Host, HostError, MarkerScope};
pub use http_client::{HttpClient, HttpClientError};
pub use user_functions::{
    BindError, Kwargs, SavedVars, UserFunction, UserFunctionRegistry,
};
