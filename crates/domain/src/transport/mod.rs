//! Transport-level types: the materialized request handed to the HTTP
//! client and the response it yields.

mod request;
mod response;

pub use request::{
    BodyPayload, ClientCert, MultipartPart, RequestSpec, SslSettings, VerifyPolicy,
};
pub use response::ResponseSpec;

use serde::{Deserialize, Serialize};

/// An authenticator produced by an auth factory function and applied to a
/// request by the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum Authenticator {
    /// HTTP Basic authentication.
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// Arbitrary headers added to the request.
    Headers { headers: Vec<(String, String)> },
}
