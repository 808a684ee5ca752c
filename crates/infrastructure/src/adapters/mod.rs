//! Adapters implementing the engine's ports.

mod reqwest_client;

pub use reqwest_client::ReqwestHttpClient;
