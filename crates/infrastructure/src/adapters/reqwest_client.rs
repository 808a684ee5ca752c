//! HTTP client adapter built on reqwest.
//!
//! Implements the engine's `HttpClient` port. Because TLS policy and the
//! redirect policy are fixed at client construction, one underlying client
//! is kept per distinct (TLS, redirect) pair; the connection pools are
//! shared across stages and parallel workers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity, Method};

use relay_application::ports::{HttpClient, HttpClientError};
use relay_domain::transport::ClientCert;
use relay_domain::{BodyPayload, HttpMethod, RequestSpec, ResponseSpec, SslSettings, VerifyPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    ssl: SslSettings,
    allow_redirects: bool,
}

/// reqwest-backed HTTP transport.
#[derive(Debug, Default)]
pub struct ReqwestHttpClient {
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl ReqwestHttpClient {
    /// Creates the adapter with an empty client pool.
    pub fn new() -> Self {
        Self::default()
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    fn client_for(&self, request: &RequestSpec) -> Result<Client, HttpClientError> {
        let key = ClientKey {
            ssl: request.ssl.clone(),
            allow_redirects: request.allow_redirects,
        };
        let mut clients = self.clients.lock().expect("client pool lock poisoned");
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let client = Self::build_client(&key)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn build_client(key: &ClientKey) -> Result<Client, HttpClientError> {
        let mut builder = Client::builder()
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            .redirect(if key.allow_redirects {
                Policy::limited(10)
            } else {
                Policy::none()
            });

        match &key.ssl.verify {
            VerifyPolicy::Enabled => {}
            VerifyPolicy::Disabled => {
                builder = builder.danger_accept_invalid_certs(true);
            }
            VerifyPolicy::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    HttpClientError::Transport(format!("cannot read CA bundle '{}': {e}", path.display()))
                })?;
                let certificate = Certificate::from_pem(&pem)
                    .map_err(|e| HttpClientError::Transport(format!("invalid CA bundle: {e}")))?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        if let Some(cert) = &key.ssl.client_cert {
            let pem = match cert {
                ClientCert::Combined(path) => std::fs::read(path).map_err(|e| {
                    HttpClientError::Transport(format!(
                        "cannot read client certificate '{}': {e}",
                        path.display()
                    ))
                })?,
                ClientCert::Pair { cert, key } => {
                    let mut combined = std::fs::read(cert).map_err(|e| {
                        HttpClientError::Transport(format!(
                            "cannot read client certificate '{}': {e}",
                            cert.display()
                        ))
                    })?;
                    combined.extend(std::fs::read(key).map_err(|e| {
                        HttpClientError::Transport(format!(
                            "cannot read client key '{}': {e}",
                            key.display()
                        ))
                    })?);
                    combined
                }
            };
            let identity = Identity::from_pem(&pem)
                .map_err(|e| HttpClientError::Transport(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| HttpClientError::Transport(e.to_string()))
    }

    async fn attach_body(
        builder: reqwest::RequestBuilder,
        payload: &BodyPayload,
    ) -> Result<reqwest::RequestBuilder, HttpClientError> {
        match payload {
            BodyPayload::Empty => Ok(builder),
            BodyPayload::Bytes(bytes) => Ok(builder.body(bytes.clone())),
            BodyPayload::File(path) => {
                let content = tokio::fs::read(path).await.map_err(|e| {
                    HttpClientError::InvalidBody(format!("cannot read '{}': {e}", path.display()))
                })?;
                Ok(builder.body(content))
            }
            BodyPayload::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    let content = tokio::fs::read(&part.file_path).await.map_err(|e| {
                        HttpClientError::InvalidBody(format!(
                            "cannot read '{}': {e}",
                            part.file_path.display()
                        ))
                    })?;
                    let file_name = part
                        .file_path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("file")
                        .to_string();
                    let mime = mime_guess::from_path(&part.file_path)
                        .first_or_octet_stream()
                        .to_string();
                    let file_part = Part::bytes(content)
                        .file_name(file_name)
                        .mime_str(&mime)
                        .map_err(|e| HttpClientError::InvalidBody(format!("invalid MIME type: {e}")))?;
                    form = form.part(part.name.clone(), file_part);
                }
                Ok(builder.multipart(form))
            }
        }
    }

    fn map_error(error: &reqwest::Error, request: &RequestSpec) -> HttpClientError {
        if error.is_timeout() {
            return HttpClientError::Timeout {
                timeout: request.timeout,
            };
        }
        HttpClientError::Transport(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {}", request.url)))?;
        let client = self.client_for(request)?;

        let started = Instant::now();
        let mut builder = client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = Self::attach_body(builder, &request.payload).await?;

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, request))?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&e, request))?;

        Ok(ResponseSpec::new(
            status,
            headers,
            body.to_vec(),
            started.elapsed(),
        ))
    }
}
