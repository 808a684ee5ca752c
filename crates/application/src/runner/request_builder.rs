//! Materializes a transport request from a stage's (already substituted)
//! request model plus scenario-level defaults.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use thiserror::Error;

use relay_domain::scenario::ssl::{SslCert, SslConfig, SslVerify};
use relay_domain::{
    Authenticator, BodyPayload, MultipartPart, Request, RequestBody, RequestSpec, Scenario,
    SslSettings, ValidationError, VerifyPolicy,
};
use relay_domain::transport::ClientCert;

use crate::context::LayeredContext;
use crate::ports::user_functions::Kwargs;
use crate::ports::{BindError, UserFunctionRegistry};
use crate::template::{self, TemplateError};

/// Errors while materializing a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    /// A field that must be concrete is still templated or out of range.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Substituting auth kwargs failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The auth factory could not be resolved or failed.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The URL is not absolute http(s).
    #[error("invalid URL '{0}': must start with http:// or https://")]
    InvalidUrl(String),

    /// The body could not be serialized.
    #[error("invalid body: {0}")]
    Body(String),

    /// A referenced file escapes the scenario root.
    #[error("path '{path}' resolves outside the scenario root")]
    PathOutsideRoot { path: String },

    /// The TLS configuration still holds an unresolved template.
    #[error("unresolved TLS configuration: {0}")]
    Ssl(String),
}

/// Builds a [`RequestSpec`] from a substituted request model.
///
/// `scenario` contributes the default auth factory and TLS policy;
/// `scenario_dir` anchors relative file paths; `root_path` bounds them.
///
/// # Errors
///
/// Returns [`BuildError`] when a templated field is still unresolved, the
/// body cannot be serialized, a path escapes the root, or auth fails.
pub fn build_request(
    request: &Request,
    scenario: &Scenario,
    ctx: &LayeredContext,
    registry: &UserFunctionRegistry,
    scenario_dir: &Path,
    root_path: &Path,
    max_comprehension_length: usize,
) -> Result<RequestSpec, BuildError> {
    if !request.url.starts_with("http://") && !request.url.starts_with("https://") {
        return Err(BuildError::InvalidUrl(request.url.clone()));
    }

    let method = *request.method.expect_value("request.method", "HTTP method")?;
    let timeout_secs = *request.timeout.expect_value("request.timeout", "number")?;
    if timeout_secs <= 0.0 {
        return Err(BuildError::Validation(ValidationError::OutOfRange {
            field: "request.timeout".to_string(),
            requirement: "greater than zero",
            value: timeout_secs.to_string(),
        }));
    }
    let allow_redirects = *request
        .allow_redirects
        .expect_value("request.allow_redirects", "boolean")?;

    let query = expand_query(request);
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let payload = build_payload(request.body.as_ref(), &mut headers, scenario_dir, root_path)?;

    // Body variant contributes a default Content-Type only when the headers
    // do not already carry one.
    if let Some(body) = &request.body {
        if let Some(content_type) = body.default_content_type() {
            if !has_header(&headers, "content-type") {
                headers.push(("Content-Type".to_string(), content_type.to_string()));
            }
        }
    }

    if let Some(auth) = request.auth.as_ref().or(scenario.auth.as_ref()) {
        let kwargs = walk_kwargs(&auth.kwargs, ctx, max_comprehension_length)?;
        let authenticator = registry.call_auth(&auth.function, &kwargs)?;
        apply_auth(&mut headers, &authenticator);
    }

    // The scenario-level policy is not covered by the request walk, so any
    // templates in the effective config are substituted here.
    let ssl_config = template::walk_model(
        request.ssl.as_ref().unwrap_or(&scenario.ssl),
        ctx,
        max_comprehension_length,
    )?;
    let ssl = resolve_ssl(&ssl_config, scenario_dir, root_path)?;

    Ok(RequestSpec {
        method,
        url: request.url.clone(),
        query,
        headers,
        payload,
        timeout: Duration::from_secs_f64(timeout_secs),
        allow_redirects,
        ssl,
    })
}

fn expand_query(request: &Request) -> Vec<(String, String)> {
    let mut query = Vec::new();
    for (key, value) in &request.params {
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    query.push((key.clone(), template::to_display_string(item)));
                }
            }
            other => query.push((key.clone(), template::to_display_string(other))),
        }
    }
    query
}

fn build_payload(
    body: Option<&RequestBody>,
    headers: &mut Vec<(String, String)>,
    scenario_dir: &Path,
    root_path: &Path,
) -> Result<BodyPayload, BuildError> {
    let Some(body) = body else {
        return Ok(BodyPayload::Empty);
    };

    match body {
        RequestBody::Json(value) => serde_json::to_vec(value)
            .map(BodyPayload::Bytes)
            .map_err(|e| BuildError::Body(e.to_string())),

        RequestBody::Form(pairs) => {
            let encoded: Vec<(String, String)> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), template::to_display_string(v)))
                .collect();
            serde_urlencoded::to_string(&encoded)
                .map(|s| BodyPayload::Bytes(s.into_bytes()))
                .map_err(|e| BuildError::Body(e.to_string()))
        }

        RequestBody::Xml(text) | RequestBody::Text(text) => {
            Ok(BodyPayload::Bytes(text.clone().into_bytes()))
        }

        RequestBody::Base64(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map(BodyPayload::Bytes)
            .map_err(|e| BuildError::Body(format!("invalid base64: {e}"))),

        RequestBody::Binary(path) => {
            let resolved = resolve_under_root(path, scenario_dir, root_path)?;
            if !has_header(headers, "content-type") {
                let guessed = mime_guess::from_path(&resolved)
                    .first_or_octet_stream()
                    .to_string();
                headers.push(("Content-Type".to_string(), guessed));
            }
            Ok(BodyPayload::File(resolved))
        }

        RequestBody::Files(files) => {
            let mut parts = Vec::with_capacity(files.len());
            for (name, path) in files {
                parts.push(MultipartPart {
                    name: name.clone(),
                    file_path: resolve_under_root(path, scenario_dir, root_path)?,
                });
            }
            Ok(BodyPayload::Multipart(parts))
        }

        RequestBody::Graphql(graphql) => {
            let document = serde_json::json!({
                "query": graphql.query,
                "variables": graphql.variables.clone().unwrap_or(serde_json::Value::Null),
            });
            serde_json::to_vec(&document)
                .map(BodyPayload::Bytes)
                .map_err(|e| BuildError::Body(e.to_string()))
        }
    }
}

fn walk_kwargs(
    kwargs: &indexmap::IndexMap<String, serde_json::Value>,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<Kwargs, BuildError> {
    let mut walked = Kwargs::with_capacity(kwargs.len());
    for (name, value) in kwargs {
        walked.insert(
            name.clone(),
            template::walk(value, ctx, max_comprehension_length)?,
        );
    }
    Ok(walked)
}

fn apply_auth(headers: &mut Vec<(String, String)>, authenticator: &Authenticator) {
    match authenticator {
        Authenticator::Basic { username, password } => {
            let credentials =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            set_header(headers, "Authorization", format!("Basic {credentials}"));
        }
        Authenticator::Bearer { token } => {
            set_header(headers, "Authorization", format!("Bearer {token}"));
        }
        Authenticator::Headers { headers: extra } => {
            for (name, value) in extra {
                set_header(headers, name, value.clone());
            }
        }
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

fn resolve_ssl(
    config: &SslConfig,
    scenario_dir: &Path,
    root_path: &Path,
) -> Result<SslSettings, BuildError> {
    let verify = match &config.verify {
        SslVerify::Flag(true) => VerifyPolicy::Enabled,
        SslVerify::Flag(false) => VerifyPolicy::Disabled,
        SslVerify::CaBundle(path) => {
            if template::has_template(path) {
                return Err(BuildError::Ssl(format!("verify: '{path}'")));
            }
            VerifyPolicy::CaBundle(resolve_under_root(path, scenario_dir, root_path)?)
        }
    };

    let client_cert = match &config.cert {
        None => None,
        Some(SslCert::Combined(path)) => Some(ClientCert::Combined(resolve_under_root(
            path,
            scenario_dir,
            root_path,
        )?)),
        Some(SslCert::Pair(cert, key)) => Some(ClientCert::Pair {
            cert: resolve_under_root(cert, scenario_dir, root_path)?,
            key: resolve_under_root(key, scenario_dir, root_path)?,
        }),
    };

    Ok(SslSettings {
        verify,
        client_cert,
    })
}

/// Joins a possibly relative path against the scenario directory and checks
/// the result stays under the root. Purely lexical, so missing files are
/// caught later by the transport, not here.
pub fn resolve_under_root(
    raw: &str,
    scenario_dir: &Path,
    root_path: &Path,
) -> Result<PathBuf, BuildError> {
    let joined = if Path::new(raw).is_absolute() {
        PathBuf::from(raw)
    } else {
        scenario_dir.join(raw)
    };
    let normalized = lexical_normalize(&joined);
    if !normalized.starts_with(lexical_normalize(root_path)) {
        return Err(BuildError::PathOutsideRoot {
            path: raw.to_string(),
        });
    }
    Ok(normalized)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bare_ctx() -> LayeredContext {
        LayeredContext::new()
    }

    fn build(request_doc: serde_json::Value) -> Result<RequestSpec, BuildError> {
        let request: Request = serde_json::from_value(request_doc).unwrap();
        build_request(
            &request,
            &Scenario::default(),
            &bare_ctx(),
            &UserFunctionRegistry::new(),
            Path::new("/suite/scenarios"),
            Path::new("/suite"),
            50_000,
        )
    }

    #[test]
    fn test_minimal_get() {
        let spec = build(json!({"url": "http://h/ping"})).unwrap();
        assert_eq!(spec.method.as_str(), "GET");
        assert_eq!(spec.url, "http://h/ping");
        assert!(spec.payload.is_empty());
        assert_eq!(spec.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = build(json!({"url": "ftp://h/x"})).unwrap_err();
        assert!(matches!(err, BuildError::InvalidUrl(_)));
    }

    #[test]
    fn test_json_body_and_default_content_type() {
        let spec = build(json!({
            "url": "http://h",
            "method": "POST",
            "body": {"json": {"a": 1}}
        }))
        .unwrap();
        assert_eq!(spec.header("content-type"), Some("application/json"));
        match &spec.payload {
            BodyPayload::Bytes(bytes) => {
                assert_eq!(serde_json::from_slice::<serde_json::Value>(bytes).unwrap(), json!({"a": 1}));
            }
            other => panic!("expected bytes payload, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let spec = build(json!({
            "url": "http://h",
            "headers": {"Content-Type": "application/vnd.custom+json"},
            "body": {"json": {}}
        }))
        .unwrap();
        let content_types: Vec<_> = spec
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0].1, "application/vnd.custom+json");
    }

    #[test]
    fn test_form_body_urlencoded() {
        let spec = build(json!({
            "url": "http://h",
            "method": "POST",
            "body": {"form": {"user": "a b", "n": 2}}
        }))
        .unwrap();
        match &spec.payload {
            BodyPayload::Bytes(bytes) => {
                assert_eq!(std::str::from_utf8(bytes).unwrap(), "user=a+b&n=2");
            }
            other => panic!("expected bytes payload, got {other:?}"),
        }
        assert_eq!(
            spec.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_base64_body_decodes() {
        let spec = build(json!({
            "url": "http://h",
            "method": "POST",
            "body": {"base64": "aGVsbG8="}
        }))
        .unwrap();
        assert_eq!(spec.payload, BodyPayload::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let err = build(json!({
            "url": "http://h",
            "body": {"base64": "!!!"}
        }))
        .unwrap_err();
        assert!(matches!(err, BuildError::Body(_)));
    }

    #[test]
    fn test_graphql_body() {
        let spec = build(json!({
            "url": "http://h",
            "method": "POST",
            "body": {"graphql": {"query": "query { me }", "variables": {"x": 1}}}
        }))
        .unwrap();
        match &spec.payload {
            BodyPayload::Bytes(bytes) => {
                let doc: serde_json::Value = serde_json::from_slice(bytes).unwrap();
                assert_eq!(doc["query"], "query { me }");
                assert_eq!(doc["variables"]["x"], 1);
            }
            other => panic!("expected bytes payload, got {other:?}"),
        }
    }

    #[test]
    fn test_query_expansion() {
        let spec = build(json!({
            "url": "http://h",
            "params": {"tag": ["a", "b"], "page": 2}
        }))
        .unwrap();
        assert_eq!(
            spec.query,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_binary_path_resolved_under_root() {
        let spec = build(json!({
            "url": "http://h",
            "body": {"binary": "payloads/data.bin"}
        }))
        .unwrap();
        assert_eq!(
            spec.payload,
            BodyPayload::File(PathBuf::from("/suite/scenarios/payloads/data.bin"))
        );
    }

    #[test]
    fn test_file_escape_rejected() {
        let err = build(json!({
            "url": "http://h",
            "body": {"binary": "../../etc/passwd"}
        }))
        .unwrap_err();
        assert!(matches!(err, BuildError::PathOutsideRoot { .. }));
    }

    #[test]
    fn test_files_multipart_parts() {
        let spec = build(json!({
            "url": "http://h",
            "method": "POST",
            "body": {"files": {"report": "data/report.pdf"}}
        }))
        .unwrap();
        match &spec.payload {
            BodyPayload::Multipart(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].name, "report");
                assert_eq!(
                    parts[0].file_path,
                    PathBuf::from("/suite/scenarios/data/report.pdf")
                );
            }
            other => panic!("expected multipart payload, got {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_method_template_rejected() {
        let err = build(json!({"url": "http://h", "method": "{{ m }}"})).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Validation(ValidationError::UnresolvedTemplate { .. })
        ));
    }

    #[test]
    fn test_auth_from_scenario_default() {
        let request: Request = serde_json::from_value(json!({"url": "http://h"})).unwrap();
        let scenario = Scenario {
            auth: Some(relay_domain::UserFunctionCall::named("auth:bearer").unwrap()),
            ..Scenario::default()
        };
        let mut registry = UserFunctionRegistry::new();
        registry.register_auth("auth:bearer", |_| {
            Ok(Authenticator::Bearer {
                token: "T".to_string(),
            })
        });

        let spec = build_request(
            &request,
            &scenario,
            &bare_ctx(),
            &registry,
            Path::new("/suite"),
            Path::new("/suite"),
            50_000,
        )
        .unwrap();
        assert_eq!(spec.header("authorization"), Some("Bearer T"));
    }

    #[test]
    fn test_stage_auth_overrides_scenario_auth() {
        let request: Request = serde_json::from_value(json!({
            "url": "http://h",
            "auth": "auth:stage_basic"
        }))
        .unwrap();
        let scenario = Scenario {
            auth: Some(relay_domain::UserFunctionCall::named("auth:bearer").unwrap()),
            ..Scenario::default()
        };
        let mut registry = UserFunctionRegistry::new();
        registry.register_auth("auth:bearer", |_| {
            Ok(Authenticator::Bearer {
                token: "nope".to_string(),
            })
        });
        registry.register_auth("auth:stage_basic", |_| {
            Ok(Authenticator::Basic {
                username: "u".to_string(),
                password: "p".to_string(),
            })
        });

        let spec = build_request(
            &request,
            &scenario,
            &bare_ctx(),
            &registry,
            Path::new("/suite"),
            Path::new("/suite"),
            50_000,
        )
        .unwrap();
        let auth = spec.header("authorization").unwrap();
        assert!(auth.starts_with("Basic "), "{auth}");
    }

    #[test]
    fn test_ssl_disabled() {
        let spec = build(json!({"url": "https://h", "ssl": {"verify": false}})).unwrap();
        assert_eq!(spec.ssl.verify, VerifyPolicy::Disabled);
    }

    #[test]
    fn test_ssl_ca_bundle_resolved() {
        let spec = build(json!({
            "url": "https://h",
            "ssl": {"verify": "ca/bundle.pem"}
        }))
        .unwrap();
        assert_eq!(
            spec.ssl.verify,
            VerifyPolicy::CaBundle(PathBuf::from("/suite/scenarios/ca/bundle.pem"))
        );
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
