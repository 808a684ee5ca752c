//! Scenario execution.
//!
//! The runner seeds the scenario context (substitutions, fixtures, the
//! global saves layer), walks the stages in authored order, and aggregates
//! per-stage results. Failure in a stage marks the scenario failed;
//! remaining stages run only when `always_run` holds.

pub mod parallel;
pub mod params;
pub mod request_builder;
pub mod response;
pub mod stage;

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use relay_domain::{EngineConfig, Scenario, Substitution};

use crate::context::{FrameKind, LayeredContext};
use crate::ports::host::MarkerScope;
use crate::ports::user_functions::Kwargs;
use crate::ports::{Host, HostError, HttpClient, UserFunctionRegistry};
use crate::template;
use stage::{StageErrorKind, StageExecutor, StageRunResult};

/// Fatal errors before any stage can run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScenarioError {
    /// A scenario-level fixture could not be resolved.
    #[error("scenario fixture resolution failed: {0}")]
    Fixture(#[from] HostError),

    /// Scenario-level substitutions failed to evaluate.
    #[error("scenario substitutions failed: {0}")]
    Seed(#[from] StageErrorKind),
}

/// Aggregate result of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    /// True when no stage failed.
    pub passed: bool,
    /// Per-stage results, in authored order.
    pub stages: Vec<StageRunResult>,
}

/// Executes scenarios against live endpoints.
pub struct ScenarioRunner {
    http: Arc<dyn HttpClient>,
    registry: Arc<UserFunctionRegistry>,
    host: Arc<dyn Host>,
    config: EngineConfig,
    scenario_dir: PathBuf,
    root_path: PathBuf,
}

impl ScenarioRunner {
    /// Creates a runner.
    ///
    /// `scenario_dir` is the directory of the scenario file (anchors
    /// relative paths); `root_path` bounds every file reference.
    pub fn new(
        http: Arc<dyn HttpClient>,
        registry: Arc<UserFunctionRegistry>,
        host: Arc<dyn Host>,
        config: EngineConfig,
        scenario_dir: PathBuf,
        root_path: PathBuf,
    ) -> Self {
        Self {
            http,
            registry,
            host,
            config,
            scenario_dir,
            root_path,
        }
    }

    /// Runs all stages of a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] only for setup failures (fixtures or
    /// scenario substitutions); stage failures are reported in the outcome.
    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioOutcome, ScenarioError> {
        if !scenario.marks.is_empty() {
            self.host.apply_markers(
                MarkerScope::Scenario,
                scenario.description.as_deref().unwrap_or("scenario"),
                &scenario.marks,
            );
        }

        let mut ctx = self.seed_context(scenario)?;
        info!(
            stages = scenario.stages.len(),
            description = scenario.description.as_deref().unwrap_or(""),
            "scenario start"
        );

        let executor = StageExecutor {
            http: Arc::clone(&self.http),
            registry: Arc::clone(&self.registry),
            host: Arc::clone(&self.host),
            scenario_dir: self.scenario_dir.clone(),
            root_path: self.root_path.clone(),
            max_comprehension_length: self.config.max_comprehension_length,
        };

        let mut failed = false;
        let mut stages = Vec::with_capacity(scenario.stages.len());
        for stage in scenario.stages.iter() {
            let result = executor.execute(scenario, stage, &mut ctx, failed).await;
            if result.failed {
                failed = true;
            }
            stages.push(result);
        }

        info!(passed = !failed, "scenario end");
        Ok(ScenarioOutcome {
            passed: !failed,
            stages,
        })
    }

    /// Builds the scenario-level stack: substitutions (read-only), the
    /// global saves layer, and scenario fixtures.
    fn seed_context(&self, scenario: &Scenario) -> Result<LayeredContext, ScenarioError> {
        let mut scratch = LayeredContext::new();
        scratch.push(FrameKind::StageSubstitutions, IndexMap::new());
        evaluate_substitutions(
            &scenario.substitutions,
            &mut scratch,
            &self.registry,
            self.config.max_comprehension_length,
        )?;
        let substitutions = scratch.pop().unwrap_or_default();
        debug!(bindings = substitutions.len(), "scenario substitutions ready");

        let mut ctx = LayeredContext::new();
        ctx.push(FrameKind::ScenarioSubstitutions, substitutions);
        ctx.push(FrameKind::GlobalSaves, IndexMap::new());

        let mut fixtures = IndexMap::new();
        for name in &scenario.fixtures {
            fixtures.insert(name.clone(), self.host.fixture_value(name)?);
        }
        ctx.push(FrameKind::Fixtures, fixtures);
        Ok(ctx)
    }
}

/// Evaluates substitution entries in authoring order against the growing
/// context, so later entries may reference earlier ones.
pub(crate) fn evaluate_substitutions(
    substitutions: &[Substitution],
    ctx: &mut LayeredContext,
    registry: &UserFunctionRegistry,
    max_comprehension_length: usize,
) -> Result<(), StageErrorKind> {
    for substitution in substitutions {
        match substitution {
            Substitution::Vars(vars) => {
                for (name, value) in vars {
                    let walked = template::walk(value, ctx, max_comprehension_length)?;
                    ctx.set(name.clone(), walked)?;
                }
            }
            Substitution::Functions(functions) => {
                for (name, call) in functions {
                    let mut kwargs = Kwargs::with_capacity(call.kwargs.len());
                    for (k, v) in &call.kwargs {
                        kwargs.insert(k.clone(), template::walk(v, ctx, max_comprehension_length)?);
                    }
                    let value = registry.call_substitution(&call.function, &kwargs)?;
                    ctx.set(name.clone(), value)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::stage::{IterationOutcome, StageError};
    use super::*;
    use crate::ports::{HostError, HttpClientError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use relay_domain::{RequestSpec, ResponseSpec};
    use serde_json::{json, Value as JsonValue};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Handler = Box<dyn Fn(&RequestSpec) -> Result<ResponseSpec, HttpClientError> + Send + Sync>;

    struct MockHttpClient {
        handler: Handler,
        requests: Mutex<Vec<RequestSpec>>,
    }

    impl MockHttpClient {
        fn with_handler<F>(handler: F) -> Arc<Self>
        where
            F: Fn(&RequestSpec) -> Result<ResponseSpec, HttpClientError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<RequestSpec> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn send(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError> {
            self.requests.lock().unwrap().push(request.clone());
            (self.handler)(request)
        }
    }

    fn json_response(status: u16, body: JsonValue) -> ResponseSpec {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        ResponseSpec::new(
            status,
            headers,
            serde_json::to_vec(&body).unwrap(),
            Duration::from_millis(1),
        )
    }

    #[derive(Default)]
    struct RecordingHost {
        fixtures: HashMap<String, JsonValue>,
        events: Mutex<Vec<String>>,
        cancel: AtomicBool,
    }

    impl RecordingHost {
        fn with_fixtures(fixtures: &[(&str, JsonValue)]) -> Arc<Self> {
            Arc::new(Self {
                fixtures: fixtures
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
                ..Self::default()
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Host for RecordingHost {
        fn fixture_value(&self, name: &str) -> Result<JsonValue, HostError> {
            self.fixtures
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::UnknownFixture(name.to_string()))
        }

        fn report_pass(&self, stage: &str, iteration: Option<&str>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("pass:{stage}:{}", iteration.unwrap_or("-")));
        }

        fn report_fail(&self, stage: &str, iteration: Option<&str>, _error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fail:{stage}:{}", iteration.unwrap_or("-")));
        }

        fn report_skip(&self, stage: &str, iteration: Option<&str>, _reason: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("skip:{stage}:{}", iteration.unwrap_or("-")));
        }

        fn cancelled(&self) -> bool {
            self.cancel.load(Ordering::SeqCst)
        }

        fn apply_markers(&self, _scope: MarkerScope, target: &str, markers: &[String]) {
            self.events
                .lock()
                .unwrap()
                .push(format!("marks:{target}:{}", markers.join(",")));
        }
    }

    fn runner(
        http: Arc<MockHttpClient>,
        host: Arc<RecordingHost>,
        registry: UserFunctionRegistry,
    ) -> ScenarioRunner {
        ScenarioRunner::new(
            http,
            Arc::new(registry),
            host,
            EngineConfig::default(),
            PathBuf::from("/suite/scenarios"),
            PathBuf::from("/suite"),
        )
    }

    fn scenario(document: JsonValue) -> Scenario {
        Scenario::from_document(document).unwrap()
    }

    #[tokio::test]
    async fn test_single_stage_pass() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({"ok": true}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "ping",
                    "request": {"url": "http://h/ping"},
                    "response": [{"verify": {"status": 200}}]
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(host.events(), vec!["pass:ping:-"]);
        assert_eq!(http.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_value_threading_between_stages() {
        let http = MockHttpClient::with_handler(|request| {
            if request.url.ends_with("/login") {
                Ok(json_response(200, json!({"token": "T"})))
            } else {
                assert_eq!(request.header("authorization"), Some("Bearer T"));
                Ok(json_response(200, json!({"me": "alice"})))
            }
        });
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [
                    {
                        "name": "login",
                        "request": {"url": "http://h/login", "method": "POST"},
                        "response": [
                            {"verify": {"status": 200}},
                            {"save": {"jmespath": {"token": "token"}}}
                        ]
                    },
                    {
                        "name": "me",
                        "request": {
                            "url": "http://h/me",
                            "headers": {"Authorization": "Bearer {{ token }}"}
                        },
                        "response": [{"verify": {"status": 200}}]
                    }
                ]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(host.events(), vec!["pass:login:-", "pass:me:-"]);
    }

    #[tokio::test]
    async fn test_cleanup_runs_after_failure_with_saved_values() {
        let http = MockHttpClient::with_handler(|request| {
            if request.url.ends_with("/create") {
                Ok(json_response(200, json!({"id": 42})))
            } else if request.url.contains("/use/") {
                Ok(json_response(500, json!({"error": "boom"})))
            } else {
                Ok(json_response(200, json!({})))
            }
        });
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [
                    {
                        "name": "create",
                        "request": {"url": "http://h/create", "method": "POST"},
                        "response": [{"save": {"jmespath": {"id": "id"}}}]
                    },
                    {
                        "name": "use",
                        "request": {"url": "http://h/use/{{ id }}"},
                        "response": [{"verify": {"status": 200}}]
                    },
                    {
                        "name": "skipped_stage",
                        "request": {"url": "http://h/never"}
                    },
                    {
                        "name": "cleanup",
                        "always_run": true,
                        "request": {"url": "http://h/cleanup/{{ id }}", "method": "DELETE"}
                    }
                ]
            })))
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(
            host.events(),
            vec![
                "pass:create:-",
                "fail:use:-",
                "skip:skipped_stage:-",
                "pass:cleanup:-"
            ]
        );

        let urls: Vec<String> = http.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "http://h/create",
                "http://h/use/42",
                "http://h/cleanup/42"
            ]
        );
    }

    #[tokio::test]
    async fn test_parametrize_cross_product() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "matrix",
                    "parametrize": [
                        {"individual": {"env": ["dev", "prod"]}},
                        {"individual": {"fmt": ["json", "xml"]}}
                    ],
                    "request": {"url": "http://h/{{ env }}/{{ fmt }}"}
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        let urls: Vec<String> = http.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "http://h/dev/json",
                "http://h/dev/xml",
                "http://h/prod/json",
                "http://h/prod/xml"
            ]
        );
        assert_eq!(
            host.events(),
            vec![
                "pass:matrix:dev-json",
                "pass:matrix:dev-xml",
                "pass:matrix:prod-json",
                "pass:matrix:prod-xml"
            ]
        );
    }

    #[tokio::test]
    async fn test_parametrize_iteration_failure_does_not_short_circuit() {
        let http = MockHttpClient::with_handler(|request| {
            if request.url.contains("bad") {
                Ok(json_response(500, json!({})))
            } else {
                Ok(json_response(200, json!({})))
            }
        });
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "sweep",
                    "parametrize": [{"individual": {"target": ["good", "bad", "also_good"]}}],
                    "request": {"url": "http://h/{{ target }}"},
                    "response": [{"verify": {"status": 200}}]
                }]
            })))
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(http.requests().len(), 3);
        assert_eq!(
            host.events(),
            vec!["pass:sweep:good", "fail:sweep:bad", "pass:sweep:also_good"]
        );
    }

    #[tokio::test]
    async fn test_fixtures_and_substitutions_with_precedence() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[("base_url", json!("http://fixture-host"))]);
        let mut registry = UserFunctionRegistry::new();
        registry.register_substitution("helpers:suffix", |_| Ok(json!("v2")));
        let runner = runner(Arc::clone(&http), Arc::clone(&host), registry);

        let outcome = runner
            .run(&scenario(json!({
                "fixtures": ["base_url"],
                "substitutions": [
                    {"vars": {"path": "ping"}},
                    {"functions": {"api_version": "helpers:suffix"}},
                    {"vars": {"full_path": "{{ api_version }}/{{ path }}"}}
                ],
                "stages": [{
                    "name": "ping",
                    "request": {"url": "{{ base_url }}/{{ full_path }}"}
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(http.requests()[0].url, "http://fixture-host/v2/ping");
    }

    #[tokio::test]
    async fn test_unknown_fixture_is_fatal() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(http, host, UserFunctionRegistry::new());

        let err = runner
            .run(&scenario(json!({
                "fixtures": ["ghost"],
                "stages": []
            })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ScenarioError::Fixture(HostError::UnknownFixture("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_save_cannot_shadow_fixture() {
        let http = MockHttpClient::with_handler(|_| {
            Ok(json_response(200, json!({"base_url": "http://evil"})))
        });
        let host = RecordingHost::with_fixtures(&[("base_url", json!("http://h"))]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "fixtures": ["base_url"],
                "stages": [{
                    "name": "grab",
                    "request": {"url": "{{ base_url }}/x"},
                    "response": [{"save": {"jmespath": {"base_url": "base_url"}}}]
                }]
            })))
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(host.events(), vec!["fail:grab:-"]);
    }

    #[tokio::test]
    async fn test_stage_substitutions_shadow_scenario_substitutions() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "substitutions": [{"vars": {"who": "scenario"}}],
                "stages": [
                    {
                        "name": "default",
                        "request": {"url": "http://h/{{ who }}"}
                    },
                    {
                        "name": "overridden",
                        "substitutions": [{"vars": {"who": "stage"}}],
                        "request": {"url": "http://h/{{ who }}"}
                    }
                ]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        let urls: Vec<String> = http.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(urls, vec!["http://h/scenario", "http://h/stage"]);
    }

    #[tokio::test]
    async fn test_parallel_repeat_runs_all_iterations() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "hammer",
                    "parallel": {"repeat": 6, "max_concurrency": 3},
                    "request": {"url": "http://h/load"},
                    "response": [{"verify": {"status": 200}}]
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(http.requests().len(), 6);
        assert_eq!(host.events().iter().filter(|e| e.starts_with("pass:hammer:")).count(), 6);
    }

    #[tokio::test]
    async fn test_parallel_foreach_binds_rows() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "regions",
                    "parallel": {
                        "foreach": [{"individual": {"region": ["eu", "us", "ap"]}}],
                        "max_concurrency": 2
                    },
                    "request": {"url": "http://h/{{ region }}"}
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        let mut urls: Vec<String> = http.requests().iter().map(|r| r.url.clone()).collect();
        urls.sort();
        assert_eq!(urls, vec!["http://h/ap", "http://h/eu", "http://h/us"]);
    }

    #[tokio::test]
    async fn test_parallel_rate_limit_floor() {
        let http = MockHttpClient::with_handler(|_| Ok(json_response(200, json!({}))));
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let start = std::time::Instant::now();
        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "paced",
                    "parallel": {"repeat": 10, "max_concurrency": 10, "calls_per_sec": 5.0},
                    "request": {"url": "http://h/paced"}
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed);
        assert_eq!(http.requests().len(), 10);
        // 10 calls at 5/sec: the first is free, the rest are paced, so
        // elapsed >= (10 - 1) / 5 = 1.8s.
        assert!(
            start.elapsed() >= Duration::from_millis(1_750),
            "elapsed only {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_verify_expressions_against_saved_state() {
        let http = MockHttpClient::with_handler(|_| {
            Ok(json_response(200, json!({"items": [1, 2, 3]})))
        });
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "inspect",
                    "request": {"url": "http://h/items"},
                    "response": [
                        {"save": {"jmespath": {"items": "items"}}},
                        {"verify": {"expressions": ["{{ len(items) == 3 }}", "{{ sum(items) > 5 }}"]}}
                    ]
                }]
            })))
            .await
            .unwrap();

        assert!(outcome.passed, "{:?}", outcome.stages);
    }

    #[tokio::test]
    async fn test_iteration_reports_carry_stage_errors() {
        let http = MockHttpClient::with_handler(|_| {
            Err(HttpClientError::Timeout {
                timeout: Duration::from_secs(30),
            })
        });
        let host = RecordingHost::with_fixtures(&[]);
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{"name": "slow", "request": {"url": "http://h/slow"}}]
            })))
            .await
            .unwrap();

        assert!(!outcome.passed);
        match &outcome.stages[0].iterations[0].outcome {
            IterationOutcome::Failed(StageError { stage, kind, .. }) => {
                assert_eq!(stage, "slow");
                assert!(matches!(kind, StageErrorKind::Http(HttpClientError::Timeout { .. })));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_skips_remaining_sequential_iterations() {
        let host = RecordingHost::with_fixtures(&[]);
        let host_for_handler = Arc::clone(&host);
        let http = MockHttpClient::with_handler(move |_| {
            host_for_handler.cancel.store(true, Ordering::SeqCst);
            Ok(json_response(200, json!({})))
        });
        let runner = runner(Arc::clone(&http), Arc::clone(&host), UserFunctionRegistry::new());

        let outcome = runner
            .run(&scenario(json!({
                "stages": [{
                    "name": "sweep",
                    "parametrize": [{"individual": {"n": [1, 2, 3]}}],
                    "request": {"url": "http://h/{{ n }}"}
                }]
            })))
            .await
            .unwrap();

        assert!(!outcome.passed);
        assert_eq!(http.requests().len(), 1);
        assert_eq!(
            host.events(),
            vec!["pass:sweep:1", "skip:sweep:2", "skip:sweep:3"]
        );
    }
}
