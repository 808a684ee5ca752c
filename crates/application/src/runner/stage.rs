//! Per-stage execution.
//!
//! Each stage iteration moves through a fixed sequence of states:
//!
//! ```text
//! PENDING → (prior failed, not always_run) → SKIPPED
//!        → BUILDING_CTX → RENDERING → SENDING → PROCESSING_RESPONSE → DONE
//!                           |             |              |
//!                           +------+------+--------------+→ FAILED
//! ```
//!
//! Saved values promote into the global layer when an iteration reaches
//! DONE. Parallel iterations promote in completion order after the whole
//! block finishes.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use relay_domain::{ParallelConfig, ResponseStep, Scenario, Stage, Templatable, Verify};

use crate::context::{ContextError, FrameKind, LayeredContext};
use crate::ports::host::MarkerScope;
use crate::ports::user_functions::SavedVars;
use crate::ports::{BindError, Host, HostError, HttpClient, HttpClientError, UserFunctionRegistry};
use crate::runner::parallel::run_parallel;
use crate::runner::params::{expand, ParamRow};
use crate::runner::request_builder::{build_request, BuildError};
use crate::runner::response::{process_save, process_verify, SaveError, VerifyError};
use crate::template::{self, TemplateError, TemplateErrorKind};

/// The states an iteration passes through; used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Skipped,
    BuildingCtx,
    Rendering,
    Sending,
    ProcessingResponse,
    Done,
    Failed,
}

/// What broke inside a stage iteration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageErrorKind {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Http(#[from] HttpClientError),

    #[error("verify step {index} failed: {source}")]
    Verify {
        index: usize,
        #[source]
        source: VerifyError,
    },

    #[error("save step {index} failed: {source}")]
    Save {
        index: usize,
        #[source]
        source: SaveError,
    },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Fixture(#[from] HostError),

    #[error("cancelled while in flight")]
    Cancelled,
}

/// A stage iteration failure, surfaced to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct StageError {
    /// Stage name.
    pub stage: String,
    /// Iteration key for parametrized or parallel stages.
    pub iteration: Option<String>,
    /// The underlying failure.
    pub kind: StageErrorKind,
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.iteration {
            Some(key) => write!(f, "stage '{}' [{key}]: {}", self.stage, self.kind),
            None => write!(f, "stage '{}': {}", self.stage, self.kind),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Outcome of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    Passed,
    Failed(StageError),
    Skipped(String),
}

/// Report for one iteration of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Iteration key (`None` for a plain stage).
    pub iteration: Option<String>,
    /// What happened.
    pub outcome: IterationOutcome,
}

/// Aggregate result of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRunResult {
    /// Stage name.
    pub stage: String,
    /// True if the whole stage was skipped.
    pub skipped: bool,
    /// True if any iteration failed.
    pub failed: bool,
    /// Per-iteration reports, in report order.
    pub iterations: Vec<IterationReport>,
}

/// Everything an iteration needs, shareable across parallel workers.
struct IterationEnv {
    scenario: Scenario,
    stage: Stage,
    http: Arc<dyn HttpClient>,
    registry: Arc<UserFunctionRegistry>,
    host: Arc<dyn Host>,
    scenario_dir: PathBuf,
    root_path: PathBuf,
    max_comprehension_length: usize,
}

/// Executes stages against a shared scenario context.
pub struct StageExecutor {
    pub http: Arc<dyn HttpClient>,
    pub registry: Arc<UserFunctionRegistry>,
    pub host: Arc<dyn Host>,
    pub scenario_dir: PathBuf,
    pub root_path: PathBuf,
    pub max_comprehension_length: usize,
}

impl StageExecutor {
    /// Runs one stage, promoting its saves into the global layer of `ctx`.
    ///
    /// `ctx` is the scenario-level stack (scenario substitutions, global
    /// saves, scenario fixtures); the stage pushes its own layers on a
    /// snapshot and never mutates `ctx` other than through promotion.
    pub async fn execute(
        &self,
        scenario: &Scenario,
        stage: &Stage,
        ctx: &mut LayeredContext,
        prior_failed: bool,
    ) -> StageRunResult {
        let always_run = match resolve_always_run(stage, ctx, self.max_comprehension_length) {
            Ok(flag) => flag,
            Err(e) => {
                let error = StageError {
                    stage: stage.name.clone(),
                    iteration: None,
                    kind: StageErrorKind::Template(e),
                };
                self.host.report_fail(&stage.name, None, &error.to_string());
                return StageRunResult {
                    stage: stage.name.clone(),
                    skipped: false,
                    failed: true,
                    iterations: vec![IterationReport {
                        iteration: None,
                        outcome: IterationOutcome::Failed(error),
                    }],
                };
            }
        };

        if prior_failed && !always_run {
            debug!(stage = %stage.name, state = ?StageState::Skipped, "prior stage failed");
            self.host
                .report_skip(&stage.name, None, "prior stage failed");
            return StageRunResult {
                stage: stage.name.clone(),
                skipped: true,
                failed: false,
                iterations: vec![IterationReport {
                    iteration: None,
                    outcome: IterationOutcome::Skipped("prior stage failed".to_string()),
                }],
            };
        }

        if !stage.marks.is_empty() {
            self.host
                .apply_markers(MarkerScope::Stage, &stage.name, &stage.marks);
        }

        let env = Arc::new(IterationEnv {
            scenario: scenario.clone(),
            stage: stage.clone(),
            http: Arc::clone(&self.http),
            registry: Arc::clone(&self.registry),
            host: Arc::clone(&self.host),
            scenario_dir: self.scenario_dir.clone(),
            root_path: self.root_path.clone(),
            max_comprehension_length: self.max_comprehension_length,
        });

        if let Some(parallel) = &stage.parallel {
            self.execute_parallel(&env, parallel, ctx).await
        } else if stage.parametrize.is_empty() {
            self.execute_sequential(&env, ctx, vec![None]).await
        } else {
            let rows = expand(&stage.parametrize)
                .into_iter()
                .map(Some)
                .collect::<Vec<_>>();
            self.execute_sequential(&env, ctx, rows).await
        }
    }

    /// Sequential path: a plain stage (one `None` row) or parametrize rows
    /// in lexicographic order. Iteration failures do not short-circuit the
    /// remaining rows.
    async fn execute_sequential(
        &self,
        env: &Arc<IterationEnv>,
        ctx: &mut LayeredContext,
        rows: Vec<Option<ParamRow>>,
    ) -> StageRunResult {
        let stage_name = env.stage.name.clone();
        let mut reports = Vec::with_capacity(rows.len());
        let mut failed = false;

        for row in rows {
            let (vars, key) = split_row(row);
            if self.host.cancelled() {
                self.host
                    .report_skip(&stage_name, key.as_deref(), "cancelled");
                reports.push(IterationReport {
                    iteration: key,
                    outcome: IterationOutcome::Skipped("cancelled".to_string()),
                });
                failed = true;
                continue;
            }

            match run_iteration(Arc::clone(env), ctx.snapshot(), vars, key.clone()).await {
                Ok(saved) => {
                    if let Err(e) = ctx.merge_into(FrameKind::GlobalSaves, saved) {
                        let error = StageError {
                            stage: stage_name.clone(),
                            iteration: key.clone(),
                            kind: StageErrorKind::Context(e),
                        };
                        self.host
                            .report_fail(&stage_name, key.as_deref(), &error.to_string());
                        reports.push(IterationReport {
                            iteration: key,
                            outcome: IterationOutcome::Failed(error),
                        });
                        failed = true;
                        continue;
                    }
                    self.host.report_pass(&stage_name, key.as_deref());
                    reports.push(IterationReport {
                        iteration: key,
                        outcome: IterationOutcome::Passed,
                    });
                }
                Err(error) => {
                    self.host
                        .report_fail(&stage_name, key.as_deref(), &error.to_string());
                    reports.push(IterationReport {
                        iteration: key,
                        outcome: IterationOutcome::Failed(error),
                    });
                    failed = true;
                }
            }
        }

        StageRunResult {
            stage: stage_name,
            skipped: false,
            failed,
            iterations: reports,
        }
    }

    /// Parallel path: bounded workers over repeat counts or foreach rows.
    /// Saves merge into the global layer in completion order once the whole
    /// block has finished (last completion wins).
    async fn execute_parallel(
        &self,
        env: &Arc<IterationEnv>,
        parallel: &ParallelConfig,
        ctx: &mut LayeredContext,
    ) -> StageRunResult {
        let stage_name = env.stage.name.clone();
        let rows: Vec<Option<ParamRow>> = match parallel {
            ParallelConfig::Repeat(config) => (0..config.repeat)
                .map(|i| {
                    Some(ParamRow {
                        values: IndexMap::new(),
                        id: format!("{}", i + 1),
                    })
                })
                .collect(),
            ParallelConfig::Foreach(config) => expand(&config.foreach).into_iter().map(Some).collect(),
        };

        let count = rows.len();
        let host = Arc::clone(&self.host);
        let cancelled: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(move || host.cancelled());

        let jobs: Vec<(Option<IndexMap<String, JsonValue>>, Option<String>)> = rows
            .into_iter()
            .map(|row| match row {
                Some(row) if row.values.is_empty() => (None, Some(row.id)),
                Some(row) => (Some(row.values), Some(row.id)),
                None => (None, None),
            })
            .collect();

        let base = ctx.snapshot();
        let outcomes = run_parallel(
            count,
            parallel.max_concurrency(),
            parallel.calls_per_sec(),
            cancelled,
            |index| {
                let (vars, key) = jobs[index].clone();
                let env = Arc::clone(env);
                let ctx = base.snapshot();
                async move {
                    let result = run_iteration(env, ctx, vars, key.clone()).await;
                    (key, result)
                }
            },
        )
        .await;

        let mut reports = Vec::with_capacity(count);
        let mut failed = false;
        // Outcomes arrive in completion order; the last completed
        // iteration's saves win on name conflicts.
        for outcome in outcomes {
            match outcome.result {
                None => {
                    let (_, key) = &jobs[outcome.index];
                    self.host
                        .report_skip(&stage_name, key.as_deref(), "cancelled");
                    reports.push(IterationReport {
                        iteration: key.clone(),
                        outcome: IterationOutcome::Skipped("cancelled".to_string()),
                    });
                    failed = true;
                }
                Some((key, Ok(saved))) => {
                    if let Err(e) = ctx.merge_into(FrameKind::GlobalSaves, saved) {
                        let error = StageError {
                            stage: stage_name.clone(),
                            iteration: key.clone(),
                            kind: StageErrorKind::Context(e),
                        };
                        self.host
                            .report_fail(&stage_name, key.as_deref(), &error.to_string());
                        reports.push(IterationReport {
                            iteration: key,
                            outcome: IterationOutcome::Failed(error),
                        });
                        failed = true;
                        continue;
                    }
                    self.host.report_pass(&stage_name, key.as_deref());
                    reports.push(IterationReport {
                        iteration: key,
                        outcome: IterationOutcome::Passed,
                    });
                }
                Some((key, Err(error))) => {
                    self.host
                        .report_fail(&stage_name, key.as_deref(), &error.to_string());
                    reports.push(IterationReport {
                        iteration: key,
                        outcome: IterationOutcome::Failed(error),
                    });
                    failed = true;
                }
            }
        }

        StageRunResult {
            stage: stage_name,
            skipped: false,
            failed,
            iterations: reports,
        }
    }
}

fn split_row(row: Option<ParamRow>) -> (Option<IndexMap<String, JsonValue>>, Option<String>) {
    match row {
        Some(row) => (Some(row.values), Some(row.id)),
        None => (None, None),
    }
}

fn resolve_always_run(
    stage: &Stage,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<bool, TemplateError> {
    match &stage.always_run {
        Templatable::Value(flag) => Ok(*flag),
        Templatable::Template(text) => {
            let value = template::render(text, ctx, max_comprehension_length)?;
            Ok(template::eval::truthy(&value))
        }
    }
}

/// Runs one full iteration lifecycle. On success, returns the values the
/// stage saved (to be promoted into the global layer by the caller).
async fn run_iteration(
    env: Arc<IterationEnv>,
    mut ctx: LayeredContext,
    iteration_vars: Option<IndexMap<String, JsonValue>>,
    iteration_key: Option<String>,
) -> Result<SavedVars, StageError> {
    let stage = &env.stage;
    let fail = |kind: StageErrorKind| StageError {
        stage: stage.name.clone(),
        iteration: iteration_key.clone(),
        kind,
    };

    debug!(stage = %stage.name, iteration = ?iteration_key, state = ?StageState::BuildingCtx, "building context");

    let mut fixtures = IndexMap::new();
    for name in &stage.fixtures {
        let value = env
            .host
            .fixture_value(name)
            .map_err(|e| fail(StageErrorKind::Fixture(e)))?;
        fixtures.insert(name.clone(), value);
    }
    ctx.push(FrameKind::Fixtures, fixtures);

    // Iteration variables are visible while substitutions evaluate, then
    // the layers are reassembled so iteration keeps the highest priority.
    if let Some(vars) = &iteration_vars {
        ctx.push(FrameKind::Iteration, vars.clone());
    }
    ctx.push(FrameKind::StageSubstitutions, IndexMap::new());
    crate::runner::evaluate_substitutions(
        &stage.substitutions,
        &mut ctx,
        &env.registry,
        env.max_comprehension_length,
    )
    .map_err(&fail)?;
    let substitutions = ctx.pop().unwrap_or_default();
    if iteration_vars.is_some() {
        ctx.pop();
    }
    ctx.push(FrameKind::StageSubstitutions, substitutions);
    ctx.push(FrameKind::StageSaves, IndexMap::new());
    if let Some(vars) = iteration_vars {
        ctx.push(FrameKind::Iteration, vars);
    }

    debug!(stage = %stage.name, state = ?StageState::Rendering, "substituting request");
    let request = template::walk_model(&stage.request, &ctx, env.max_comprehension_length)
        .map_err(|e| fail(StageErrorKind::Template(e)))?;
    let spec = build_request(
        &request,
        &env.scenario,
        &ctx,
        &env.registry,
        &env.scenario_dir,
        &env.root_path,
        env.max_comprehension_length,
    )
    .map_err(|e| fail(StageErrorKind::Build(e)))?;

    debug!(
        stage = %stage.name,
        method = %spec.method,
        url = %spec.url,
        state = ?StageState::Sending,
        "sending request"
    );
    let response = env
        .http
        .send(&spec)
        .await
        .map_err(|e| fail(StageErrorKind::Http(e)))?;
    debug!(stage = %stage.name, status = response.status, state = ?StageState::ProcessingResponse, "processing response");

    let response_json = response.json();
    let mut saved_accum = SavedVars::new();

    for (index, step) in stage.response.iter().enumerate() {
        match step {
            ResponseStep::Verify(verify) => {
                let walked = walk_verify(verify, &ctx, env.max_comprehension_length)
                    .map_err(|e| fail(StageErrorKind::Template(e)))?;
                process_verify(
                    &walked,
                    &ctx,
                    &response,
                    response_json.as_ref(),
                    &env.registry,
                    &env.scenario_dir,
                    &env.root_path,
                    env.max_comprehension_length,
                )
                .map_err(|source| fail(StageErrorKind::Verify { index, source }))?;
            }
            ResponseStep::Save(save) => {
                let walked = template::walk_model(save, &ctx, env.max_comprehension_length)
                    .map_err(|e| fail(StageErrorKind::Template(e)))?;
                let saved = process_save(
                    &walked,
                    &ctx,
                    &response,
                    response_json.as_ref(),
                    &env.registry,
                    env.max_comprehension_length,
                )
                .map_err(|source| fail(StageErrorKind::Save { index, source }))?;
                ctx.set_all(saved.clone())
                    .map_err(|e| fail(StageErrorKind::Context(e)))?;
                for (name, value) in saved {
                    saved_accum.insert(name, value);
                }
            }
        }
    }

    debug!(stage = %stage.name, saved = saved_accum.len(), state = ?StageState::Done, "stage iteration done");
    Ok(saved_accum)
}

/// Walks a verify step, shielding `expressions` from evaluation: those are
/// assertions processed later, not values to substitute now.
fn walk_verify(
    verify: &Verify,
    ctx: &LayeredContext,
    max_comprehension_length: usize,
) -> Result<Verify, TemplateError> {
    let mut dumped = serde_json::to_value(verify).map_err(|e| TemplateError {
        expr: "<verify>".to_string(),
        kind: TemplateErrorKind::Revalidate(e.to_string()),
    })?;
    let expressions = dumped
        .as_object_mut()
        .and_then(|map| map.remove("expressions"));
    let mut walked = template::walk(&dumped, ctx, max_comprehension_length)?;
    if let (Some(map), Some(expressions)) = (walked.as_object_mut(), expressions) {
        map.insert("expressions".to_string(), expressions);
    }
    serde_json::from_value(walked).map_err(|e| TemplateError {
        expr: "<verify>".to_string(),
        kind: TemplateErrorKind::Revalidate(e.to_string()),
    })
}
