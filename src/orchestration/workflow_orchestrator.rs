//! # Workflow Orchestrator
//!
//! Drives one migration workflow from parameters to a [`WorkflowResult`].
//!
//! ## Lifecycle
//!
//! ```text
//! Created -> Validating -> Planning -> RiskAssessment -> Executing -> Completing -> Completed
//!     \___________\____________\____________\______________\____________\______> Failed
//! ```
//!
//! Phases run one at a time in plan order. Inside a phase, the executor fans out
//! sub-operations through the [`PhaseRuntime`], which bounds them with the run's
//! concurrency limiter and serves repeats from the result cache.
//!
//! ## Outcomes
//!
//! - Bad params, unmet system prerequisites, and rejected plans return `Err`.
//! - The first failing phase halts the run and yields a `FAILED` result carrying
//!   every completed phase and exactly one error.
//! - A run where every phase succeeds yields a `COMPLETED` result, unless a phase
//!   reported a `CRITICAL` issue, which returns `CompletionInvariantError`.
//!
//! Cache and metrics are owned by the orchestrator instance and persist across
//! runs on that instance.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigManager, OrchestratorConfig, PipelineParams};
use crate::constants::{error_codes, events, IssueSeverity, PhaseStatus, WorkflowStatus, BOOTSTRAP_PHASE};
use crate::error::{OrchestratorError, Result};
use crate::events::{CheckpointEvent, LoggingProgressSink, PhaseStartedEvent, ProgressSink, ProgressUpdate};
use crate::logging::{log_error, log_phase_operation, log_workflow_operation};
use crate::orchestration::concurrency_limiter::{ConcurrencyLimiter, QueueStats};
use crate::orchestration::metrics::{MetricsCollector, OperationMetricsSnapshot};
use crate::orchestration::phase_planner::PhasePlanner;
use crate::orchestration::phase_runtime::{BatchOptions, PhaseRuntime, SubOperationOutcome};
use crate::orchestration::result_cache::{CacheStore, NoOpCacheStore, ResultCache};
use crate::orchestration::risk_assessor::RiskAssessor;
use crate::orchestration::system_check::{FileSystemPrerequisiteChecker, PrerequisiteChecker};
use crate::orchestration::types::{
    ExecutionPlan, OverallMetrics, Phase, PhaseOutput, PhaseResult, RiskAssessment,
    WorkflowContext, WorkflowError, WorkflowResult,
};
use crate::registry::PhaseExecutorRegistry;
use crate::state_machine::{WorkflowState, WorkflowStateMachine};

const COMPONENT: &str = "workflow_orchestrator";

pub struct WorkflowOrchestrator {
    config: OrchestratorConfig,
    planner: PhasePlanner,
    registry: Arc<PhaseExecutorRegistry>,
    risk_assessor: RiskAssessor,
    prerequisite_checker: Arc<dyn PrerequisiteChecker>,
    progress_sink: Arc<dyn ProgressSink>,
    cache: Arc<dyn CacheStore<SubOperationOutcome>>,
    metrics: Arc<MetricsCollector>,
    /// Limiter of the current or most recent run
    limiter: RwLock<Arc<ConcurrencyLimiter>>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("planner", &self.planner)
            .field("registry", &self.registry)
            .field("cache", &self.cache.provider_name())
            .finish()
    }
}

/// Mutable bookkeeping for the execution stage of one run
struct PhaseLedger {
    results: Vec<PhaseResult>,
    completed: HashSet<String>,
    outputs: Vec<(String, PhaseOutput)>,
    failure: Option<OrchestratorError>,
    checkpoints_taken: u32,
}

impl WorkflowOrchestrator {
    /// Build an orchestrator with the default prerequisite checker, a logging
    /// progress sink, and an in-memory cache when caching is enabled.
    pub fn new(config: OrchestratorConfig, registry: Arc<PhaseExecutorRegistry>) -> Result<Self> {
        config.validate()?;
        let limiter = ConcurrencyLimiter::new(config.execution.default_max_concurrency)?;
        let cache: Arc<dyn CacheStore<SubOperationOutcome>> = if config.cache.enabled {
            Arc::new(ResultCache::new())
        } else {
            Arc::new(NoOpCacheStore)
        };

        info!(
            default_max_concurrency = config.execution.default_max_concurrency,
            cache_provider = cache.provider_name(),
            registered_executors = registry.registered_ids().len(),
            "Workflow orchestrator initialized"
        );

        Ok(Self {
            risk_assessor: RiskAssessor::new(config.risk.clone(), config.mitigation.clone()),
            config,
            planner: PhasePlanner::new(),
            registry,
            prerequisite_checker: Arc::new(FileSystemPrerequisiteChecker::new()),
            progress_sink: Arc::new(LoggingProgressSink),
            cache,
            metrics: Arc::new(MetricsCollector::new()),
            limiter: RwLock::new(Arc::new(limiter)),
        })
    }

    /// Build from loaded configuration, initialising logging from its `logging` section
    pub fn from_config_manager(
        manager: &ConfigManager,
        registry: Arc<PhaseExecutorRegistry>,
    ) -> Result<Self> {
        crate::logging::init_structured_logging(manager.config().logging.json);
        Self::new(manager.config().clone(), registry)
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = sink;
        self
    }

    pub fn with_prerequisite_checker(mut self, checker: Arc<dyn PrerequisiteChecker>) -> Self {
        self.prerequisite_checker = checker;
        self
    }

    pub fn with_planner(mut self, planner: PhasePlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_cache_store(mut self, cache: Arc<dyn CacheStore<SubOperationOutcome>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn planner_mut(&mut self) -> &mut PhasePlanner {
        &mut self.planner
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PhaseExecutorRegistry> {
        &self.registry
    }

    /// Operation metrics accumulated over every run on this instance
    pub fn metrics(&self) -> OperationMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.limiter.read().queue_stats()
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache
            .clear()
            .map_err(|e| OrchestratorError::CacheError(e.to_string()))
    }

    /// Run the full workflow for `project_root`
    #[instrument(skip(self, params, project_root), fields(project_root = %project_root.as_ref().display()))]
    pub async fn execute_workflow(
        &self,
        params: PipelineParams,
        project_root: impl AsRef<Path>,
    ) -> Result<WorkflowResult> {
        let context = WorkflowContext::new(params, project_root.as_ref());
        let session_id = context.session_id.clone();
        let mut machine = WorkflowStateMachine::new(session_id.as_str());

        log_workflow_operation(events::WORKFLOW_STARTED, &session_id, "started", None);

        match self.run(&mut machine, context).await {
            Ok(result) => {
                log_workflow_operation(
                    if result.is_completed() {
                        events::WORKFLOW_COMPLETED
                    } else {
                        events::WORKFLOW_FAILED
                    },
                    &session_id,
                    &result.status.to_string(),
                    None,
                );
                Ok(result)
            }
            Err(e) => {
                machine.fail();
                log_error(COMPONENT, "execute_workflow", &e.to_string(), Some(session_id.as_str()));
                log_workflow_operation(
                    events::WORKFLOW_FAILED,
                    &session_id,
                    "failed",
                    Some(e.code()),
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        machine: &mut WorkflowStateMachine,
        context: WorkflowContext,
    ) -> Result<WorkflowResult> {
        let run_started = Instant::now();

        machine.transition(WorkflowState::Validating)?;
        context.params.validate()?;
        self.prerequisite_checker
            .check(&context.project_root, &context.params)
            .await?;
        let file_count = match self
            .prerequisite_checker
            .count_source_files(&context.project_root)
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(session_id = %context.session_id, error = %e, "Source file count unavailable");
                None
            }
        };
        let context = context.with_source_file_count(file_count);

        machine.transition(WorkflowState::Planning)?;
        let plan = self.planner.create_execution_plan(&context);
        let order = self.planner.execution_order(&plan)?;

        machine.transition(WorkflowState::RiskAssessment)?;
        let risk_assessment = self.risk_assessor.assess_workflow_risk(&context);
        info!(
            session_id = %context.session_id,
            level = %risk_assessment.level,
            score = risk_assessment.score,
            confidence = risk_assessment.confidence,
            "Workflow risk recorded"
        );

        machine.transition(WorkflowState::Executing)?;
        let limiter = Arc::new(ConcurrencyLimiter::new(context.params.max_concurrency)?);
        *self.limiter.write() = limiter.clone();
        let runtime = PhaseRuntime::new(
            limiter.clone(),
            self.cache.clone(),
            self.metrics.clone(),
            self.config.cache.ttl(),
        )
        .with_batch_options(BatchOptions {
            fail_fast: self.config.execution.fail_fast_batches,
        });

        let context = Arc::new(context);
        let ledger = self.execute_phases(&order, context.clone(), &runtime).await;

        let overall_metrics = OverallMetrics {
            operations: self.metrics.snapshot(),
            phases_total: order.len(),
            phases_completed: ledger.completed.len(),
            total_duration_ms: run_started.elapsed().as_millis() as u64,
            estimated_duration_ms: plan.estimated_duration_ms,
            peak_concurrency: limiter.peak_running(),
            checkpoints_taken: ledger.checkpoints_taken,
        };

        if ledger.failure.is_some() {
            let mut result = self.failed_result(&context, &plan, &order, ledger, overall_metrics, risk_assessment);
            machine.fail();
            result.state_transitions = machine.history().to_vec();
            return Ok(result);
        }

        machine.transition(WorkflowState::Completing)?;
        let mut result = self.completed_result(&context, &plan, &order, ledger, overall_metrics, risk_assessment);
        check_completion_invariant(&result)?;
        machine.transition(WorkflowState::Completed)?;
        result.state_transitions = machine.history().to_vec();

        info!(
            session_id = %result.session_id,
            phases = result.per_phase_results.len(),
            risk_mitigation_score = result.risk_mitigation_score,
            total_duration_ms = result.overall_metrics.total_duration_ms,
            "Workflow completed"
        );
        Ok(result)
    }

    async fn execute_phases(
        &self,
        order: &[Phase],
        context: Arc<WorkflowContext>,
        runtime: &PhaseRuntime,
    ) -> PhaseLedger {
        let total = order.len();
        let checkpoint_interval = (context.params.checkpoint_interval_minutes > 0).then(|| {
            Duration::from_secs(u64::from(context.params.checkpoint_interval_minutes) * 60)
        });
        let mut last_checkpoint = Instant::now();
        let mut ledger = PhaseLedger {
            results: Vec::with_capacity(total),
            completed: HashSet::with_capacity(total),
            outputs: Vec::with_capacity(total),
            failure: None,
            checkpoints_taken: 0,
        };

        for (position, phase) in order.iter().enumerate() {
            self.progress_sink.on_phase_started(PhaseStartedEvent {
                session_id: context.session_id.clone(),
                phase_id: phase.id.clone(),
                phase_name: phase.name.clone(),
                position: position + 1,
                total,
            });
            log_phase_operation(
                events::PHASE_STARTED,
                &context.session_id,
                &phase.id,
                "started",
                None,
                None,
            );

            let started_at = chrono::Utc::now();
            let started = Instant::now();
            let outcome = match unmet_prerequisite(phase, &ledger.completed) {
                Some(missing) => Err(OrchestratorError::phase_failed(
                    &phase.id,
                    format!("prerequisite phase '{missing}' has not completed"),
                    error_codes::PREREQUISITE_NOT_MET,
                )),
                None => self.run_phase(phase, context.clone(), runtime).await,
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let status = if outcome.is_ok() {
                PhaseStatus::Completed
            } else {
                PhaseStatus::Failed
            };
            ledger.results.push(PhaseResult {
                phase_id: phase.id.clone(),
                phase_name: phase.name.clone(),
                status,
                output: outcome.as_ref().ok().cloned(),
                duration_ms,
                started_at,
                completed_at: chrono::Utc::now(),
            });

            match outcome {
                Ok(output) => {
                    log_phase_operation(
                        events::PHASE_COMPLETED,
                        &context.session_id,
                        &phase.id,
                        "completed",
                        Some(duration_ms),
                        None,
                    );
                    ledger.completed.insert(phase.id.clone());
                    ledger.outputs.push((phase.id.clone(), output));
                    self.progress_sink.on_progress(ProgressUpdate::new(
                        &context.session_id,
                        &phase.name,
                        ledger.completed.len(),
                        total,
                    ));

                    if let Some(interval) = checkpoint_interval {
                        if last_checkpoint.elapsed() >= interval {
                            ledger.checkpoints_taken += 1;
                            last_checkpoint = Instant::now();
                            self.progress_sink.on_checkpoint(CheckpointEvent {
                                session_id: context.session_id.clone(),
                                sequence: ledger.checkpoints_taken,
                                completed_phases: ledger
                                    .outputs
                                    .iter()
                                    .map(|(id, _)| id.clone())
                                    .collect(),
                                taken_at: chrono::Utc::now(),
                            });
                        }
                    }
                }
                Err(e) => {
                    log_phase_operation(
                        events::PHASE_FAILED,
                        &context.session_id,
                        &phase.id,
                        "failed",
                        Some(duration_ms),
                        Some(e.to_string().as_str()),
                    );
                    ledger.failure = Some(e);
                    break;
                }
            }
        }

        ledger
    }

    /// Resolve and invoke the executor for `phase`. With a phase timeout set the
    /// runtime stops admitting sub-operations at the deadline, in-flight work
    /// drains, and an overrun phase fails with `PHASE_TIMEOUT`.
    async fn run_phase(
        &self,
        phase: &Phase,
        context: Arc<WorkflowContext>,
        runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        let executor = self.registry.get(&phase.id).ok_or_else(|| {
            OrchestratorError::phase_failed(
                &phase.id,
                format!("no executor registered for phase '{}'", phase.id),
                error_codes::EXECUTOR_NOT_REGISTERED,
            )
        })?;

        // The deadline only stops new sub-operations; admitted ones always finish
        let limit = self.config.execution.phase_timeout();
        runtime.set_deadline(limit);
        let started = Instant::now();
        let outcome = executor.execute(phase, context, runtime).await;
        let overran = runtime.deadline_exceeded() || limit.is_some_and(|l| started.elapsed() >= l);
        runtime.set_deadline(None);

        if let Some(limit) = limit.filter(|_| overran) {
            return Err(OrchestratorError::phase_failed(
                &phase.id,
                format!("phase exceeded its {}s timeout", limit.as_secs()),
                error_codes::PHASE_TIMEOUT,
            ));
        }

        outcome.map_err(|e| match e {
            OrchestratorError::PhaseExecutionError { .. } => e,
            other => OrchestratorError::phase_failed(
                &phase.id,
                other.to_string(),
                error_codes::EXECUTOR_FAILED,
            ),
        })
    }

    fn failed_result(
        &self,
        context: &WorkflowContext,
        plan: &ExecutionPlan,
        order: &[Phase],
        ledger: PhaseLedger,
        overall_metrics: OverallMetrics,
        risk_assessment: RiskAssessment,
    ) -> WorkflowResult {
        let mut warnings = Vec::new();
        for (phase_id, output) in &ledger.outputs {
            warnings.extend(output.warnings.iter().cloned());
            warnings.extend(
                output
                    .issues
                    .iter()
                    .map(|issue| format!("[{phase_id}] {:?} {}: {}", issue.severity, issue.code, issue.message)),
            );
        }

        let errors = ledger
            .failure
            .map(|failure| {
                let phase_id = match &failure {
                    OrchestratorError::PhaseExecutionError { phase_id, .. } => Some(phase_id.clone()),
                    _ => None,
                };
                vec![WorkflowError {
                    phase_id,
                    code: failure.code().to_string(),
                    message: failure.to_string(),
                    severity: IssueSeverity::Error,
                }]
            })
            .unwrap_or_default();

        let mut result = WorkflowResult {
            session_id: context.session_id.clone(),
            status: WorkflowStatus::Failed,
            plan_id: plan.id.clone(),
            execution_order: order.iter().map(|p| p.id.clone()).collect(),
            per_phase_results: ledger.results,
            overall_metrics,
            risk_assessment,
            risk_mitigation_score: 0.0,
            errors,
            warnings,
            state_transitions: Vec::new(),
            timestamp: chrono::Utc::now(),
        };
        result.risk_mitigation_score = self.risk_assessor.calculate_risk_mitigation_score(&result);

        warn!(
            session_id = %result.session_id,
            completed_phases = result.overall_metrics.phases_completed,
            error = ?result.errors.first().map(|e| &e.code),
            "Workflow failed"
        );
        result
    }

    fn completed_result(
        &self,
        context: &WorkflowContext,
        plan: &ExecutionPlan,
        order: &[Phase],
        ledger: PhaseLedger,
        overall_metrics: OverallMetrics,
        risk_assessment: RiskAssessment,
    ) -> WorkflowResult {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        for (phase_id, output) in &ledger.outputs {
            warnings.extend(output.warnings.iter().cloned());
            for issue in &output.issues {
                if issue.severity >= IssueSeverity::Error {
                    errors.push(WorkflowError {
                        phase_id: Some(phase_id.clone()),
                        code: issue.code.clone(),
                        message: issue.message.clone(),
                        severity: issue.severity,
                    });
                } else {
                    warnings.push(format!("[{phase_id}] {}: {}", issue.code, issue.message));
                }
            }
        }

        let mut result = WorkflowResult {
            session_id: context.session_id.clone(),
            status: WorkflowStatus::Completed,
            plan_id: plan.id.clone(),
            execution_order: order.iter().map(|p| p.id.clone()).collect(),
            per_phase_results: ledger.results,
            overall_metrics,
            risk_assessment,
            risk_mitigation_score: 0.0,
            errors,
            warnings,
            state_transitions: Vec::new(),
            timestamp: chrono::Utc::now(),
        };
        result.risk_mitigation_score = self.risk_assessor.calculate_risk_mitigation_score(&result);
        debug!(
            session_id = %result.session_id,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Completed result assembled"
        );
        result
    }
}

/// First prerequisite of `phase` that has not completed in this run
fn unmet_prerequisite<'a>(phase: &'a Phase, completed: &HashSet<String>) -> Option<&'a str> {
    phase
        .prerequisites
        .iter()
        .map(String::as_str)
        .find(|p| *p != BOOTSTRAP_PHASE && !completed.contains(*p))
}

/// A completed result must not carry a CRITICAL issue
fn check_completion_invariant(result: &WorkflowResult) -> Result<()> {
    if result.status != WorkflowStatus::Completed {
        return Err(OrchestratorError::CompletionInvariantError(format!(
            "status is {} after all phases succeeded",
            result.status
        )));
    }
    if let Some(critical) = result
        .errors
        .iter()
        .find(|e| e.severity == IssueSeverity::Critical)
    {
        return Err(OrchestratorError::CompletionInvariantError(format!(
            "critical issue {} reported by phase {}: {}",
            critical.code,
            critical.phase_id.as_deref().unwrap_or("unknown"),
            critical.message
        )));
    }
    Ok(())
}
