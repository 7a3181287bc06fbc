//! Test doubles for phase executors, prerequisite checks, and progress sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use migrator_core::config::{OrchestratorConfig, PipelineParams};
use migrator_core::constants::{phases, RiskLevel};
use migrator_core::events::{ChannelProgressSink, WorkflowEvent};
use migrator_core::orchestration::{
    Phase, PhaseOutput, PhaseRuntime, PrerequisiteChecker, SubOperation, SubOperationError,
    SubOperationOutcome, WorkflowContext, WorkflowOrchestrator,
};
use migrator_core::registry::{PhaseExecutor, PhaseExecutorRegistry};
use migrator_core::{OrchestratorError, Result};

pub const FULL_MIGRATION: [&str; 4] = [
    phases::ERROR_RESOLUTION,
    phases::TYPE_FIXING,
    phases::IMPORT_REWRITING,
    phases::VERIFICATION,
];

/// Shared log of phase ids in invocation order
pub type InvocationLog = Arc<Mutex<Vec<String>>>;

pub fn invocation_log() -> InvocationLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records the phase it ran and returns a fixed output
pub struct RecordingExecutor {
    pub log: InvocationLog,
    pub output: PhaseOutput,
}

impl RecordingExecutor {
    pub fn new(log: InvocationLog) -> Self {
        Self {
            log,
            output: PhaseOutput::new(json!({ "status": "ok" })),
        }
    }

    pub fn with_output(mut self, output: PhaseOutput) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl PhaseExecutor for RecordingExecutor {
    async fn execute(
        &self,
        phase: &Phase,
        _context: Arc<WorkflowContext>,
        _runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        self.log.lock().push(phase.id.clone());
        Ok(self.output.clone())
    }
}

/// Records the phase, then fails it
pub struct FailingExecutor {
    pub log: InvocationLog,
    /// `Some` fails with a phase error carrying this code
    pub code: Option<String>,
}

#[async_trait]
impl PhaseExecutor for FailingExecutor {
    async fn execute(
        &self,
        phase: &Phase,
        _context: Arc<WorkflowContext>,
        _runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        self.log.lock().push(phase.id.clone());
        match &self.code {
            Some(code) => Err(OrchestratorError::phase_failed(&phase.id, "compiler rejected output", code)),
            None => Err(OrchestratorError::ValidationError("unexpected token".to_string())),
        }
    }
}

pub struct SleepingExecutor {
    pub duration: Duration,
}

#[async_trait]
impl PhaseExecutor for SleepingExecutor {
    async fn execute(
        &self,
        phase: &Phase,
        _context: Arc<WorkflowContext>,
        _runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        tokio::time::sleep(self.duration).await;
        Ok(PhaseOutput::new(json!({ "phase": phase.id })))
    }
}

/// Fans out one sub-operation per file through the runtime
pub struct BatchExecutor {
    pub files: usize,
    pub work_duration: Duration,
}

#[async_trait]
impl PhaseExecutor for BatchExecutor {
    async fn execute(
        &self,
        phase: &Phase,
        _context: Arc<WorkflowContext>,
        runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        let operations: Vec<SubOperation> = (0..self.files)
            .map(|i| SubOperation::new(format!("src/module_{i}.ts"), &format!("sha-{i}"), &[phase.id.as_str()]))
            .collect();
        let work_duration = self.work_duration;

        let results = runtime
            .run_batch(operations, move |op| async move {
                tokio::time::sleep(work_duration).await;
                Ok::<_, SubOperationError>(SubOperationOutcome::new(
                    json!({ "path": op.path }),
                    RiskLevel::Low,
                ))
            })
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            return Err(OrchestratorError::phase_failed(
                &phase.id,
                format!("{failed} files failed"),
                "BATCH_FAILED",
            ));
        }
        Ok(PhaseOutput::new(json!({ "files": results.len() })))
    }
}

/// Like [`BatchExecutor`], counting sub-operations as they start and finish
pub struct TrackedBatchExecutor {
    pub files: usize,
    pub work_duration: Duration,
    pub started: Arc<AtomicUsize>,
    pub finished: Arc<AtomicUsize>,
}

impl TrackedBatchExecutor {
    pub fn new(files: usize, work_duration: Duration) -> Self {
        Self {
            files,
            work_duration,
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl PhaseExecutor for TrackedBatchExecutor {
    async fn execute(
        &self,
        phase: &Phase,
        _context: Arc<WorkflowContext>,
        runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput> {
        let operations: Vec<SubOperation> = (0..self.files)
            .map(|i| SubOperation::new(format!("src/tracked_{i}.ts"), &format!("sha-{i}"), &[phase.id.as_str()]))
            .collect();
        let work_duration = self.work_duration;
        let (started, finished) = (self.started.clone(), self.finished.clone());

        let results = runtime
            .run_batch(operations, move |op| {
                let (started, finished) = (started.clone(), finished.clone());
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(work_duration).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, SubOperationError>(SubOperationOutcome::new(
                        json!({ "path": op.path }),
                        RiskLevel::Low,
                    ))
                }
            })
            .await;

        let skipped = results.iter().filter(|r| r.is_err()).count();
        Ok(PhaseOutput::new(json!({ "files": results.len(), "skipped": skipped })))
    }
}

/// Prerequisite checker that never touches the filesystem
pub struct StaticPrerequisiteChecker {
    pub failure: Option<String>,
    pub file_count: Option<usize>,
}

impl StaticPrerequisiteChecker {
    pub fn passing(file_count: usize) -> Self {
        Self {
            failure: None,
            file_count: Some(file_count),
        }
    }
}

#[async_trait]
impl PrerequisiteChecker for StaticPrerequisiteChecker {
    async fn check(&self, _project_root: &Path, _params: &PipelineParams) -> Result<()> {
        match &self.failure {
            Some(reason) => Err(OrchestratorError::PrerequisiteError(reason.clone())),
            None => Ok(()),
        }
    }

    async fn count_source_files(&self, _project_root: &Path) -> Result<usize> {
        self.file_count
            .ok_or_else(|| OrchestratorError::RiskAssessmentError("scan failed".to_string()))
    }
}

/// Registry with a recording executor for every full-migration phase
pub fn recording_registry(log: &InvocationLog) -> Arc<PhaseExecutorRegistry> {
    let registry = Arc::new(PhaseExecutorRegistry::new());
    for phase_id in FULL_MIGRATION {
        registry.register(phase_id, Arc::new(RecordingExecutor::new(log.clone())));
    }
    registry
}

/// Orchestrator with a static prerequisite check and a channel sink
pub fn orchestrator_with(
    config: OrchestratorConfig,
    registry: Arc<PhaseExecutorRegistry>,
    checker: StaticPrerequisiteChecker,
) -> (WorkflowOrchestrator, mpsc::UnboundedReceiver<WorkflowEvent>) {
    let (sink, receiver) = ChannelProgressSink::new();
    let orchestrator = WorkflowOrchestrator::new(config, registry)
        .expect("valid orchestrator config")
        .with_prerequisite_checker(Arc::new(checker))
        .with_progress_sink(Arc::new(sink));
    (orchestrator, receiver)
}

pub fn test_orchestrator(
    registry: Arc<PhaseExecutorRegistry>,
) -> (WorkflowOrchestrator, mpsc::UnboundedReceiver<WorkflowEvent>) {
    orchestrator_with(
        OrchestratorConfig::default(),
        registry,
        StaticPrerequisiteChecker::passing(50),
    )
}

/// Every event buffered so far
pub fn drain(receiver: &mut mpsc::UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn progress_percentages(events: &[WorkflowEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::Progress(update) => Some(update.percent_complete),
            _ => None,
        })
        .collect()
}
