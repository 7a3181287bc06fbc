//! # Orchestration Engine
//!
//! Runs a migration workflow as an ordered sequence of phases, each of which may
//! fan out into many bounded, cached sub-operations.
//!
//! ## Core Components
//!
//! - **WorkflowOrchestrator**: Drives a run through its state machine and assembles the result
//! - **PhasePlanner**: Builds the phase list and resolves a deterministic dependency order
//! - **PhaseRuntime**: Executes sub-operation batches through the limiter and cache
//! - **ConcurrencyLimiter**: FIFO-fair bound on in-flight sub-operations
//! - **ResultCache**: TTL cache keyed by content fingerprint
//! - **MetricsCollector**: Duration, risk, cache, and error aggregates
//! - **RiskAssessor**: Pre-run risk score and post-run mitigation score
//! - **PrerequisiteChecker**: System checks that satisfy the `system-check` prerequisite

pub mod concurrency_limiter;
pub mod metrics;
pub mod phase_planner;
pub mod phase_runtime;
pub mod result_cache;
pub mod risk_assessor;
pub mod system_check;
pub mod types;
pub mod workflow_orchestrator;

pub use concurrency_limiter::{ConcurrencyLimiter, LimiterPermit, QueueStats};
pub use metrics::{MetricsCollector, OperationMetricsSnapshot};
pub use phase_planner::PhasePlanner;
pub use phase_runtime::{
    BatchOptions, PhaseRuntime, SubOperation, SubOperationError, SubOperationOutcome,
    SubOperationResult,
};
pub use result_cache::{
    CacheEntry, CacheError, CacheStore, Clock, Fingerprint, ManualClock, NoOpCacheStore,
    ResultCache, SystemClock,
};
pub use risk_assessor::RiskAssessor;
pub use system_check::{FileSystemPrerequisiteChecker, PrerequisiteChecker};
pub use types::{
    ExecutionPlan, OverallMetrics, Phase, PhaseOutput, PhaseResult, ReportedIssue, RiskAssessment,
    RiskFactor, WorkflowContext, WorkflowError, WorkflowResult,
};
pub use workflow_orchestrator::WorkflowOrchestrator;
