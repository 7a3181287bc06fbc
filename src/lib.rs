#![allow(clippy::doc_markdown)] // Allow technical terms like BLAKE3, DashMap in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Migrator Core
//!
//! Bounded-concurrency, cached, multi-phase workflow orchestrator for code
//! migration pipelines.
//!
//! ## Overview
//!
//! A migration run (fix errors, fix types, rewrite imports, verify) is planned
//! as a dependency graph of phases. Phases run sequentially in a deterministic
//! topological order; inside a phase, per-file sub-operations run concurrently
//! under a FIFO-fair concurrency limiter, with results cached by content
//! fingerprint so unchanged inputs are never reprocessed.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Orchestrator, planner, limiter, cache, metrics, and risk scoring
//! - [`state_machine`] - Workflow run lifecycle
//! - [`registry`] - Phase executor lookup
//! - [`events`] - Progress and checkpoint notifications
//! - [`config`] - Layered configuration and per-run parameters
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use migrator_core::config::{OrchestratorConfig, PipelineParams};
//! use migrator_core::orchestration::{Phase, PhaseOutput, PhaseRuntime, WorkflowContext};
//! use migrator_core::orchestration::WorkflowOrchestrator;
//! use migrator_core::registry::{PhaseExecutor, PhaseExecutorRegistry};
//! use std::sync::Arc;
//!
//! struct Verify;
//!
//! #[async_trait]
//! impl PhaseExecutor for Verify {
//!     async fn execute(
//!         &self,
//!         _phase: &Phase,
//!         _context: Arc<WorkflowContext>,
//!         _runtime: &PhaseRuntime,
//!     ) -> migrator_core::Result<PhaseOutput> {
//!         Ok(PhaseOutput::default())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(PhaseExecutorRegistry::new());
//! registry.register("verification", Arc::new(Verify));
//!
//! let orchestrator = WorkflowOrchestrator::new(OrchestratorConfig::default(), registry)?;
//! let params = PipelineParams::default()
//!     .with_workflow_type(migrator_core::constants::WorkflowType::VerifyOnly);
//! let result = orchestrator.execute_workflow(params, "./my-project").await?;
//! println!("{} in {}ms", result.status, result.overall_metrics.total_duration_ms);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration, and property tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use config::{ConfigManager, OrchestratorConfig, PipelineParams};
pub use constants::{
    IssueSeverity, PhaseStatus, RiskLevel, ValidationLevel, WorkflowStatus, WorkflowType,
};
pub use error::{InvalidPlanError, OrchestratorError, Result, StructuredError};
pub use events::{ProgressSink, ProgressUpdate};
pub use orchestration::{
    ConcurrencyLimiter, MetricsCollector, PhasePlanner, ResultCache, RiskAssessor,
    WorkflowOrchestrator, WorkflowResult,
};
pub use registry::{PhaseExecutor, PhaseExecutorRegistry};
pub use state_machine::{WorkflowState, WorkflowStateMachine};
