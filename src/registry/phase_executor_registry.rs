//! # Phase Executor Registry
//!
//! Maps phase ids to the [`PhaseExecutor`] that performs the phase. The
//! orchestrator resolves executors here just before each phase runs; a planned
//! phase with no executor fails with `EXECUTOR_NOT_REGISTERED`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::orchestration::phase_runtime::PhaseRuntime;
use crate::orchestration::types::{Phase, PhaseOutput, WorkflowContext};

/// Performs one phase of a workflow.
///
/// Executors receive the shared, read-only context and a [`PhaseRuntime`] for
/// running bounded, cached sub-operations. Returning `Err` fails the phase and
/// halts the workflow.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(
        &self,
        phase: &Phase,
        context: Arc<WorkflowContext>,
        runtime: &PhaseRuntime,
    ) -> Result<PhaseOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_executors: usize,
    pub phase_ids: Vec<String>,
}

#[derive(Default)]
pub struct PhaseExecutorRegistry {
    executors: DashMap<String, Arc<dyn PhaseExecutor>>,
}

impl std::fmt::Debug for PhaseExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseExecutorRegistry")
            .field("phase_ids", &self.registered_ids())
            .finish()
    }
}

impl PhaseExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `phase_id`, replacing any earlier registration
    pub fn register(&self, phase_id: &str, executor: Arc<dyn PhaseExecutor>) {
        if self.executors.insert(phase_id.to_string(), executor).is_some() {
            warn!(phase_id, "Replaced existing phase executor");
        } else {
            debug!(phase_id, "Phase executor registered");
        }
    }

    pub fn unregister(&self, phase_id: &str) -> bool {
        self.executors.remove(phase_id).is_some()
    }

    pub fn get(&self, phase_id: &str) -> Option<Arc<dyn PhaseExecutor>> {
        self.executors.get(phase_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, phase_id: &str) -> bool {
        self.executors.contains_key(phase_id)
    }

    /// Registered phase ids, sorted
    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.executors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> RegistryStats {
        let phase_ids = self.registered_ids();
        RegistryStats {
            total_executors: phase_ids.len(),
            phase_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl PhaseExecutor for Echo {
        async fn execute(
            &self,
            phase: &Phase,
            _context: Arc<WorkflowContext>,
            _runtime: &PhaseRuntime,
        ) -> Result<PhaseOutput> {
            Ok(PhaseOutput::new(json!({ "phase": phase.id })))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PhaseExecutorRegistry::new();
        registry.register("verification", Arc::new(Echo));
        registry.register("type-fixing", Arc::new(Echo));

        assert!(registry.contains("verification"));
        assert!(registry.get("import-rewriting").is_none());
        assert_eq!(
            registry.stats(),
            RegistryStats {
                total_executors: 2,
                phase_ids: vec!["type-fixing".to_string(), "verification".to_string()],
            }
        );
    }

    #[test]
    fn test_unregister() {
        let registry = PhaseExecutorRegistry::new();
        registry.register("verification", Arc::new(Echo));
        assert!(registry.unregister("verification"));
        assert!(!registry.unregister("verification"));
        assert!(registry.registered_ids().is_empty());
    }
}
