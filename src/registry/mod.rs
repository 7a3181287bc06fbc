//! # Registry Infrastructure
//!
//! Lookup of the executors that perform each workflow phase.

pub mod phase_executor_registry;

pub use phase_executor_registry::{PhaseExecutor, PhaseExecutorRegistry, RegistryStats};
