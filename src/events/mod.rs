//! # Workflow Events
//!
//! Progress, phase-start, and checkpoint notifications pushed to a
//! [`ProgressSink`] while a workflow runs.

pub mod publisher;
pub mod types;

pub use publisher::{ChannelProgressSink, LoggingProgressSink, NoopProgressSink, ProgressSink};
pub use types::{CheckpointEvent, PhaseStartedEvent, ProgressUpdate, WorkflowEvent};
