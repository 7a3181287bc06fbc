// Workflow run state machine
//
// Tracks a run through CREATED -> VALIDATING -> PLANNING -> RISK_ASSESSMENT ->
// EXECUTING -> COMPLETING -> {COMPLETED | FAILED}.

pub mod states;
pub mod workflow_state_machine;

pub use states::WorkflowState;
pub use workflow_state_machine::{StateTransition, WorkflowStateMachine};
