use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::states::WorkflowState;
use crate::error::{OrchestratorError, Result};

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
}

/// In-memory state machine for one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    session_id: String,
    current: WorkflowState,
    history: Vec<StateTransition>,
}

impl WorkflowStateMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current: WorkflowState::Created,
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> WorkflowState {
        self.current
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Attempt to move to `target`, rejecting illegal transitions
    pub fn transition(&mut self, target: WorkflowState) -> Result<WorkflowState> {
        if !self.current.can_transition_to(target) {
            return Err(OrchestratorError::StateTransitionError {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }

        debug!(
            session_id = %self.session_id,
            from = %self.current,
            to = %target,
            "Workflow state transition"
        );

        self.history.push(StateTransition {
            from: self.current,
            to: target,
            at: Utc::now(),
        });
        self.current = target;
        Ok(target)
    }

    /// Move to `Failed` unless the run already reached a terminal state
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            // Non-terminal -> Failed is always legal
            let _ = self.transition(WorkflowState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_history() {
        let mut machine = WorkflowStateMachine::new("session-1");
        machine.transition(WorkflowState::Validating).unwrap();
        machine.transition(WorkflowState::Planning).unwrap();

        assert_eq!(machine.current_state(), WorkflowState::Planning);
        assert_eq!(machine.history().len(), 2);
        assert_eq!(machine.history()[0].from, WorkflowState::Created);
        assert_eq!(machine.history()[1].to, WorkflowState::Planning);
    }

    #[test]
    fn test_rejects_illegal_transition() {
        let mut machine = WorkflowStateMachine::new("session-2");
        let err = machine.transition(WorkflowState::Executing).unwrap_err();
        assert_eq!(err.code(), "STATE_TRANSITION_ERROR");
        assert_eq!(machine.current_state(), WorkflowState::Created);
    }

    #[test]
    fn test_fail_is_idempotent_after_terminal() {
        let mut machine = WorkflowStateMachine::new("session-3");
        machine.fail();
        machine.fail();
        assert_eq!(machine.current_state(), WorkflowState::Failed);
        assert_eq!(machine.history().len(), 1);
    }
}
