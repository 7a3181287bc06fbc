use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Run accepted, nothing checked yet
    #[default]
    Created,
    /// Params and system prerequisites are being checked
    Validating,
    /// Building and validating the execution plan
    Planning,
    /// Scoring workflow risk
    RiskAssessment,
    /// Running phases in plan order
    Executing,
    /// Assembling the final result
    Completing,
    Completed,
    Failed,
}

impl WorkflowState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> target` is a legal transition.
    ///
    /// The forward chain is fixed; any non-terminal state may fail.
    pub fn can_transition_to(&self, target: WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, target) {
            (from, Failed) => !from.is_terminal(),
            (Created, Validating)
            | (Validating, Planning)
            | (Planning, RiskAssessment)
            | (RiskAssessment, Executing)
            | (Executing, Completing)
            | (Completing, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Validating => write!(f, "validating"),
            Self::Planning => write!(f, "planning"),
            Self::RiskAssessment => write!(f, "risk_assessment"),
            Self::Executing => write!(f, "executing"),
            Self::Completing => write!(f, "completing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "validating" => Ok(Self::Validating),
            "planning" => Ok(Self::Planning),
            "risk_assessment" => Ok(Self::RiskAssessment),
            "executing" => Ok(Self::Executing),
            "completing" => Ok(Self::Completing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid workflow state: {s}")),
        }
    }
}
