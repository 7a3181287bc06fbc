use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress after a phase finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub session_id: String,
    pub phase_name: String,
    /// Within `[0, 100]`; 100 only once every phase has completed
    pub percent_complete: f64,
}

impl ProgressUpdate {
    pub fn new(session_id: &str, phase_name: &str, completed: usize, total: usize) -> Self {
        let percent_complete = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            session_id: session_id.to_string(),
            phase_name: phase_name.to_string(),
            percent_complete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStartedEvent {
    pub session_id: String,
    pub phase_id: String,
    pub phase_name: String,
    /// 1-based position in the execution order
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEvent {
    pub session_id: String,
    pub sequence: u32,
    pub completed_phases: Vec<String>,
    pub taken_at: DateTime<Utc>,
}

/// Everything a sink can observe, for consumers that want one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    PhaseStarted(PhaseStartedEvent),
    Progress(ProgressUpdate),
    Checkpoint(CheckpointEvent),
}

impl WorkflowEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::PhaseStarted(e) => &e.session_id,
            Self::Progress(e) => &e.session_id,
            Self::Checkpoint(e) => &e.session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_complete() {
        assert_eq!(ProgressUpdate::new("s", "p", 1, 4).percent_complete, 25.0);
        assert_eq!(ProgressUpdate::new("s", "p", 4, 4).percent_complete, 100.0);
        assert_eq!(ProgressUpdate::new("s", "p", 0, 0).percent_complete, 0.0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = WorkflowEvent::Progress(ProgressUpdate::new("s", "Verification", 1, 1));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent_complete"], 100.0);
    }
}
