use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::constants::events;
use crate::events::types::{CheckpointEvent, PhaseStartedEvent, ProgressUpdate, WorkflowEvent};

/// Receives workflow progress. Calls are made from the orchestrator's control
/// flow, so implementations must return promptly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);

    fn on_phase_started(&self, _event: PhaseStartedEvent) {}

    fn on_checkpoint(&self, _event: CheckpointEvent) {}
}

/// Writes every event to the tracing log
#[derive(Debug, Clone, Default)]
pub struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn on_progress(&self, update: ProgressUpdate) {
        info!(
            session_id = %update.session_id,
            phase_name = %update.phase_name,
            percent_complete = update.percent_complete,
            "Workflow progress"
        );
    }

    fn on_phase_started(&self, event: PhaseStartedEvent) {
        debug!(
            operation = events::PHASE_STARTED,
            session_id = %event.session_id,
            phase_id = %event.phase_id,
            position = event.position,
            total = event.total,
            "Phase started"
        );
    }

    fn on_checkpoint(&self, event: CheckpointEvent) {
        info!(
            operation = events::CHECKPOINT_TAKEN,
            session_id = %event.session_id,
            sequence = event.sequence,
            completed_phases = event.completed_phases.len(),
            "Checkpoint taken"
        );
    }
}

/// Buffers events on an unbounded channel for an external consumer.
///
/// Sending never blocks. Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: WorkflowEvent) {
        // A closed receiver means nobody is listening anymore
        let _ = self.sender.send(event);
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, update: ProgressUpdate) {
        self.send(WorkflowEvent::Progress(update));
    }

    fn on_phase_started(&self, event: PhaseStartedEvent) {
        self.send(WorkflowEvent::PhaseStarted(event));
    }

    fn on_checkpoint(&self, event: CheckpointEvent) {
        self.send(WorkflowEvent::Checkpoint(event));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&self, _update: ProgressUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut receiver) = ChannelProgressSink::new();
        sink.on_phase_started(PhaseStartedEvent {
            session_id: "s".to_string(),
            phase_id: "verification".to_string(),
            phase_name: "Verification".to_string(),
            position: 1,
            total: 1,
        });
        sink.on_progress(ProgressUpdate::new("s", "Verification", 1, 1));

        assert!(matches!(receiver.recv().await, Some(WorkflowEvent::PhaseStarted(_))));
        match receiver.recv().await {
            Some(WorkflowEvent::Progress(update)) => assert_eq!(update.percent_complete, 100.0),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (sink, receiver) = ChannelProgressSink::new();
        drop(receiver);
        sink.on_progress(ProgressUpdate::new("s", "p", 1, 2));
    }
}
