// Phase lifecycle events broadcast to in-process observers.
// Tests subscribe to drive assertions; the HTTP layer stays poll based.

use crate::models::{OverallStatus, Phase, PhaseStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One lifecycle notification for a session's phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEvent {
    pub chat_id: String,
    pub phase: Phase,
    pub status: PhaseStatus,
    pub overall_status: OverallStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct PhaseEventBroadcaster {
    tx: broadcast::Sender<PhaseEvent>,
}

impl PhaseEventBroadcaster {
    /// Channel capacity of 256 events; slow subscribers lag, never block
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Send errors (no receivers) are ignored
    pub fn broadcast(&self, event: PhaseEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.tx.subscribe()
    }
}

impl Default for PhaseEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let broadcaster = PhaseEventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast(PhaseEvent {
            chat_id: "abc".to_string(),
            phase: Phase::Enhance,
            status: PhaseStatus::Completed,
            overall_status: OverallStatus::Processing,
            progress: 10,
            error: None,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.chat_id, "abc");
        assert_eq!(event.phase, Phase::Enhance);
        assert_eq!(event.status, PhaseStatus::Completed);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_ok() {
        let broadcaster = PhaseEventBroadcaster::new();
        broadcaster.broadcast(PhaseEvent {
            chat_id: "abc".to_string(),
            phase: Phase::Search,
            status: PhaseStatus::Failed,
            overall_status: OverallStatus::Failed,
            progress: 15,
            error: Some("boom".to_string()),
        });
    }
}
