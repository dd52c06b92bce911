use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::graph::{NodeId, NodeResult};

/// A single progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RunEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEventKind {
    #[serde(rename_all = "camelCase")]
    RunStarted {
        scope: Vec<NodeId>,
        target: Option<NodeId>,
    },

    #[serde(rename_all = "camelCase")]
    NodeStarted { node_id: NodeId },

    /// The node's stored result was reused instead of executing it.
    #[serde(rename_all = "camelCase")]
    NodeReused { node_id: NodeId, result: NodeResult },

    /// Partial output of a node that produces several artifacts in turn.
    /// Observational only; the node's final result arrives with `NodeCompleted`.
    #[serde(rename_all = "camelCase")]
    NodeProgress {
        node_id: NodeId,
        partial: NodeResult,
        completed: usize,
        total: usize,
    },

    #[serde(rename_all = "camelCase")]
    NodeCompleted { node_id: NodeId, result: NodeResult },

    #[serde(rename_all = "camelCase")]
    NodeFailed { node_id: NodeId, error: String },

    #[serde(rename_all = "camelCase")]
    RunFinished {
        completed: Vec<NodeId>,
        reused: Vec<NodeId>,
        error: Option<String>,
    },
}

impl RunEventKind {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunEventKind::NodeStarted { node_id }
            | RunEventKind::NodeReused { node_id, .. }
            | RunEventKind::NodeProgress { node_id, .. }
            | RunEventKind::NodeCompleted { node_id, .. }
            | RunEventKind::NodeFailed { node_id, .. } => Some(node_id),
            RunEventKind::RunStarted { .. } | RunEventKind::RunFinished { .. } => None,
        }
    }
}

/// Consumer of run events (a UI layer, a log, a test).
pub trait RunObserver: Send + Sync {
    fn record(&self, event: RunEvent);
    fn flush(&self) {}
}

/// Drops every event.
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn record(&self, _event: RunEvent) {}
}

/// Simple in-memory collector for events.
#[derive(Default)]
pub struct MemoryObserver {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Just the event kinds, in order.
    pub fn kinds(&self) -> Vec<RunEventKind> {
        self.get_events().into_iter().map(|event| event.kind).collect()
    }
}

impl RunObserver for MemoryObserver {
    fn record(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Forwards events over a tokio channel, e.g. to a UI task.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RunObserver for ChannelObserver {
    fn record(&self, event: RunEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Run event receiver dropped; event discarded.");
        }
    }
}

/// Stamps events with the run id and the current time.
#[derive(Clone, Copy)]
pub struct EventEmitter<'a> {
    run_id: Uuid,
    observer: &'a dyn RunObserver,
}

impl<'a> EventEmitter<'a> {
    pub fn new(run_id: Uuid, observer: &'a dyn RunObserver) -> Self {
        Self { run_id, observer }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn emit(&self, kind: RunEventKind) {
        self.observer.record(RunEvent {
            run_id: self.run_id,
            timestamp: Utc::now(),
            kind,
        });
    }

    pub fn flush(&self) {
        self.observer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_observer_collects_in_order() {
        let observer = MemoryObserver::new();
        let emitter = EventEmitter::new(Uuid::new_v4(), &observer);
        emitter.emit(RunEventKind::NodeStarted { node_id: "a".into() });
        emitter.emit(RunEventKind::NodeCompleted {
            node_id: "a".into(),
            result: NodeResult::Text("hi".into()),
        });

        let kinds = observer.kinds();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].node_id(), Some("a"));
        assert!(matches!(kinds[1], RunEventKind::NodeCompleted { .. }));
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (observer, mut receiver) = ChannelObserver::new();
        let run_id = Uuid::new_v4();
        EventEmitter::new(run_id, &observer).emit(RunEventKind::NodeStarted { node_id: "x".into() });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.run_id, run_id);
        assert_eq!(event.kind.node_id(), Some("x"));
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = RunEvent {
            run_id: Uuid::nil(),
            timestamp: Utc::now(),
            kind: RunEventKind::NodeCompleted {
                node_id: "gen".into(),
                result: NodeResult::Image(vec!["a.png".into()]),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("nodeCompleted"));
        assert_eq!(value["nodeId"], json!("gen"));
        assert_eq!(value["result"]["resultType"], json!("image"));
        assert_eq!(value["result"]["value"], json!(["a.png"]));
    }
}
