use crate::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a tree is being executed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TreeEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        root_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    ExecutionCompleted {
        execution_id: ExecutionId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        execution_id: ExecutionId,
        node_id: NodeId,
        plugin_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeCompleted {
        execution_id: ExecutionId,
        node_id: NodeId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        execution_id: ExecutionId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl TreeEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            TreeEvent::ExecutionStarted { execution_id, .. }
            | TreeEvent::ExecutionCompleted { execution_id, .. }
            | TreeEvent::NodeStarted { execution_id, .. }
            | TreeEvent::NodeCompleted { execution_id, .. }
            | TreeEvent::NodeFailed { execution_id, .. } => *execution_id,
        }
    }
}

/// Broadcast bus for tree execution events.
///
/// Cloning shares the underlying channel. Sending never blocks and does not
/// need a running tokio runtime.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TreeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: TreeEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
