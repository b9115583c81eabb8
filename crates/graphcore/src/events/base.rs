use crate::{NodeId, NodeType, WorkflowNodeExecutionStatus, WorkflowRunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    WorkflowStarted {
        workflow_run_id: WorkflowRunId,
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        workflow_run_id: WorkflowRunId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        workflow_run_id: WorkflowRunId,
        node_id: NodeId,
        node_type: NodeType,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFinished {
        workflow_run_id: WorkflowRunId,
        node_id: NodeId,
        status: WorkflowNodeExecutionStatus,
        outputs: HashMap<String, Value>,
        error: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    CycleStarted {
        workflow_run_id: WorkflowRunId,
        construct_id: NodeId,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    CycleCompleted {
        workflow_run_id: WorkflowRunId,
        construct_id: NodeId,
        index: usize,
        should_continue: bool,
        timestamp: DateTime<Utc>,
    },
    NodeEvent {
        workflow_run_id: WorkflowRunId,
        node_id: NodeId,
        event: NodeEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Events specific to node execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum NodeEvent {
    Info { message: String },
    Warning { message: String },
}

/// Event emitter for nodes to send real-time updates
#[derive(Clone)]
pub struct EventEmitter {
    workflow_run_id: WorkflowRunId,
    node_id: NodeId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(
        workflow_run_id: WorkflowRunId,
        node_id: NodeId,
        sender: broadcast::Sender<ExecutionEvent>,
    ) -> Self {
        Self {
            workflow_run_id,
            node_id,
            sender,
        }
    }

    /// Emit a node-specific event
    pub fn emit(&self, event: NodeEvent) {
        let _ = self.sender.send(ExecutionEvent::NodeEvent {
            workflow_run_id: self.workflow_run_id,
            node_id: self.node_id.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    /// Emit info message
    pub fn info(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Info {
            message: message.into(),
        });
    }

    /// Emit warning message
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NodeEvent::Warning {
            message: message.into(),
        });
    }
}

/// Broadcast bus for execution events. Sending never blocks; events are
/// dropped when nobody is subscribed.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, workflow_run_id: WorkflowRunId, node_id: NodeId) -> EventEmitter {
        EventEmitter::new(workflow_run_id, node_id, self.sender.clone())
    }
}
