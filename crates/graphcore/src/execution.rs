use crate::{NodeId, NodeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowRunId = Uuid;

/// Status of a single node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNodeExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Exception,
    Stopped,
    Paused,
    Retry,
}

impl WorkflowNodeExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Exception | Self::Stopped
        )
    }
}

/// What a node's `run` hands back to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRunResult {
    pub status: WorkflowNodeExecutionStatus,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRunResult {
    pub fn succeeded() -> Self {
        Self {
            status: WorkflowNodeExecutionStatus::Succeeded,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: WorkflowNodeExecutionStatus::Failed,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == WorkflowNodeExecutionStatus::Succeeded
    }
}

/// Placement of an execution inside a loop or iteration construct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_index: Option<usize>,
}

/// Immutable record of one node run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNodeExecution {
    pub id: Uuid,
    pub workflow_run_id: WorkflowRunId,
    /// Monotonic within a run; allocated when the node starts.
    pub sequence: u64,
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub node_version: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_node_id: Option<NodeId>,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub status: WorkflowNodeExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: ExecutionMetadata,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}
