use crate::{
    events::EventEmitter, ConstructState, NodeError, NodeId, NodeRunResult, Segment,
    VariablePool, VariableResolutionError, VariableSelector, WorkflowRunId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Closed set of node types the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Start,
    End,
    Answer,
    TemplateTransform,
    Iteration,
    IterationStart,
    Loop,
    LoopStart,
    LoopEnd,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Answer => "answer",
            NodeType::TemplateTransform => "template-transform",
            NodeType::Iteration => "iteration",
            NodeType::IterationStart => "iteration-start",
            NodeType::Loop => "loop",
            NodeType::LoopStart => "loop-start",
            NodeType::LoopEnd => "loop-end",
        }
    }

    /// Containers whose body graph is driven by the executor.
    pub fn is_container(self) -> bool {
        matches!(self, NodeType::Iteration | NodeType::Loop)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Id of the graph node this instance was built for
    fn node_id(&self) -> &str;

    fn node_type(&self) -> NodeType;

    /// Opaque version identifier of the implementation
    fn version(&self) -> &str;

    fn title(&self) -> &str {
        self.node_id()
    }

    /// Execute the node against the run's variable pool.
    ///
    /// Expected failures (missing variables, bad values) come back as a
    /// failed `NodeRunResult`. `Err` is for contract violations only and
    /// aborts the run.
    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError>;
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    pub workflow_run_id: WorkflowRunId,

    /// Shared variables of the run. Nodes read from it; the executor writes
    /// their outputs back.
    pub pool: Arc<VariablePool>,

    /// State of the enclosing loop/iteration, handed only to that construct's
    /// marker nodes.
    pub construct: Option<Arc<RwLock<ConstructState>>>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl NodeContext {
    pub fn new(
        node_id: impl Into<NodeId>,
        workflow_run_id: WorkflowRunId,
        pool: Arc<VariablePool>,
        events: EventEmitter,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            workflow_run_id,
            pool,
            construct: None,
            events,
        }
    }

    pub fn with_construct(mut self, construct: Arc<RwLock<ConstructState>>) -> Self {
        self.construct = Some(construct);
        self
    }

    pub fn pool(&self) -> &VariablePool {
        &self.pool
    }

    /// Resolve a declared selector or report which path is missing.
    pub fn require_variable(
        &self,
        selector: &VariableSelector,
    ) -> Result<Segment, VariableResolutionError> {
        self.pool.require(selector)
    }

    pub fn construct_state(&self) -> Result<&Arc<RwLock<ConstructState>>, NodeError> {
        self.construct
            .as_ref()
            .ok_or_else(|| NodeError::MissingConstructState {
                node_id: self.node_id.clone(),
            })
    }
}
