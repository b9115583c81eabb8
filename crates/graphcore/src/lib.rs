//! Core abstractions for the graph workflow engine
//!
//! Typed values, the per-run variable pool, the node contract, loop and
//! iteration construct state, and the execution-history repository
//! contract. Everything else in the workspace builds on these types.

mod construct;
mod error;
pub mod events;
mod execution;
mod node;
mod pool;
mod repository;
mod segment;
mod selector;
mod serializer;
mod template;
mod workflow;

pub use construct::{ConstructPhase, ConstructState, IterationNodeData, LoopNodeData};
pub use error::{
    ConstructError, FlowError, MissingValueTypeError, NodeError, RegistryError, RepositoryError,
    SegmentError, VariableResolutionError, WorkflowError,
};
pub use events::*;
pub use execution::{
    ExecutionMetadata, NodeRunResult, WorkflowNodeExecution, WorkflowNodeExecutionStatus,
    WorkflowRunId,
};
pub use node::{Node, NodeContext, NodeType};
pub use pool::{VariablePool, ENVIRONMENT_NAMESPACE, SYSTEM_NAMESPACE};
pub use repository::{OrderConfig, OrderDirection, OrderField, WorkflowNodeExecutionRepository};
pub use segment::{Segment, SegmentType, FILE_IDENTITY, FILE_IDENTITY_KEY};
pub use selector::VariableSelector;
pub use serializer::{serialize_value_type, ValueTypeSource};
pub use template::{extract_selectors, replace_markers};
pub use workflow::{
    Edge, ErrorHandling, Graph, NodeId, NodeSpec, Workflow, WorkflowId, WorkflowSettings,
    LATEST_VERSION,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
