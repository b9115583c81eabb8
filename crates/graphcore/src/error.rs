use crate::{NodeType, VariableSelector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Construct error: {0}")]
    Construct(#[from] ConstructError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors a node raises for contract violations. Expected domain failures are
/// reported as a failed `NodeRunResult` instead.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Contract violation in node {node_id}: {message}")]
    ContractViolation { node_id: String, message: String },

    #[error("Node {node_id} is missing its construct state")]
    MissingConstructState { node_id: String },

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(NodeType),

    #[error("Unknown version '{version}' for node type {node_type}")]
    UnknownNodeVersion { node_type: NodeType, version: String },

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Node type {node_type} version '{version}' is registered twice")]
    DuplicateRegistration { node_type: NodeType, version: String },

    #[error("Node type {node_type} has more than one version flagged as latest ('{first}', '{second}')")]
    DuplicateLatest {
        node_type: NodeType,
        first: String,
        second: String,
    },

    #[error("Version '{0}' is reserved")]
    ReservedVersion(String),
}

#[derive(Error, Debug, Clone)]
pub enum RepositoryError {
    #[error("Execution record {0} already saved")]
    Duplicate(uuid::Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// A `{{#path#}}` marker or declared selector that has no value in the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Variable {selector} not found")]
pub struct VariableResolutionError {
    pub selector: VariableSelector,
}

/// Raised at the serialization boundary when no `value_type` can be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value_type is required but not provided")]
pub struct MissingValueTypeError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    #[error("Value does not match segment type {expected}: got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unknown segment type: {0}")]
    UnknownType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("Cannot {action} construct in phase {phase}")]
    InvalidTransition { action: &'static str, phase: String },
}
