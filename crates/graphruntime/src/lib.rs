//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflow graphs, the versioned
//! node registry, and an in-memory execution-history repository.

mod executor;
mod memory_repository;
mod registry;
mod runtime;

pub use executor::{ExecutionResult, WorkflowExecutor};
pub use memory_repository::InMemoryExecutionRepository;
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry, RegistryBuilder};
pub use runtime::{GraphRuntime, RuntimeConfig};
