//! Standard node library
//!
//! Built-in nodes: workflow entry and exit, text rendering, and the
//! loop/iteration markers that bound construct bodies.

mod answer;
pub mod condition;
mod end;
mod iteration;
mod loop_markers;
mod start;
mod template_transform;

pub use answer::{AnswerNode, AnswerNodeData, AnswerNodeFactory};
pub use condition::{evaluate_conditions, ComparisonOperator, Condition, LogicalOperator};
pub use end::{EndNode, EndNodeData, EndNodeFactory};
pub use iteration::{IterationStartNode, IterationStartNodeFactory};
pub use loop_markers::{
    LoopEndNode, LoopEndNodeData, LoopEndNodeFactory, LoopStartNode, LoopStartNodeFactory,
};
pub use start::{StartNode, StartNodeData, StartNodeFactory, StartVariable};
pub use template_transform::{
    TemplateTransformNode, TemplateTransformNodeData, TemplateTransformNodeFactory,
    MAX_OUTPUT_LENGTH,
};

use graphcore::{RegistryError, VariableSelector};
use graphruntime::{NodeRegistry, RegistryBuilder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Binds a local name to a pool variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableMapping {
    pub variable: String,
    pub value_selector: VariableSelector,
}

impl VariableMapping {
    pub fn new(variable: impl Into<String>, value_selector: impl Into<VariableSelector>) -> Self {
        Self {
            variable: variable.into(),
            value_selector: value_selector.into(),
        }
    }
}

/// Register all standard nodes with a registry builder
pub fn register_all(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .register(Arc::new(StartNodeFactory))?
        .register(Arc::new(EndNodeFactory))?
        .register(Arc::new(AnswerNodeFactory))?
        .register(Arc::new(TemplateTransformNodeFactory))?
        .register(Arc::new(IterationStartNodeFactory))?
        .register(Arc::new(LoopStartNodeFactory))?
        .register(Arc::new(LoopEndNodeFactory))?;
    Ok(())
}

/// Process-wide registry of the standard nodes, built once on first use.
pub fn builtin_registry() -> Result<Arc<NodeRegistry>, RegistryError> {
    static REGISTRY: OnceLock<Result<Arc<NodeRegistry>, RegistryError>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            let mut builder = NodeRegistry::builder();
            register_all(&mut builder)?;
            Ok(Arc::new(builder.build()))
        })
        .clone()
}
