use crate::condition::{evaluate_conditions, Condition, LogicalOperator};
use async_trait::async_trait;
use graphcore::{Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType};
use graphruntime::{NodeFactory, NodeMetadata};
use serde::Deserialize;

/// Entry marker of a loop body. Continuation is decided at the loop end.
pub struct LoopStartNode {
    id: String,
    title: String,
}

#[async_trait]
impl Node for LoopStartNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::LoopStart
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let mut result = NodeRunResult::succeeded();
        if let Some(state) = &ctx.construct {
            result = result.with_output("index", state.read().await.index);
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoopEndNodeData {
    /// Conditions under which the loop runs another cycle.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

/// Exit marker of a loop body. Evaluates the continuation conditions
/// against the pool and records the decision in the loop's state.
pub struct LoopEndNode {
    id: String,
    title: String,
    data: LoopEndNodeData,
}

impl LoopEndNode {
    pub fn new(id: impl Into<String>, data: LoopEndNodeData) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            data,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

#[async_trait]
impl Node for LoopEndNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::LoopEnd
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let state = ctx.construct_state()?;
        let conditions_met =
            evaluate_conditions(&self.data.conditions, self.data.logical_operator, ctx.pool());

        let mut state = state.write().await;
        let should_continue = conditions_met && state.has_next_cycle();
        state
            .advance(should_continue)
            .map_err(|e| NodeError::ContractViolation {
                node_id: self.id.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Loop end {} after {} cycles: conditions {}, continue {}",
            self.id,
            state.index,
            conditions_met,
            should_continue
        );
        if conditions_met && !should_continue {
            ctx.events
                .warn(format!("Loop stopped at its cycle limit after {} cycles", state.index));
        } else if !should_continue {
            ctx.events.info(format!("Loop exits after {} cycles", state.index));
        }

        Ok(NodeRunResult::succeeded()
            .with_input("conditions_met", conditions_met)
            .with_output("should_continue", should_continue)
            .with_output("index", state.index))
    }
}

pub struct LoopStartNodeFactory;

impl NodeFactory for LoopStartNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::LoopStart
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(LoopStartNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Marks the entry of a loop body".to_string(),
            category: "control".to_string(),
        }
    }
}

pub struct LoopEndNodeFactory;

impl NodeFactory for LoopEndNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::LoopEnd
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(
            LoopEndNode::new(spec.id.clone(), spec.decode_data()?).with_title(spec.display_title()),
        ))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Decides whether the loop runs another cycle".to_string(),
            category: "control".to_string(),
        }
    }
}
