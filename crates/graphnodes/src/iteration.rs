use async_trait::async_trait;
use graphcore::{Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType};
use graphruntime::{NodeFactory, NodeMetadata};

/// Entry marker of an iteration body. The executor supplies the item and
/// index; this node only lets the cycle proceed.
pub struct IterationStartNode {
    id: String,
    title: String,
}

#[async_trait]
impl Node for IterationStartNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::IterationStart
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
            let state = state.read().await;
            result = result.with_output("index", state.index);
            if let Some(item) = &state.item {
                result = result.with_output("item", item.value().clone());
            }
        }
        Ok(result)
    }
}

pub struct IterationStartNodeFactory;

impl NodeFactory for IterationStartNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::IterationStart
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(IterationStartNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Marks the entry of an iteration body".to_string(),
            category: "control".to_string(),
        }
    }
}
