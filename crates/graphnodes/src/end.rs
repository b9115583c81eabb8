use crate::VariableMapping;
use async_trait::async_trait;
use graphcore::{Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType};
use graphruntime::{NodeFactory, NodeMetadata};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndNodeData {
    #[serde(default)]
    pub outputs: Vec<VariableMapping>,
}

/// Gathers the workflow's outputs from the pool.
pub struct EndNode {
    id: String,
    title: String,
    data: EndNodeData,
}

#[async_trait]
impl Node for EndNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let mut result = NodeRunResult::succeeded();
        for mapping in &self.data.outputs {
            match ctx.require_variable(&mapping.value_selector) {
                Ok(segment) => {
                    let value = segment.into_value();
                    result = result
                        .with_input(&mapping.variable, value.clone())
                        .with_output(&mapping.variable, value);
                }
                Err(e) => return Ok(NodeRunResult::failed(e.to_string()).with_inputs(result.inputs)),
            }
        }
        Ok(result)
    }
}

pub struct EndNodeFactory;

impl NodeFactory for EndNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(EndNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
            data: spec.decode_data()?,
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Collects workflow outputs".to_string(),
            category: "control".to_string(),
        }
    }
}
