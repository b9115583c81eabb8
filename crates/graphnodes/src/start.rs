use async_trait::async_trait;
use graphcore::{Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType, VariableSelector};
use graphruntime::{NodeFactory, NodeMetadata};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartNodeData {
    #[serde(default)]
    pub variables: Vec<StartVariable>,
}

/// A declared workflow input.
#[derive(Debug, Clone, Deserialize)]
pub struct StartVariable {
    pub variable: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

/// Entry node. The executor seeds run inputs under this node's id; the node
/// checks the declared ones and applies defaults.
pub struct StartNode {
    id: String,
    title: String,
    data: StartNodeData,
}

#[async_trait]
impl Node for StartNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let mut result = NodeRunResult::succeeded();
        for (name, segment) in ctx.pool().node_variables(&self.id) {
            result = result.with_input(name, segment.into_value());
        }

        for declared in &self.data.variables {
            let selector = VariableSelector::new([self.id.as_str(), declared.variable.as_str()]);
            match (ctx.pool().get(&selector), &declared.default) {
                (Some(segment), _) if !segment.is_none() => {
                    result = result.with_output(&declared.variable, segment.into_value());
                }
                (_, Some(default)) => {
                    result = result.with_output(&declared.variable, default.clone());
                }
                _ if declared.required => {
                    return Ok(NodeRunResult::failed(format!(
                        "Missing required input: {}",
                        declared.variable
                    ))
                    .with_inputs(result.inputs));
                }
                _ => {}
            }
        }

        // Undeclared inputs pass through unchanged.
        for (name, value) in result.inputs.clone() {
            result.outputs.entry(name).or_insert(value);
        }
        Ok(result)
    }
}

pub struct StartNodeFactory;

impl NodeFactory for StartNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(StartNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
            data: spec.decode_data()?,
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Workflow entry point; validates run inputs".to_string(),
            category: "control".to_string(),
        }
    }
}
