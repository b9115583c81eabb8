use async_trait::async_trait;
use graphcore::{extract_selectors, Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType};
use graphruntime::{NodeFactory, NodeMetadata};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerNodeData {
    /// Text with `{{#path#}}` references.
    pub answer: String,
}

/// Renders a text answer from pool variables.
pub struct AnswerNode {
    id: String,
    title: String,
    data: AnswerNodeData,
}

#[async_trait]
impl Node for AnswerNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Answer
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let referenced: Vec<String> = extract_selectors(&self.data.answer)
            .iter()
            .map(ToString::to_string)
            .collect();
        let result = NodeRunResult::succeeded().with_input("variables", referenced);

        match ctx.pool().render_template(&self.data.answer) {
            Ok(answer) => Ok(result.with_output("answer", answer)),
            Err(e) => Ok(NodeRunResult::failed(e.to_string()).with_inputs(result.inputs)),
        }
    }
}

pub struct AnswerNodeFactory;

impl NodeFactory for AnswerNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::Answer
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(AnswerNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
            data: spec.decode_data()?,
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Renders {{#node.var#}} references into text".to_string(),
            category: "output".to_string(),
        }
    }
}
