use crate::VariableMapping;
use async_trait::async_trait;
use graphcore::{
    replace_markers, Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType, Segment,
    VariableResolutionError, VariableSelector,
};
use graphruntime::{NodeFactory, NodeMetadata};
use minijinja::Environment;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Longest rendered output, in characters.
pub const MAX_OUTPUT_LENGTH: usize = 400_000;

const MARKER_PREFIX: &str = "__ref_";

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateTransformNodeData {
    #[serde(default)]
    pub variables: Vec<VariableMapping>,
    /// Jinja template over the declared variable names. `{{#path#}}` markers
    /// name a declared variable or a pool path and render as its text.
    pub template: String,
}

/// Renders a Jinja template over declared pool variables.
pub struct TemplateTransformNode {
    id: String,
    title: String,
    data: TemplateTransformNodeData,
}

impl TemplateTransformNode {
    fn render(template: &str, variables: &HashMap<String, Value>) -> Result<String, String> {
        let mut env = Environment::new();
        env.add_template("tpl", template)
            .map_err(|e| format!("Template parse error: {}", e))?;
        let tmpl = env
            .get_template("tpl")
            .map_err(|e| format!("Template not found: {}", e))?;
        tmpl.render(minijinja::Value::from_serialize(variables))
            .map_err(|e| format!("Template render error: {}", e))
    }
}

#[async_trait]
impl Node for TemplateTransformNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::TemplateTransform
    }

    fn version(&self) -> &str {
        "1"
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn run(&self, ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        let mut variables = HashMap::new();
        let mut scope: HashMap<VariableSelector, Segment> = HashMap::new();
        for mapping in &self.data.variables {
            match ctx.require_variable(&mapping.value_selector) {
                Ok(segment) => {
                    variables.insert(mapping.variable.clone(), segment.value().clone());
                    scope.insert(VariableSelector::new([mapping.variable.as_str()]), segment);
                }
                Err(e) => return Ok(NodeRunResult::failed(e.to_string()).with_inputs(variables)),
            }
        }

        // Each marker becomes a generated Jinja variable, so pool text is
        // bound as data and never parsed as template source.
        let mut context: HashMap<String, Value> = variables.clone();
        let mut bound = 0usize;
        let template = replace_markers(&self.data.template, |selector| {
            let segment = ctx.pool().require_in_scope(selector, &scope)?;
            let name = format!("{}{}", MARKER_PREFIX, bound);
            bound += 1;
            context.insert(name.clone(), Value::String(segment.text()));
            Ok::<_, VariableResolutionError>(format!("{{{{ {} }}}}", name))
        });
        let template = match template {
            Ok(template) => template,
            Err(e) => return Ok(NodeRunResult::failed(e.to_string()).with_inputs(variables)),
        };
        let output = match Self::render(&template, &context) {
            Ok(output) => output,
            Err(e) => return Ok(NodeRunResult::failed(e).with_inputs(variables)),
        };
        if output.chars().count() > MAX_OUTPUT_LENGTH {
            return Ok(NodeRunResult::failed(format!(
                "Output length exceeds {} characters",
                MAX_OUTPUT_LENGTH
            ))
            .with_inputs(variables));
        }

        Ok(NodeRunResult::succeeded()
            .with_inputs(variables)
            .with_output("output", output))
    }
}

pub struct TemplateTransformNodeFactory;

impl NodeFactory for TemplateTransformNodeFactory {
    fn node_type(&self) -> NodeType {
        NodeType::TemplateTransform
    }

    fn version(&self) -> &str {
        "1"
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TemplateTransformNode {
            id: spec.id.clone(),
            title: spec.display_title().to_string(),
            data: spec.decode_data()?,
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Render a Jinja template over workflow variables".to_string(),
            category: "transform".to_string(),
        }
    }
}
