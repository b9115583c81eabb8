use crate::NodeType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = String;

/// Version sentinel resolved by the registry to the preferred implementation.
pub const LATEST_VERSION: &str = "latest";

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub graph: Graph,
    /// Seeded under `env.*` at the start of every run.
    #[serde(default)]
    pub environment_variables: HashMap<String, Value>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            graph: Graph::default(),
            environment_variables: HashMap::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        self.graph.add_node(node)
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.graph.connect(source, target);
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.graph.find_node(id)
    }
}

/// Nodes plus the dependency edges between them. Loop and iteration
/// containers carry a nested `Graph` as their body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges.push(Edge {
            source: source.into(),
            target: target.into(),
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Sources of the edges leading into `id`, in edge declaration order.
    pub fn predecessors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.target == id)
            .map(|e| &e.source)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}

/// Node specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Type-specific configuration, decoded by the node's factory.
    #[serde(default = "empty_data")]
    pub data: Value,
}

fn default_version() -> String {
    LATEST_VERSION.to_string()
}

fn empty_data() -> Value {
    Value::Object(Default::default())
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            version: default_version(),
            title: None,
            data: empty_data(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Display title, falling back to the node id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Decode `data` into the node type's configuration struct.
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::NodeError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            crate::NodeError::Configuration(format!(
                "invalid data for {} node '{}': {}",
                self.node_type, self.id, e
            ))
        })
    }
}

/// Dependency edge: `target` runs after `source` completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Per-workflow execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub node_timeout_ms: Option<u64>,
    #[serde(default)]
    pub on_error: ErrorHandling,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            node_timeout_ms: None,
            on_error: ErrorHandling::StopWorkflow,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    #[default]
    StopWorkflow,
    ContinueOnError,
}
