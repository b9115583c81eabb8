use graphcore::{Node, NodeError, NodeSpec, NodeType, RegistryError, WorkflowError, LATEST_VERSION};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    fn node_type(&self) -> NodeType;

    /// Opaque version identifier. `"latest"` is reserved.
    fn version(&self) -> &str;

    /// Marks this version as the one `"latest"` resolves to. At most one
    /// version per node type may claim it.
    fn is_latest(&self) -> bool {
        false
    }

    /// Create a new instance of the node for one graph node of one run
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError>;

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Collects factories and rejects conflicting registrations as they arrive.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: BTreeMap<NodeType, BTreeMap<String, Arc<dyn NodeFactory>>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) -> Result<&mut Self, RegistryError> {
        let node_type = factory.node_type();
        let version = factory.version().to_string();
        if version == LATEST_VERSION {
            return Err(RegistryError::ReservedVersion(version));
        }

        let versions = self.factories.entry(node_type).or_default();
        if versions.contains_key(&version) {
            return Err(RegistryError::DuplicateRegistration { node_type, version });
        }
        if factory.is_latest() {
            if let Some((first, _)) = versions.iter().find(|(_, f)| f.is_latest()) {
                return Err(RegistryError::DuplicateLatest {
                    node_type,
                    first: first.clone(),
                    second: version,
                });
            }
        }

        tracing::debug!("Registering node type: {} v{}", node_type, version);
        versions.insert(version, factory);
        Ok(self)
    }

    /// Freeze the table. The result is read-only.
    pub fn build(self) -> NodeRegistry {
        let factories = self
            .factories
            .into_iter()
            .filter_map(|(node_type, versions)| {
                let latest = versions
                    .iter()
                    .find(|(_, f)| f.is_latest())
                    .or_else(|| versions.iter().next_back())
                    .map(|(v, _)| v.clone())?;
                Some((node_type, VersionTable { versions, latest }))
            })
            .collect();
        NodeRegistry { factories }
    }
}

struct VersionTable {
    versions: BTreeMap<String, Arc<dyn NodeFactory>>,
    latest: String,
}

/// Immutable mapping `node_type -> version -> factory`.
///
/// `"latest"` resolves to the version whose factory is flagged
/// [`NodeFactory::is_latest`]; without a flag it is the lexicographically
/// greatest version string.
pub struct NodeRegistry {
    factories: BTreeMap<NodeType, VersionTable>,
}

impl NodeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up the factory for `(node_type, version)`.
    pub fn resolve(
        &self,
        node_type: NodeType,
        version: &str,
    ) -> Result<&Arc<dyn NodeFactory>, WorkflowError> {
        let table = self
            .factories
            .get(&node_type)
            .ok_or(WorkflowError::UnknownNodeType(node_type))?;
        let version = if version == LATEST_VERSION {
            table.latest.as_str()
        } else {
            version
        };
        table
            .versions
            .get(version)
            .ok_or_else(|| WorkflowError::UnknownNodeVersion {
                node_type,
                version: version.to_string(),
            })
    }

    pub fn latest_version(&self, node_type: NodeType) -> Option<&str> {
        self.factories.get(&node_type).map(|t| t.latest.as_str())
    }

    /// Create a node instance for a graph node. Configuration errors are
    /// fatal here rather than per-run failures.
    pub fn create_node(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, graphcore::FlowError> {
        let factory = self.resolve(spec.node_type, &spec.version)?;
        Ok(factory.create(spec)?)
    }

    /// Registered node types with their versions, in a stable order.
    pub fn list_node_types(&self) -> Vec<(NodeType, Vec<String>)> {
        self.factories
            .iter()
            .map(|(node_type, table)| (*node_type, table.versions.keys().cloned().collect()))
            .collect()
    }

    /// Metadata of the latest version of a node type
    pub fn get_metadata(&self, node_type: NodeType) -> Option<NodeMetadata> {
        let table = self.factories.get(&node_type)?;
        table.versions.get(&table.latest).map(|f| f.metadata())
    }
}
