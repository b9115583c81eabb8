// crates/graphruntime/tests/registry_test.rs

use async_trait::async_trait;
use graphcore::{
    FlowError, Node, NodeContext, NodeError, NodeRunResult, NodeSpec, NodeType, RegistryError,
    WorkflowError,
};
use graphruntime::{NodeFactory, NodeRegistry};
use std::sync::Arc;

struct VersionedNode {
    id: String,
    version: String,
}

#[async_trait]
impl Node for VersionedNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::TemplateTransform
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn run(&self, _ctx: &NodeContext) -> Result<NodeRunResult, NodeError> {
        Ok(NodeRunResult::succeeded().with_output("version", self.version.clone()))
    }
}

struct VersionedFactory {
    version: &'static str,
    latest: bool,
}

impl VersionedFactory {
    fn new(version: &'static str) -> Arc<Self> {
        Arc::new(Self {
            version,
            latest: false,
        })
    }

    fn latest(version: &'static str) -> Arc<Self> {
        Arc::new(Self {
            version,
            latest: true,
        })
    }
}

impl NodeFactory for VersionedFactory {
    fn node_type(&self) -> NodeType {
        NodeType::TemplateTransform
    }

    fn version(&self) -> &str {
        self.version
    }

    fn is_latest(&self) -> bool {
        self.latest
    }

    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        if spec.data.get("broken").is_some() {
            return Err(NodeError::Configuration("broken data".to_string()));
        }
        Ok(Box::new(VersionedNode {
            id: spec.id.clone(),
            version: self.version.to_string(),
        }))
    }
}

#[test]
fn test_latest_without_flag_is_greatest_version() {
    let mut builder = NodeRegistry::builder();
    builder
        .register(VersionedFactory::new("2"))
        .unwrap()
        .register(VersionedFactory::new("1"))
        .unwrap()
        .register(VersionedFactory::new("3"))
        .unwrap();
    let registry = builder.build();

    assert_eq!(registry.latest_version(NodeType::TemplateTransform), Some("3"));
    let resolved = registry.resolve(NodeType::TemplateTransform, "latest").unwrap();
    assert_eq!(resolved.version(), "3");
}

#[test]
fn test_latest_flag_wins_over_ordering() {
    let mut builder = NodeRegistry::builder();
    builder
        .register(VersionedFactory::new("9"))
        .unwrap()
        .register(VersionedFactory::latest("2"))
        .unwrap();
    let registry = builder.build();

    for _ in 0..5 {
        let resolved = registry.resolve(NodeType::TemplateTransform, "latest").unwrap();
        assert_eq!(resolved.version(), "2");
    }
}

#[test]
fn test_latest_independent_of_registration_order() {
    let build = |order: &[&'static str]| {
        let mut builder = NodeRegistry::builder();
        for version in order {
            builder.register(VersionedFactory::new(*version)).unwrap();
        }
        builder.build()
    };

    let forward = build(&["1", "2", "10"]);
    let backward = build(&["10", "2", "1"]);
    assert_eq!(
        forward.latest_version(NodeType::TemplateTransform),
        backward.latest_version(NodeType::TemplateTransform)
    );
    assert_eq!(forward.list_node_types(), backward.list_node_types());
}

#[test]
fn test_duplicate_registration_fails_fast() {
    let mut builder = NodeRegistry::builder();
    builder.register(VersionedFactory::new("1")).unwrap();

    let err = builder.register(VersionedFactory::new("1")).err().unwrap();
    assert_eq!(
        err,
        RegistryError::DuplicateRegistration {
            node_type: NodeType::TemplateTransform,
            version: "1".to_string(),
        }
    );
}

#[test]
fn test_second_latest_claim_is_rejected() {
    let mut builder = NodeRegistry::builder();
    builder.register(VersionedFactory::latest("1")).unwrap();

    let err = builder.register(VersionedFactory::latest("2")).err().unwrap();
    assert!(matches!(
        err,
        RegistryError::DuplicateLatest { ref first, ref second, .. } if first == "1" && second == "2"
    ));
}

#[test]
fn test_latest_is_a_reserved_version() {
    let mut builder = NodeRegistry::builder();
    let err = builder.register(VersionedFactory::new("latest")).err().unwrap();
    assert!(matches!(err, RegistryError::ReservedVersion(_)));
}

#[test]
fn test_unknown_type_and_version() {
    let mut builder = NodeRegistry::builder();
    builder.register(VersionedFactory::new("1")).unwrap();
    let registry = builder.build();

    assert!(matches!(
        registry.resolve(NodeType::Answer, "latest"),
        Err(WorkflowError::UnknownNodeType(NodeType::Answer))
    ));
    assert!(matches!(
        registry.resolve(NodeType::TemplateTransform, "7"),
        Err(WorkflowError::UnknownNodeVersion { .. })
    ));
}

#[test]
fn test_create_node_pins_version_and_surfaces_config_errors() {
    let mut builder = NodeRegistry::builder();
    builder
        .register(VersionedFactory::new("1"))
        .unwrap()
        .register(VersionedFactory::new("2"))
        .unwrap();
    let registry = builder.build();

    let pinned = NodeSpec::new("t", NodeType::TemplateTransform).with_version("1");
    assert_eq!(registry.create_node(&pinned).unwrap().version(), "1");

    let latest = NodeSpec::new("t", NodeType::TemplateTransform);
    assert_eq!(registry.create_node(&latest).unwrap().version(), "2");

    let broken = NodeSpec::new("t", NodeType::TemplateTransform)
        .with_data(serde_json::json!({"broken": true}));
    assert!(matches!(
        registry.create_node(&broken),
        Err(FlowError::Node(NodeError::Configuration(_)))
    ));
}
