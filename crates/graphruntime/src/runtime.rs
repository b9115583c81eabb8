use crate::{registry::NodeRegistry, ExecutionResult, InMemoryExecutionRepository, WorkflowExecutor};
use graphcore::{
    EventBus, FlowError, OrderConfig, Workflow, WorkflowError, WorkflowId, WorkflowNodeExecution,
    WorkflowNodeExecutionRepository, WorkflowRunId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main runtime for executing workflows
pub struct GraphRuntime {
    registry: Arc<NodeRegistry>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    repository: Arc<dyn WorkflowNodeExecutionRepository>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
}

impl GraphRuntime {
    /// Create a runtime over a built registry, keeping history in memory
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self::with_repository(registry, Arc::new(InMemoryExecutionRepository::new()), config)
    }

    /// Create a runtime that records history through `repository`
    pub fn with_repository(
        registry: Arc<NodeRegistry>,
        repository: Arc<dyn WorkflowNodeExecutionRepository>,
        config: RuntimeConfig,
    ) -> Self {
        let executor = Arc::new(WorkflowExecutor::new(
            config.max_parallel_nodes,
            config.max_loop_cycles,
        ));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            executor,
            event_bus,
            repository,
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn WorkflowNodeExecutionRepository> {
        &self.repository
    }

    /// Register a workflow
    pub async fn register_workflow(&self, workflow: Workflow) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow);
    }

    /// Execute a workflow by ID
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        inputs: HashMap<String, Value>,
    ) -> Result<ExecutionResult, FlowError> {
        let workflows = self.workflows.read().await;
        let workflow = workflows
            .get(&workflow_id)
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        self.execute(workflow, inputs).await
    }

    /// Execute a workflow directly (without registration)
    pub async fn execute(
        &self,
        workflow: &Workflow,
        inputs: HashMap<String, Value>,
    ) -> Result<ExecutionResult, FlowError> {
        self.executor
            .execute(
                workflow,
                &self.registry,
                self.repository.as_ref(),
                &self.event_bus,
                inputs,
            )
            .await
    }

    /// Build and check a workflow without executing it
    pub fn validate(&self, workflow: &Workflow) -> Result<usize, FlowError> {
        self.executor.validate(workflow, &self.registry)
    }

    /// Recorded node executions of a run
    pub async fn history(
        &self,
        workflow_run_id: WorkflowRunId,
        order: Option<OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, FlowError> {
        Ok(self
            .repository
            .get_by_workflow_run(workflow_run_id, order)
            .await?)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<graphcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    /// Hard cap on cycles of any loop construct
    pub max_loop_cycles: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            event_buffer_size: 1000,
            max_loop_cycles: 100,
        }
    }
}
