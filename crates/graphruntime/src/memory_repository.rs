use async_trait::async_trait;
use graphcore::{
    OrderConfig, RepositoryError, WorkflowNodeExecution, WorkflowNodeExecutionRepository,
    WorkflowRunId,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Records {
    by_run: HashMap<WorkflowRunId, Vec<WorkflowNodeExecution>>,
    ids: HashSet<Uuid>,
}

/// Process-local execution history. Saves from concurrent branches are
/// serialized by one lock, so each branch's records keep their own order.
#[derive(Default)]
pub struct InMemoryExecutionRepository {
    records: RwLock<Records>,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl WorkflowNodeExecutionRepository for InMemoryExecutionRepository {
    async fn save(&self, execution: WorkflowNodeExecution) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if !records.ids.insert(execution.id) {
            return Err(RepositoryError::Duplicate(execution.id));
        }
        records
            .by_run
            .entry(execution.workflow_run_id)
            .or_default()
            .push(execution);
        Ok(())
    }

    async fn get_by_workflow_run(
        &self,
        workflow_run_id: WorkflowRunId,
        order: Option<OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError> {
        let mut executions = self
            .records
            .read()
            .await
            .by_run
            .get(&workflow_run_id)
            .cloned()
            .unwrap_or_default();
        order.unwrap_or_default().sort(&mut executions);
        Ok(executions)
    }
}
