//! Contract for persisting and querying node execution history.
//!
//! The storage behind it is not part of the core; implementations are
//! injected into the executor as `Arc<dyn WorkflowNodeExecutionRepository>`.

use crate::{RepositoryError, WorkflowNodeExecution, WorkflowRunId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sortable attributes of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    CreatedAt,
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn reversed(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderConfig {
    pub field: OrderField,
    #[serde(default)]
    pub direction: OrderDirection,
}

impl OrderConfig {
    pub fn new(field: OrderField, direction: OrderDirection) -> Self {
        Self { field, direction }
    }

    pub fn reversed(self) -> Self {
        Self {
            field: self.field,
            direction: self.direction.reversed(),
        }
    }

    /// Total order over records: the configured field, then `sequence`,
    /// then record id. Descending is the exact reverse of ascending.
    pub fn compare(&self, a: &WorkflowNodeExecution, b: &WorkflowNodeExecution) -> Ordering {
        let primary = match self.field {
            OrderField::CreatedAt => a.created_at.cmp(&b.created_at),
            OrderField::Sequence => Ordering::Equal,
        };
        let ascending = primary
            .then_with(|| a.sequence.cmp(&b.sequence))
            .then_with(|| a.id.cmp(&b.id));
        match self.direction {
            OrderDirection::Asc => ascending,
            OrderDirection::Desc => ascending.reverse(),
        }
    }

    pub fn sort(&self, records: &mut [WorkflowNodeExecution]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self::new(OrderField::Sequence, OrderDirection::Asc)
    }
}

/// Append-only store of [`WorkflowNodeExecution`] records.
#[async_trait]
pub trait WorkflowNodeExecutionRepository: Send + Sync {
    /// Persist a new record. Saving an id that already exists is an error;
    /// records are never updated or deleted through this interface.
    async fn save(&self, execution: WorkflowNodeExecution) -> Result<(), RepositoryError>;

    /// All records of a run, ordered by `order` (sequence ascending when `None`).
    async fn get_by_workflow_run(
        &self,
        workflow_run_id: WorkflowRunId,
        order: Option<OrderConfig>,
    ) -> Result<Vec<WorkflowNodeExecution>, RepositoryError>;
}
