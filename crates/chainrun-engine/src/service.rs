use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::{ExecutionStore, RunStore, WorkflowStore};
use chainrun_core::types::{Execution, ExecutionId, UserId, WorkflowId};

use crate::queue::{RunQueue, RunRequest};

/// Response to a run trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredRun {
    pub message: String,
    pub execution_id: ExecutionId,
}

/// Owner-scoped entry point for starting and inspecting runs.
#[derive(Clone)]
pub struct ExecutionService {
    store: Arc<dyn RunStore>,
    queue: RunQueue,
}

impl ExecutionService {
    pub fn new(store: Arc<dyn RunStore>, queue: RunQueue) -> Self {
        Self { store, queue }
    }

    /// Create a PENDING execution and hand it to the run queue.
    ///
    /// Returns as soon as the run is queued. The queue slot is claimed before
    /// the row is inserted, so a full queue leaves no execution behind.
    pub async fn trigger(&self, workflow_id: WorkflowId, user: UserId) -> Result<TriggeredRun> {
        self.store
            .get_workflow(workflow_id, user)
            .await?
            .ok_or(ChainError::WorkflowNotFound(workflow_id))?;

        let slot = self.queue.reserve()?;
        let execution = self.store.create_execution(workflow_id).await?;
        slot.send(RunRequest {
            workflow_id,
            execution_id: execution.id,
        });

        info!(%workflow_id, execution_id = %execution.id, %user, "Workflow execution queued");
        Ok(TriggeredRun {
            message: "Workflow execution started".to_string(),
            execution_id: execution.id,
        })
    }

    /// Executions of an owned workflow, newest first.
    pub async fn list(&self, workflow_id: WorkflowId, user: UserId) -> Result<Vec<Execution>> {
        self.store
            .get_workflow(workflow_id, user)
            .await?
            .ok_or(ChainError::WorkflowNotFound(workflow_id))?;
        self.store.list_executions(workflow_id, user).await
    }

    pub async fn get(&self, execution_id: ExecutionId, user: UserId) -> Result<Execution> {
        self.store
            .get_execution(execution_id, user)
            .await?
            .ok_or(ChainError::ExecutionNotFound(execution_id))
    }
}
