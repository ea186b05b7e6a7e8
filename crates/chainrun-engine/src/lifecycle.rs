use serde_json::Value;

use chainrun_core::error::{ChainError, Result};
use chainrun_core::types::{
    Execution, ExecutionId, ExecutionStatus, RunResults, WorkflowId, ERROR_KEY,
};

/// In-memory state machine for one run of an execution row.
///
/// `PENDING -> RUNNING -> COMPLETED | FAILED`. Terminal records reject
/// every further transition.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    id: ExecutionId,
    workflow_id: WorkflowId,
    status: ExecutionStatus,
    results: RunResults,
}

impl ExecutionRecord {
    pub fn new(execution: &Execution) -> Self {
        Self {
            id: execution.id,
            workflow_id: execution.workflow_id,
            status: execution.status,
            results: execution.results.clone(),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn results(&self) -> &RunResults {
        &self.results
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ChainError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Enter RUNNING with an empty results map.
    pub fn start(&mut self) -> Result<()> {
        self.transition(ExecutionStatus::Running)?;
        self.results = RunResults::new();
        Ok(())
    }

    /// Store the value produced by a node.
    pub fn record_node(&mut self, node_id: &str, value: Value) -> Result<()> {
        if self.status != ExecutionStatus::Running {
            return Err(ChainError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: ExecutionStatus::Running,
            });
        }
        self.results.insert(node_id.to_string(), value);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.transition(ExecutionStatus::Completed)
    }

    /// Enter FAILED. Partial results are replaced by the error message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(ExecutionStatus::Failed)?;
        self.results = RunResults::new();
        self.results
            .insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Ok(())
    }
}
