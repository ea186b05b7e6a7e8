use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use chainrun_core::config::GenerationConfig;
use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::{ExecutionStore, RunStore, TextGenerator, WorkflowStore};
use chainrun_core::types::{ExecutionId, ExecutionStatus, RunResults, WorkflowId};

use crate::executor::NodeExecutors;
use crate::graph::{load_graph, Graph};
use crate::lifecycle::ExecutionRecord;

/// How a call to [`ExecutionEngine::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every node ran. Carries the per-node results.
    Completed(RunResults),
    /// The run failed and was recorded as FAILED with this message.
    Failed(String),
    /// Nothing was persisted: the workflow or execution could not be used.
    Abandoned(String),
}

impl RunOutcome {
    pub fn status(&self) -> Option<ExecutionStatus> {
        match self {
            RunOutcome::Completed(_) => Some(ExecutionStatus::Completed),
            RunOutcome::Failed(_) => Some(ExecutionStatus::Failed),
            RunOutcome::Abandoned(_) => None,
        }
    }
}

/// Walks a workflow chain from its start node and records the run.
///
/// Errors never escape [`run`](Self::run): they end up in the execution's
/// results or, when nothing can be persisted, in the log.
pub struct ExecutionEngine {
    executors: NodeExecutors,
}

impl ExecutionEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, generation_timeout: Duration) -> Self {
        Self {
            executors: NodeExecutors::new(generator, generation_timeout),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self::new(generator, Duration::from_secs(config.timeout_secs))
    }

    /// Run one execution of one workflow against `store`.
    ///
    /// The store handle should belong to this run alone.
    pub async fn run(
        &self,
        store: &dyn RunStore,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    ) -> RunOutcome {
        let start = Instant::now();

        let (workflow, execution) = match (
            store.load_workflow(workflow_id).await,
            store.load_execution(execution_id).await,
        ) {
            (Ok(Some(w)), Ok(Some(e))) => (w, e),
            (Err(e), _) | (_, Err(e)) => {
                error!(%workflow_id, %execution_id, error = %e, "Could not load run inputs");
                return RunOutcome::Abandoned(e.to_string());
            }
            _ => {
                error!(%workflow_id, %execution_id, "Workflow or execution not found in background task");
                return RunOutcome::Abandoned("workflow or execution not found".into());
            }
        };

        if execution.workflow_id != workflow.id {
            error!(
                %workflow_id,
                %execution_id,
                owner_workflow = %execution.workflow_id,
                "Execution belongs to a different workflow"
            );
            return RunOutcome::Abandoned(format!(
                "execution {} belongs to workflow {}",
                execution_id, execution.workflow_id
            ));
        }

        let mut record = ExecutionRecord::new(&execution);
        if let Err(e) = record.start() {
            warn!(%execution_id, status = %record.status(), "Execution already finished, not running again");
            return RunOutcome::Abandoned(e.to_string());
        }

        let walked = match store
            .update_execution(execution_id, ExecutionStatus::Running, RunResults::new())
            .await
        {
            Ok(()) => {
                info!(%workflow_id, %execution_id, "Execution started");
                match load_graph(&workflow.nodes, &workflow.edges) {
                    Ok(graph) => self.walk(store, &graph, &mut record).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        let outcome = match walked {
            Ok(()) => match record.complete() {
                Ok(()) => RunOutcome::Completed(record.results().clone()),
                Err(e) => self.fail(&mut record, e),
            },
            Err(e) => self.fail(&mut record, e),
        };

        // Terminal state is written exactly once, on both paths
        if let Err(e) = store
            .update_execution(execution_id, record.status(), record.results().clone())
            .await
        {
            error!(%execution_id, error = %e, "Failed to persist terminal execution state");
        }

        info!(
            %workflow_id,
            %execution_id,
            status = %record.status(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Finished execution"
        );
        outcome
    }

    /// Mark an execution that never reached the engine as FAILED.
    ///
    /// Executions that are already terminal are left alone.
    pub async fn fail_unstarted(
        store: &dyn RunStore,
        execution_id: ExecutionId,
        message: &str,
    ) -> RunOutcome {
        let execution = match store.load_execution(execution_id).await {
            Ok(Some(execution)) => execution,
            Ok(None) => return RunOutcome::Abandoned("execution not found".into()),
            Err(e) => {
                error!(%execution_id, error = %e, "Could not load execution to mark it failed");
                return RunOutcome::Abandoned(e.to_string());
            }
        };

        let mut record = ExecutionRecord::new(&execution);
        if let Err(e) = record.fail(message) {
            warn!(%execution_id, status = %record.status(), "Execution already finished, leaving it as is");
            return RunOutcome::Abandoned(e.to_string());
        }

        match store
            .update_execution(execution_id, record.status(), record.results().clone())
            .await
        {
            Ok(()) => {
                error!(%execution_id, error = message, "Execution failed before it started");
                RunOutcome::Failed(message.to_string())
            }
            Err(e) => {
                error!(%execution_id, error = %e, "Failed to persist execution failure");
                RunOutcome::Abandoned(e.to_string())
            }
        }
    }

    fn fail(&self, record: &mut ExecutionRecord, err: ChainError) -> RunOutcome {
        let message = err.to_string();
        error!(execution_id = %record.id(), error = %message, "Workflow execution failed");
        if let Err(e) = record.fail(message.clone()) {
            error!(execution_id = %record.id(), error = %e, "Could not mark execution failed");
        }
        RunOutcome::Failed(message)
    }

    /// Visit nodes from the start until a node has no successor.
    async fn walk(
        &self,
        store: &dyn RunStore,
        graph: &Graph,
        record: &mut ExecutionRecord,
    ) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::with_capacity(graph.len());
        let mut current_id = Some(graph.start());
        let mut value = Value::Null;

        info!(execution_id = %record.id(), start = graph.start(), "Starting workflow walk");

        while let Some(node_id) = current_id {
            if !visited.insert(node_id) {
                return Err(ChainError::CycleDetected(node_id.to_string()));
            }

            let node = graph.node(node_id).ok_or_else(|| ChainError::UnknownNode {
                source_id: node_id.to_string(),
                target_id: node_id.to_string(),
                missing: node_id.to_string(),
            })?;

            debug!(node_id, node_type = node.kind.label(), "Executing node");
            value = self.executors.execute(node, value).await?;
            record.record_node(node_id, value.clone())?;

            // Progress is visible while RUNNING
            store
                .update_execution(record.id(), ExecutionStatus::Running, record.results().clone())
                .await?;

            current_id = graph.successor(node_id);
        }

        Ok(())
    }
}
