use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Text generation collaborator used by prompt nodes.
pub trait TextGenerator: Send + Sync + 'static {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Generate a completion for a non-empty prompt.
    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>>;
}

/// User persistence.
pub trait UserStore: Send + Sync + 'static {
    fn create_user(&self, email: String) -> BoxFuture<'_, Result<User>>;

    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>>>;
}

/// Workflow persistence. Every query except `load_workflow` is scoped to an owner.
pub trait WorkflowStore: Send + Sync + 'static {
    fn create_workflow(&self, owner: UserId, draft: WorkflowDraft)
        -> BoxFuture<'_, Result<Workflow>>;

    fn list_workflows(
        &self,
        owner: UserId,
        skip: usize,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Workflow>>>;

    fn get_workflow(&self, id: WorkflowId, owner: UserId)
        -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// Replace name, nodes and edges. `None` when absent or not owned.
    fn update_workflow(
        &self,
        id: WorkflowId,
        owner: UserId,
        draft: WorkflowDraft,
    ) -> BoxFuture<'_, Result<Option<Workflow>>>;

    /// Unscoped lookup for background runs.
    fn load_workflow(&self, id: WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>>;
}

/// Execution persistence. Every query except `load_execution` is scoped to
/// the owner of the parent workflow.
pub trait ExecutionStore: Send + Sync + 'static {
    /// Insert a new execution in PENDING with empty results.
    fn create_execution(&self, workflow_id: WorkflowId) -> BoxFuture<'_, Result<Execution>>;

    /// Unscoped lookup for background runs.
    fn load_execution(&self, id: ExecutionId) -> BoxFuture<'_, Result<Option<Execution>>>;

    /// Atomically write status and results, bumping `updated_at`.
    fn update_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        results: RunResults,
    ) -> BoxFuture<'_, Result<()>>;

    /// Executions of a workflow, newest first.
    fn list_executions(
        &self,
        workflow_id: WorkflowId,
        owner: UserId,
    ) -> BoxFuture<'_, Result<Vec<Execution>>>;

    fn get_execution(
        &self,
        id: ExecutionId,
        owner: UserId,
    ) -> BoxFuture<'_, Result<Option<Execution>>>;
}

/// Everything a run or a request needs from persistence.
pub trait RunStore: WorkflowStore + ExecutionStore {}

impl<T: WorkflowStore + ExecutionStore> RunStore for T {}

/// Hands out persistence handles that belong to a single background run.
pub trait StoreProvider: Send + Sync + 'static {
    fn session(&self) -> Result<Arc<dyn RunStore>>;

    /// The provider's long-lived handle. Used to record a run as failed when
    /// no session could be opened for it.
    fn shared(&self) -> Arc<dyn RunStore>;
}
