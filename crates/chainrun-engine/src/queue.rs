use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use chainrun_core::config::RunnerConfig;
use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::StoreProvider;
use chainrun_core::types::{ExecutionId, WorkflowId};

use crate::engine::ExecutionEngine;

/// A run waiting for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
}

/// Bounded queue of pending runs drained by a fixed set of workers.
///
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct RunQueue {
    tx: mpsc::Sender<RunRequest>,
}

impl RunQueue {
    /// Spawn `config.workers` workers and return the submit handle.
    ///
    /// Workers stop when `cancel` fires or every queue handle is dropped.
    pub fn start(
        engine: Arc<ExecutionEngine>,
        stores: Arc<dyn StoreProvider>,
        config: &RunnerConfig,
        cancel: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    engine.clone(),
                    stores.clone(),
                    rx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(workers, capacity = config.queue_capacity, "Run queue started");
        (Self { tx }, handles)
    }

    /// Claim room for one run without waiting.
    ///
    /// Fails when the queue is full or closed. Dropping the slot unused
    /// gives the room back.
    pub fn reserve(&self) -> Result<RunSlot<'_>> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChainError::Config("run queue is full".into()),
            mpsc::error::TrySendError::Closed(_) => {
                ChainError::Config("run queue is shut down".into())
            }
        })?;
        Ok(RunSlot { permit })
    }

    /// Enqueue a run without waiting. Fails when the queue is full or closed.
    pub fn submit(&self, request: RunRequest) -> Result<()> {
        self.reserve()?.send(request);
        Ok(())
    }
}

/// Room for one run in a [`RunQueue`].
pub struct RunSlot<'a> {
    permit: mpsc::Permit<'a, RunRequest>,
}

impl RunSlot<'_> {
    pub fn send(self, request: RunRequest) {
        self.permit.send(request);
        debug!(
            workflow_id = %request.workflow_id,
            execution_id = %request.execution_id,
            "Run queued"
        );
    }
}

async fn worker_loop(
    worker: usize,
    engine: Arc<ExecutionEngine>,
    stores: Arc<dyn StoreProvider>,
    rx: Arc<Mutex<mpsc::Receiver<RunRequest>>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => None,
            request = async { rx.lock().await.recv().await } => request,
        };
        let Some(request) = next else {
            debug!(worker, "Run worker stopping");
            break;
        };

        let store = match stores.session() {
            Ok(store) => store,
            Err(e) => {
                error!(
                    worker,
                    execution_id = %request.execution_id,
                    error = %e,
                    "Could not open a store session for run"
                );
                let message = format!("could not open a store session: {}", e);
                ExecutionEngine::fail_unstarted(
                    stores.shared().as_ref(),
                    request.execution_id,
                    &message,
                )
                .await;
                continue;
            }
        };

        engine
            .run(store.as_ref(), request.workflow_id, request.execution_id)
            .await;
    }
}
