use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::{
    ExecutionStore, RunStore, StoreProvider, UserStore, WorkflowStore,
};
use chainrun_core::types::*;

use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store for users, workflows and executions.
///
/// Cloning shares the underlying connection. Use [`StoreProvider::session`]
/// to get a handle with its own connection for a background run.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ChainError::Database(format!("Failed to create db directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| ChainError::Database(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| ChainError::Database(e.to_string()))?;
        schema::init(&conn, true)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing and one-off runs).
    ///
    /// Sessions of an in-memory store share its single connection.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| ChainError::Database(e.to_string()))?;
        schema::init(&conn, false)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ChainError::Database(e.to_string()))
    }
}

fn db_err(e: rusqlite::Error) -> ChainError {
    ChainError::Database(e.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed-width so lexical order matches time order
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ChainError::Database(format!("bad timestamp '{}': {}", raw, e)))
}

// ── Row types ────────────────────────────────────────────────────

struct WorkflowRow {
    id: i64,
    owner_id: i64,
    name: String,
    nodes: String,
    edges: String,
}

impl WorkflowRow {
    const COLUMNS: &'static str = "id, owner_id, name, nodes, edges";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            nodes: row.get(3)?,
            edges: row.get(4)?,
        })
    }

    fn into_workflow(self) -> Result<Workflow> {
        Ok(Workflow {
            id: WorkflowId(self.id),
            owner_id: UserId(self.owner_id),
            name: self.name,
            nodes: serde_json::from_str(&self.nodes)?,
            edges: serde_json::from_str(&self.edges)?,
        })
    }
}

struct ExecutionRow {
    id: i64,
    workflow_id: i64,
    status: String,
    results: String,
    created_at: String,
    updated_at: String,
}

impl ExecutionRow {
    const COLUMNS: &'static str = "e.id, e.workflow_id, e.status, e.results, e.created_at, e.updated_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            status: row.get(2)?,
            results: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_execution(self) -> Result<Execution> {
        let status = self
            .status
            .parse::<ExecutionStatus>()
            .map_err(ChainError::Database)?;
        Ok(Execution {
            id: ExecutionId(self.id),
            workflow_id: WorkflowId(self.workflow_id),
            status,
            results: serde_json::from_str(&self.results)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn select_workflow(
    conn: &Connection,
    id: WorkflowId,
    owner: Option<UserId>,
) -> Result<Option<Workflow>> {
    let row = match owner {
        Some(owner) => conn
            .query_row(
                &format!(
                    "SELECT {} FROM workflows WHERE id = ?1 AND owner_id = ?2",
                    WorkflowRow::COLUMNS
                ),
                params![id.0, owner.0],
                WorkflowRow::from_row,
            )
            .optional(),
        None => conn
            .query_row(
                &format!("SELECT {} FROM workflows WHERE id = ?1", WorkflowRow::COLUMNS),
                params![id.0],
                WorkflowRow::from_row,
            )
            .optional(),
    }
    .map_err(db_err)?;

    row.map(WorkflowRow::into_workflow).transpose()
}

fn select_execution(
    conn: &Connection,
    id: ExecutionId,
    owner: Option<UserId>,
) -> Result<Option<Execution>> {
    let row = match owner {
        Some(owner) => conn
            .query_row(
                &format!(
                    "SELECT {} FROM executions e
                     JOIN workflows w ON w.id = e.workflow_id
                     WHERE e.id = ?1 AND w.owner_id = ?2",
                    ExecutionRow::COLUMNS
                ),
                params![id.0, owner.0],
                ExecutionRow::from_row,
            )
            .optional(),
        None => conn
            .query_row(
                &format!("SELECT {} FROM executions e WHERE e.id = ?1", ExecutionRow::COLUMNS),
                params![id.0],
                ExecutionRow::from_row,
            )
            .optional(),
    }
    .map_err(db_err)?;

    row.map(ExecutionRow::into_execution).transpose()
}

impl UserStore for SqliteStore {
    fn create_user(&self, email: String) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (email, created_at) VALUES (?1, ?2)",
                params![email, timestamp(now)],
            )
            .map_err(db_err)?;

            Ok(User {
                id: UserId(conn.last_insert_rowid()),
                email,
                created_at: now,
            })
        })
    }

    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let row = conn
                .query_row(
                    "SELECT id, email, created_at FROM users WHERE id = ?1",
                    params![id.0],
                    |row| {
                        let id: i64 = row.get(0)?;
                        let email: String = row.get(1)?;
                        let created_at: String = row.get(2)?;
                        Ok((id, email, created_at))
                    },
                )
                .optional()
                .map_err(db_err)?;

            row.map(|(id, email, created_at)| {
                Ok(User {
                    id: UserId(id),
                    email,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
    }
}

impl WorkflowStore for SqliteStore {
    fn create_workflow(
        &self,
        owner: UserId,
        draft: WorkflowDraft,
    ) -> BoxFuture<'_, Result<Workflow>> {
        Box::pin(async move {
            let nodes = serde_json::to_string(&draft.nodes)?;
            let edges = serde_json::to_string(&draft.edges)?;
            let now = timestamp(Utc::now());

            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO workflows (owner_id, name, nodes, edges, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![owner.0, draft.name, nodes, edges, now],
            )
            .map_err(db_err)?;

            let id = WorkflowId(conn.last_insert_rowid());
            debug!(workflow_id = %id, owner_id = %owner, "Workflow created");
            Ok(Workflow {
                id,
                owner_id: owner,
                name: draft.name,
                nodes: draft.nodes,
                edges: draft.edges,
            })
        })
    }

    fn list_workflows(
        &self,
        owner: UserId,
        skip: usize,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Workflow>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM workflows
                     WHERE owner_id = ?1
                     ORDER BY id ASC
                     LIMIT ?2 OFFSET ?3",
                    WorkflowRow::COLUMNS
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(
                    params![owner.0, limit as i64, skip as i64],
                    WorkflowRow::from_row,
                )
                .map_err(db_err)?;

            let mut workflows = Vec::new();
            for row in rows {
                workflows.push(row.map_err(db_err)?.into_workflow()?);
            }
            Ok(workflows)
        })
    }

    fn get_workflow(
        &self,
        id: WorkflowId,
        owner: UserId,
    ) -> BoxFuture<'_, Result<Option<Workflow>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            select_workflow(&conn, id, Some(owner))
        })
    }

    fn update_workflow(
        &self,
        id: WorkflowId,
        owner: UserId,
        draft: WorkflowDraft,
    ) -> BoxFuture<'_, Result<Option<Workflow>>> {
        Box::pin(async move {
            let nodes = serde_json::to_string(&draft.nodes)?;
            let edges = serde_json::to_string(&draft.edges)?;

            let conn = self.lock()?;
            let changed = conn
                .execute(
                    "UPDATE workflows
                     SET name = ?1, nodes = ?2, edges = ?3, updated_at = ?4
                     WHERE id = ?5 AND owner_id = ?6",
                    params![draft.name, nodes, edges, timestamp(Utc::now()), id.0, owner.0],
                )
                .map_err(db_err)?;

            if changed == 0 {
                return Ok(None);
            }
            select_workflow(&conn, id, Some(owner))
        })
    }

    fn load_workflow(&self, id: WorkflowId) -> BoxFuture<'_, Result<Option<Workflow>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            select_workflow(&conn, id, None)
        })
    }
}

impl ExecutionStore for SqliteStore {
    fn create_execution(&self, workflow_id: WorkflowId) -> BoxFuture<'_, Result<Execution>> {
        Box::pin(async move {
            let now = Utc::now();
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO executions (workflow_id, status, results, created_at, updated_at)
                 VALUES (?1, ?2, '{}', ?3, ?3)",
                params![workflow_id.0, ExecutionStatus::Pending.as_str(), timestamp(now)],
            )
            .map_err(db_err)?;

            Ok(Execution {
                id: ExecutionId(conn.last_insert_rowid()),
                workflow_id,
                status: ExecutionStatus::Pending,
                results: RunResults::new(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn load_execution(&self, id: ExecutionId) -> BoxFuture<'_, Result<Option<Execution>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            select_execution(&conn, id, None)
        })
    }

    fn update_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        results: RunResults,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let results = serde_json::to_string(&results)?;
            let conn = self.lock()?;
            let changed = conn
                .execute(
                    "UPDATE executions SET status = ?1, results = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![status.as_str(), results, timestamp(Utc::now()), id.0],
                )
                .map_err(db_err)?;

            if changed == 0 {
                return Err(ChainError::ExecutionNotFound(id));
            }
            Ok(())
        })
    }

    fn list_executions(
        &self,
        workflow_id: WorkflowId,
        owner: UserId,
    ) -> BoxFuture<'_, Result<Vec<Execution>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM executions e
                     JOIN workflows w ON w.id = e.workflow_id
                     WHERE e.workflow_id = ?1 AND w.owner_id = ?2
                     ORDER BY e.created_at DESC, e.id DESC",
                    ExecutionRow::COLUMNS
                ))
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![workflow_id.0, owner.0], ExecutionRow::from_row)
                .map_err(db_err)?;

            let mut executions = Vec::new();
            for row in rows {
                executions.push(row.map_err(db_err)?.into_execution()?);
            }
            Ok(executions)
        })
    }

    fn get_execution(
        &self,
        id: ExecutionId,
        owner: UserId,
    ) -> BoxFuture<'_, Result<Option<Execution>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            select_execution(&conn, id, Some(owner))
        })
    }
}

impl StoreProvider for SqliteStore {
    fn session(&self) -> Result<Arc<dyn RunStore>> {
        match &self.path {
            Some(path) => Ok(Arc::new(SqliteStore::open(path)?)),
            None => Ok(Arc::new(self.clone())),
        }
    }

    fn shared(&self) -> Arc<dyn RunStore> {
        Arc::new(self.clone())
    }
}
