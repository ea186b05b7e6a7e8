use rusqlite::Connection;

use chainrun_core::error::{ChainError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workflows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    nodes TEXT NOT NULL,
    edges TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workflows_owner ON workflows(owner_id, id);

CREATE TABLE IF NOT EXISTS executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workflow_id INTEGER NOT NULL REFERENCES workflows(id),
    status TEXT NOT NULL,
    results TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_executions_workflow
    ON executions(workflow_id, created_at);
";

/// Apply connection pragmas and create tables if needed.
pub(crate) fn init(conn: &Connection, file_backed: bool) -> Result<()> {
    if file_backed {
        // WAL lets per-run connections write while requests read
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| ChainError::Database(e.to_string()))?;
    }
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(|e| ChainError::Database(e.to_string()))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| ChainError::Database(e.to_string()))?;
    Ok(())
}
