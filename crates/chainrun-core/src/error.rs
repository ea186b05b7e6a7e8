use thiserror::Error;

use crate::types::{ExecutionId, ExecutionStatus, WorkflowId};

#[derive(Debug, Error)]
pub enum ChainError {
    // Graph errors
    #[error("Workflow has no defined starting point: {0}")]
    MissingStartNode(String),

    #[error("Edge {source_id} -> {target_id} references unknown node '{missing}'")]
    UnknownNode {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("Cycle detected: node '{0}' was reached twice")]
    CycleDetected(String),

    // Node errors
    #[error("Invalid input for node '{node_id}': {message}")]
    InvalidNodeInput { node_id: String, message: String },

    #[error("Invalid data for node '{node_id}': {message}")]
    InvalidNodeData { node_id: String, message: String },

    // Generation errors
    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Text generation timed out after {0}s")]
    GenerationTimeout(u64),

    #[error("Text generator is not configured: {0}")]
    GeneratorNotConfigured(String),

    // Lookup errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Execution {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ExecutionId,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChainError {
    /// Lookup failures. Ownership mismatches are reported the same way.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChainError::WorkflowNotFound(_) | ChainError::ExecutionNotFound(_)
        )
    }

    /// Errors caused by the shape of the caller's workflow rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChainError::MissingStartNode(_)
                | ChainError::UnknownNode { .. }
                | ChainError::CycleDetected(_)
                | ChainError::InvalidNodeInput { .. }
                | ChainError::InvalidNodeData { .. }
                | ChainError::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
