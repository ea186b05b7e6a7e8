//! Workflow execution: interprets a persisted node/edge chain as a pipeline,
//! threads a single value through it, and records the outcome on an
//! execution row.

pub mod engine;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod queue;
pub mod service;

pub use engine::{ExecutionEngine, RunOutcome};
pub use executor::NodeExecutors;
pub use graph::{load_graph, Graph, Node, NodeKind};
pub use lifecycle::ExecutionRecord;
pub use queue::{RunQueue, RunRequest};
pub use service::{ExecutionService, TriggeredRun};
