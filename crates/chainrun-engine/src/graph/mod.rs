//! Graph loading.
//!
//! A workflow's node and edge lists are turned into a node map, a
//! single-successor map, and the start node. Nodes are validated into typed
//! kinds here so that executors never read free-form data.

pub mod loader;
pub mod node;

pub use loader::{load_graph, Graph};
pub use node::{Node, NodeKind};
