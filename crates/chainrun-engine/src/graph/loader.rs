use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use chainrun_core::error::{ChainError, Result};
use chainrun_core::types::{EdgeSpec, NodeSpec};

use super::node::Node;

/// A workflow interpreted as a linear chain.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: HashMap<String, Node>,
    successors: HashMap<String, String>,
    start: String,
}

impl Graph {
    /// Id of the node the walk starts from.
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The single successor selected for `id`, if any.
    pub fn successor(&self, id: &str) -> Option<&str> {
        self.successors.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Parse a workflow's node and edge lists into a [`Graph`].
///
/// The start node is the one no edge points at. When several qualify the
/// lowest id wins. Each node keeps only its first outgoing edge. Edges must
/// name existing nodes.
pub fn load_graph(nodes: &[NodeSpec], edges: &[EdgeSpec]) -> Result<Graph> {
    let mut node_map: HashMap<String, Node> = HashMap::with_capacity(nodes.len());
    for spec in nodes {
        if node_map.contains_key(&spec.id) {
            warn!(node_id = %spec.id, "Duplicate node id, keeping the first definition");
            continue;
        }
        node_map.insert(spec.id.clone(), Node::from_spec(spec)?);
    }

    let mut successors: HashMap<String, String> = HashMap::new();
    let mut targets: HashSet<&str> = HashSet::new();

    for edge in edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_map.contains_key(endpoint) {
                return Err(ChainError::UnknownNode {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }

        targets.insert(edge.target.as_str());

        match successors.get(&edge.source) {
            Some(existing) => warn!(
                node_id = %edge.source,
                kept = %existing,
                ignored = %edge.target,
                "Node has more than one outgoing edge, following the first"
            ),
            None => {
                successors.insert(edge.source.clone(), edge.target.clone());
            }
        }
    }

    // BTreeSet gives a deterministic pick among several candidates
    let candidates: BTreeSet<&str> = node_map
        .keys()
        .map(String::as_str)
        .filter(|id| !targets.contains(id))
        .collect();

    let start = match candidates.iter().next() {
        Some(first) => first.to_string(),
        None => {
            let reason = if node_map.is_empty() {
                "workflow has no nodes".to_string()
            } else {
                "every node has an incoming edge".to_string()
            };
            return Err(ChainError::MissingStartNode(reason));
        }
    };

    if candidates.len() > 1 {
        warn!(
            start = %start,
            candidates = ?candidates,
            "Several nodes have no incoming edge, starting from the lowest id"
        );
    }

    debug!(start = %start, nodes = node_map.len(), edges = edges.len(), "Graph loaded");

    Ok(Graph {
        nodes: node_map,
        successors,
        start,
    })
}
