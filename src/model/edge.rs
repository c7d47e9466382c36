//! Edge (link) in the topology graph.

use serde::{Deserialize, Serialize};
use super::{GroupKind, NodeId};

/// Edge type: the (from, to) kind pair of the link function that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeType {
    pub from: GroupKind,
    pub to: GroupKind,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from.kind, self.to.kind)
    }
}

/// A directed parent → child edge.
///
/// Edges are identified by their (from, to, type) triple, so two link
/// functions yielding the same triple produce one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, edge_type: EdgeType) -> Self {
        Self { from, to, edge_type }
    }
}
