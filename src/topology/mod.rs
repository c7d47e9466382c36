//! # Topology Graph
//!
//! A directed multigraph of infrastructure, policy and enforcement-component
//! nodes, rebuilt from scratch for every pass.
//!
//! ## Determinism
//!
//! Node ids are positions in the key-sorted node list and edges live in an
//! ordered set, so building twice from the same snapshot yields equal
//! topologies no matter how the store ordered its listings.
//!
//! ## Sub-scopes
//!
//! Gateway listeners and route rules are declared inside their owner's spec.
//! Ingestion expands each into its own node (`Listener`, `HTTPRouteRule`)
//! named `<owner>#<section>` so policies can target them and the merge engine
//! can treat route rules as leaves.

pub mod link;
pub mod links;

use std::collections::{BTreeSet, VecDeque};

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::model::*;
use crate::store::Snapshot;

pub use link::{LinkContext, LinkFn, LinkFunction, LinkRegistry};

type Adjacency = SmallVec<[NodeId; 4]>;

/// Immutable topology for one pass. `Send + Sync`; share it freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: Vec<Node>,
    index: HashMap<ObjectKey, NodeId>,
    by_kind: HashMap<GroupKind, Vec<NodeId>>,
    edges: BTreeSet<Edge>,
    parents: Vec<Adjacency>,
    children: Vec<Adjacency>,
    global: Option<NodeId>,
}

impl Topology {
    /// Build the topology for `snapshot`.
    ///
    /// `global` names the global-config singleton, if any; it is handed to
    /// every link resolver. Never fails: candidates that do not exist or have
    /// the wrong kind are dropped.
    pub fn build(snapshot: &Snapshot, global: Option<&ObjectKey>, links: &LinkRegistry) -> Self {
        let nodes = ingest(snapshot);

        let mut index = HashMap::with_capacity(nodes.len());
        let mut by_kind: HashMap<GroupKind, Vec<NodeId>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            index.insert(node.key.clone(), id);
            by_kind.entry(node.key.group_kind.clone()).or_default().push(id);
        }

        let global = global.and_then(|key| index.get(key).copied());
        let ctx = LinkContext {
            global: global.map(|id| &nodes[id.0 as usize]),
            nodes: &nodes,
            by_kind: &by_kind,
        };

        let mut edges = BTreeSet::new();
        for link in links.iter() {
            let Some(children) = by_kind.get(&link.to) else { continue };
            let edge_type = link.edge_type();
            let mut produced = 0usize;
            for &child in children {
                for parent_key in link.parents_of(&ctx, &nodes[child.0 as usize]) {
                    if parent_key.group_kind != link.from {
                        continue;
                    }
                    if let Some(&parent) = index.get(&parent_key) {
                        if edges.insert(Edge::new(parent, child, edge_type.clone())) {
                            produced += 1;
                        }
                    }
                }
            }
            debug!(link = %edge_type, edges = produced, "evaluated link function");
        }

        let mut parents = vec![Adjacency::new(); nodes.len()];
        let mut children = vec![Adjacency::new(); nodes.len()];
        for edge in &edges {
            let p = &mut parents[edge.to.0 as usize];
            if !p.contains(&edge.from) {
                p.push(edge.from);
            }
            let c = &mut children[edge.from.0 as usize];
            if !c.contains(&edge.to) {
                c.push(edge.to);
            }
        }

        Self { nodes, index, by_kind, edges, parents, children, global }
    }

    // ========================================================================
    // Read contract
    // ========================================================================

    /// All nodes, sorted by (GroupKind, Namespace, Name).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn lookup(&self, key: &ObjectKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// All edges, ordered by (from, to, type).
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.parents[id.0 as usize]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.0 as usize]
    }

    pub fn nodes_of_kind(&self, gk: &GroupKind) -> &[NodeId] {
        self.by_kind.get(gk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn global(&self) -> Option<NodeId> {
        self.global
    }

    /// Direct children of `parent` with the given kind.
    pub fn children_of_kind<'a>(&'a self, parent: NodeId, gk: &'a GroupKind) -> impl Iterator<Item = NodeId> + 'a {
        self.children(parent)
            .iter()
            .copied()
            .filter(move |&id| self.node(id).is_kind(gk))
    }

    /// Lowest-level routing scopes: every route rule.
    pub fn leaves(&self) -> &[NodeId] {
        self.nodes_of_kind(&kinds::HTTP_ROUTE_RULE)
    }

    /// Leaves reachable downward from `id` (including `id` itself if it is a
    /// leaf), in ascending id order.
    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        let mut leaves = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if self.node(current).is_kind(&kinds::HTTP_ROUTE_RULE) {
                leaves.push(current);
            }
            queue.extend(self.children(current).iter().copied());
        }
        leaves.sort();
        leaves
    }
}

/// Pick the global-config singleton: the oldest Kuadrant object, ties broken
/// by key. Objects without a timestamp sort after timestamped ones.
pub fn select_global(snapshot: &Snapshot) -> Option<ObjectKey> {
    let kuadrant = kinds::KUADRANT;
    let mut candidates: Vec<&Object> = snapshot.of_kind(&kuadrant).collect();
    candidates.sort_by(|a, b| {
        let ta = (a.creation_timestamp.is_none(), a.creation_timestamp);
        let tb = (b.creation_timestamp.is_none(), b.creation_timestamp);
        ta.cmp(&tb).then_with(|| a.key.cmp(&b.key))
    });
    if candidates.len() > 1 {
        warn!(
            selected = %candidates[0].key,
            ignored = candidates.len() - 1,
            "more than one global config object, using the oldest"
        );
    }
    candidates.first().map(|obj| obj.key.clone())
}

// ============================================================================
// Ingestion
// ============================================================================

fn ingest(snapshot: &Snapshot) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(snapshot.len());
    for obj in snapshot.objects() {
        let node = Node::from_object(obj.clone());
        if node.is_kind(&kinds::GATEWAY) {
            nodes.extend(expand_sections(&node, "/listeners", kinds::LISTENER, |_| None));
        } else if node.is_kind(&kinds::HTTP_ROUTE) {
            nodes.extend(expand_sections(&node, "/rules", kinds::HTTP_ROUTE_RULE, |i| {
                Some(format!("rule-{}", i + 1))
            }));
        }
        nodes.push(node);
    }

    nodes.sort_by(|a, b| a.key.cmp(&b.key));
    nodes.dedup_by(|later, earlier| {
        let duplicate = later.key == earlier.key;
        if duplicate {
            warn!(key = %later.key, "duplicate section name, keeping the first declaration");
        }
        duplicate
    });
    nodes
}

/// One node per entry of the owner's `pointer` array. Entries without a
/// `name` take `fallback(index)` or are skipped when that yields `None`.
fn expand_sections(
    owner: &Node,
    pointer: &str,
    gk: GroupKind,
    fallback: impl Fn(usize) -> Option<String>,
) -> Vec<Node> {
    let Some(entries) = owner.spec_field(pointer).and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let name = entry
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
                .or_else(|| fallback(i))?;
            Some(Node::section(owner, gk.clone(), &name, entry.clone()))
        })
        .collect()
}
