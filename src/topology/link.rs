//! Link functions: pure parent lookups that become topology edges.

use hashbrown::HashMap;

use crate::model::{EdgeType, GroupKind, Node, NodeId, ObjectKey};

/// Signature of a link resolver: given one child, return candidate parents.
pub type LinkFn = dyn Fn(&LinkContext<'_>, &Node) -> Vec<ObjectKey> + Send + Sync;

/// Read-only view handed to every link resolver during a build.
///
/// The global-config singleton travels here as a value; resolvers never
/// reach for process-wide state.
pub struct LinkContext<'a> {
    pub(crate) global: Option<&'a Node>,
    pub(crate) nodes: &'a [Node],
    pub(crate) by_kind: &'a HashMap<GroupKind, Vec<NodeId>>,
}

impl<'a> LinkContext<'a> {
    /// The global-config node, if one was observed.
    pub fn global(&self) -> Option<&'a Node> {
        self.global
    }

    pub fn nodes_of_kind(&self, gk: &GroupKind) -> impl Iterator<Item = &'a Node> + use<'a> {
        let nodes = self.nodes;
        let by_kind = self.by_kind;
        by_kind
            .get(gk)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |id| &nodes[id.0 as usize])
    }
}

/// A link between two kinds: `from` is the parent kind, `to` the child kind.
pub struct LinkFunction {
    pub from: GroupKind,
    pub to: GroupKind,
    func: Box<LinkFn>,
}

impl LinkFunction {
    pub fn new<F>(from: GroupKind, to: GroupKind, func: F) -> Self
    where
        F: Fn(&LinkContext<'_>, &Node) -> Vec<ObjectKey> + Send + Sync + 'static,
    {
        Self { from, to, func: Box::new(func) }
    }

    pub fn edge_type(&self) -> EdgeType {
        EdgeType { from: self.from.clone(), to: self.to.clone() }
    }

    pub fn parents_of(&self, ctx: &LinkContext<'_>, child: &Node) -> Vec<ObjectKey> {
        (self.func)(ctx, child)
    }
}

impl std::fmt::Debug for LinkFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkFunction")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Ordered set of link functions used for a build.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    links: Vec<LinkFunction>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, link: LinkFunction) -> Self {
        self.links.push(link);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkFunction> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
