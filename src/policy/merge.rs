//! Override/default merge across the routing hierarchy.
//!
//! For every leaf (route rule) the engine walks upward over all parent paths
//! and collects the policies attached along the way. Overrides beat defaults;
//! within the winning strategy the policy attached at the most specific level
//! (Gateway < Listener < HTTPRoute < HTTPRouteRule) wins. Two or more winners
//! at that level are a conflict and the leaf gets no effective policy.
//!
//! A policy's terminal outcome aggregates over every leaf it reaches, in
//! precedence order Invalid > Conflict > Enforced > Overridden; reaching no
//! leaf at all is NoRoutes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::model::{kinds, NamespacedName, NodeId, ObjectKey, Policy, Strategy};
use crate::topology::Topology;
use super::PolicyError;

/// A policy together with the node its target resolved to.
#[derive(Debug, Clone, Copy)]
pub struct Attachment<'a> {
    pub policy: &'a Policy,
    pub target: NodeId,
}

/// The policy selected for one leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePolicy {
    pub policy: ObjectKey,
    pub strategy: Strategy,
    pub rules: serde_json::Value,
    /// Every other policy that reached this leaf, in precedence order.
    pub superseded: Vec<NamespacedName>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    /// leaf → effective policy.
    pub effective: BTreeMap<ObjectKey, EffectivePolicy>,
    /// leaf → the tied policies that left it without an effective policy.
    pub conflicted: BTreeMap<ObjectKey, Vec<NamespacedName>>,
    /// policy → terminal outcome (`Ok` = enforced).
    pub outcomes: BTreeMap<ObjectKey, Result<(), PolicyError>>,
}

impl MergeResult {
    /// Policies that are effective on at least one leaf, whatever their
    /// aggregated outcome.
    pub fn winners(&self) -> BTreeSet<&ObjectKey> {
        self.effective.values().map(|e| &e.policy).collect()
    }
}

#[derive(Default)]
struct Tally {
    reached: bool,
    effective: bool,
    invalid: Option<String>,
    overridden_by: BTreeSet<usize>,
    conflicted_with: BTreeSet<usize>,
}

/// Deterministic order used whenever several policies are listed:
/// creation time (untimestamped last), then identity.
fn precedence(policy: &Policy) -> (bool, Option<DateTime<Utc>>, &ObjectKey) {
    (policy.creation_timestamp.is_none(), policy.creation_timestamp, &policy.key)
}

pub fn merge(topology: &Topology, attachments: &[Attachment<'_>]) -> MergeResult {
    let mut by_target: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (i, a) in attachments.iter().enumerate() {
        by_target.entry(a.target).or_default().push(i);
    }

    let level = |i: usize| {
        kinds::scope_level(topology.node(attachments[i].target).group_kind()).unwrap_or(0)
    };
    let sort = |ids: &mut Vec<usize>| {
        ids.sort_by(|&a, &b| precedence(attachments[a].policy).cmp(&precedence(attachments[b].policy)));
    };
    let names = |ids: &[usize]| -> Vec<NamespacedName> {
        ids.iter().map(|&i| attachments[i].policy.namespaced_name()).collect()
    };

    let mut tallies: Vec<Tally> = attachments.iter().map(|_| Tally::default()).collect();
    let mut result = MergeResult::default();

    for &leaf in topology.leaves() {
        let (path, cycle) = match ancestors(topology, leaf) {
            Ok(order) => (order, None),
            Err((order, cycle)) => (order, Some(cycle)),
        };

        let mut attached: Vec<usize> = path
            .iter()
            .filter_map(|node| by_target.get(node))
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if attached.is_empty() {
            continue;
        }
        sort(&mut attached);
        for &i in &attached {
            tallies[i].reached = true;
        }

        let leaf_key = &topology.node(leaf).key;

        if let Some(cycle) = &cycle {
            let rendered: Vec<String> = cycle.iter().map(|&id| topology.node(id).name().to_owned()).collect();
            let cause = format!("cycle in the routing hierarchy: {}", rendered.join(" -> "));
            debug!(leaf = %leaf_key, %cause, "cycle in hierarchy walk");
            for &i in &attached {
                tallies[i].invalid.get_or_insert_with(|| cause.clone());
            }
            continue;
        }

        let overrides: Vec<usize> = attached
            .iter()
            .copied()
            .filter(|&i| attachments[i].policy.strategy == Strategy::Override)
            .collect();
        let pool = if overrides.is_empty() { attached.clone() } else { overrides };

        let top = pool.iter().map(|&i| level(i)).max().unwrap_or(0);
        let winners: Vec<usize> = pool.into_iter().filter(|&i| level(i) == top).collect();
        let losers: Vec<usize> = attached.iter().copied().filter(|i| !winners.contains(i)).collect();

        for &l in &losers {
            tallies[l].overridden_by.extend(winners.iter().copied());
        }

        if let [winner] = winners[..] {
            tallies[winner].effective = true;
            let policy = attachments[winner].policy;
            result.effective.insert(
                leaf_key.clone(),
                EffectivePolicy {
                    policy: policy.key.clone(),
                    strategy: policy.strategy,
                    rules: policy.rules.clone(),
                    superseded: names(&losers),
                },
            );
        } else {
            debug!(leaf = %leaf_key, tied = winners.len(), "same-level conflict");
            for &w in &winners {
                tallies[w].conflicted_with.extend(winners.iter().copied().filter(|&o| o != w));
            }
            result.conflicted.insert(leaf_key.clone(), names(&winners));
        }
    }

    for (i, tally) in tallies.into_iter().enumerate() {
        let policy = attachments[i].policy;
        let kind = policy.kind().to_owned();
        let outcome = if let Some(cause) = tally.invalid {
            Err(PolicyError::Invalid { kind, cause })
        } else if !tally.reached {
            Err(PolicyError::NoRoutes { kind })
        } else if !tally.conflicted_with.is_empty() {
            let mut others: Vec<usize> = tally.conflicted_with.into_iter().collect();
            sort(&mut others);
            let target = topology.node(attachments[i].target);
            Err(PolicyError::Conflict {
                kind,
                conflicting: names(&others),
                cause: format!(
                    "{} policies at the same {} scope apply to the same routes",
                    policy.strategy,
                    target.group_kind().kind
                ),
            })
        } else if tally.effective {
            Ok(())
        } else {
            let mut winners: Vec<usize> = tally.overridden_by.into_iter().collect();
            sort(&mut winners);
            Err(PolicyError::Overridden { kind, winners: names(&winners) })
        };
        result.outcomes.insert(policy.key.clone(), outcome);
    }

    result
}

/// Every node above `leaf` (inclusive), in discovery order.
///
/// A node met again while still on the walk stack is a cycle. The walk still
/// visits every ancestor; the error carries the full discovery order and the
/// first offending path, closed by the repeated node.
fn ancestors(topology: &Topology, leaf: NodeId) -> Result<Vec<NodeId>, (Vec<NodeId>, Vec<NodeId>)> {
    let mut discovered: HashSet<NodeId> = HashSet::new();
    discovered.insert(leaf);
    let mut on_stack: HashSet<NodeId> = HashSet::new();
    on_stack.insert(leaf);
    let mut stack: Vec<(NodeId, usize)> = vec![(leaf, 0)];
    let mut order = vec![leaf];
    let mut cycle: Option<Vec<NodeId>> = None;

    while let Some(top) = stack.last_mut() {
        let node = top.0;
        let parents = topology.parents(node);
        if top.1 == parents.len() {
            on_stack.remove(&node);
            stack.pop();
            continue;
        }
        let parent = parents[top.1];
        top.1 += 1;

        if on_stack.contains(&parent) {
            if cycle.is_none() {
                let mut path: Vec<NodeId> = stack.iter().map(|&(n, _)| n).collect();
                path.push(parent);
                cycle = Some(path);
            }
            continue;
        }
        if discovered.insert(parent) {
            on_stack.insert(parent);
            order.push(parent);
            stack.push((parent, 0));
        }
    }

    match cycle {
        Some(cycle) => Err((order, cycle)),
        None => Ok(order),
    }
}
