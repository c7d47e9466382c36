//! # Reconciler
//!
//! One pass per policy kind:
//!
//! ```text
//! store ──acquire──> Snapshot ──build──> Topology
//!   ──parse/resolve──> Attachments ──merge──> outcomes + effective policies
//!   ──compile (rate limits)──> descriptors ──sync check──> final outcomes
//!   ──conditions──> statuses ──(generation unchanged?)──> writes
//! ```
//!
//! ## Concurrency
//!
//! `Reconciler` is `Sync`: passes for different kinds may run on different
//! threads against the same instance. Each pass captures the generation
//! counter when it starts; an [`Invalidator`] bumps it when a newer snapshot
//! is announced, and a pass that sees a bumped counter before writing
//! discards its results wholesale.
//!
//! ## Idempotence
//!
//! The last written descriptor set and per-policy conditions are cached;
//! a pass that would write the same thing again skips the write.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::ReconcilerConfig;
use crate::model::*;
use crate::policy::{conditions, merge, resolve, Attachment, PolicyError};
use crate::ratelimit;
use crate::store::{EnforcementSink, ResourceStore, Snapshot, StatusWriter};
use crate::topology::{select_global, LinkRegistry, Topology};
use crate::{Error, Result};

// ============================================================================
// Policy kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyKind {
    RateLimit,
    Auth,
}

impl PolicyKind {
    pub fn group_kind(self) -> GroupKind {
        match self {
            PolicyKind::RateLimit => kinds::RATE_LIMIT_POLICY,
            PolicyKind::Auth => kinds::AUTH_POLICY,
        }
    }

    /// Kind of the enforcement component that executes this policy kind.
    pub fn component(self) -> GroupKind {
        match self {
            PolicyKind::RateLimit => kinds::LIMITADOR,
            PolicyKind::Auth => kinds::AUTHORINO,
        }
    }

    fn component_name(self, config: &ReconcilerConfig) -> &str {
        match self {
            PolicyKind::RateLimit => &config.limitador_name,
            PolicyKind::Auth => &config.authorino_name,
        }
    }

    /// Kinds that must be installed for a pass of this kind to mean anything.
    fn dependencies(self) -> [GroupKind; 3] {
        [kinds::GATEWAY, kinds::HTTP_ROUTE, self.component()]
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.group_kind().kind)
    }
}

// ============================================================================
// Pass report
// ============================================================================

/// What a pass computed and what it wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Generation observed at pass start.
    pub generation: u64,
    /// policy → `[Accepted, Enforced]`.
    pub statuses: BTreeMap<ObjectKey, Vec<Condition>>,
    /// Compiled descriptors per enforced policy. Empty for auth passes.
    pub descriptors: BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>,
    /// Leaves with an effective policy.
    pub effective: usize,
    /// Leaves left without one by a same-level tie.
    pub conflicted: usize,
    /// A newer snapshot was announced mid-pass; nothing was written.
    pub discarded: bool,
    pub statuses_written: usize,
    pub statuses_skipped: usize,
    pub descriptors_written: bool,
}

impl PassReport {
    pub fn reason_of(&self, policy: &ObjectKey) -> Option<Reason> {
        self.statuses
            .get(policy)?
            .iter()
            .find(|c| c.condition_type == ConditionType::Enforced)
            .map(|c| c.reason)
    }
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Default)]
struct WriteCache {
    statuses: HashMap<ObjectKey, Vec<Condition>>,
    descriptors: Option<BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>>,
}

/// Handle that marks every in-flight pass as stale.
#[derive(Debug, Clone)]
pub struct Invalidator {
    generation: Arc<AtomicU64>,
}

impl Invalidator {
    /// Announce a newer snapshot. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct Reconciler<S, W, E> {
    store: S,
    status: W,
    sink: E,
    config: ReconcilerConfig,
    links: LinkRegistry,
    generation: Arc<AtomicU64>,
    cache: Mutex<WriteCache>,
}

impl<S, W, E> Reconciler<S, W, E>
where
    S: ResourceStore,
    W: StatusWriter,
    E: EnforcementSink,
{
    /// Reconciler using the built-in link functions for `config`.
    pub fn new(store: S, status: W, sink: E, config: ReconcilerConfig) -> Self {
        let links = LinkRegistry::builtin(&config);
        Self {
            store,
            status,
            sink,
            config,
            links,
            generation: Arc::new(AtomicU64::new(0)),
            cache: Mutex::new(WriteCache::default()),
        }
    }

    /// Replace the link functions used to build the topology.
    pub fn with_links(mut self, links: LinkRegistry) -> Self {
        self.links = links;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn invalidator(&self) -> Invalidator {
        Invalidator { generation: Arc::clone(&self.generation) }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Build the topology for the store's current contents.
    pub fn topology(&self) -> Result<Topology> {
        let snapshot = Snapshot::acquire(&self.store, kinds::OBSERVED)?;
        let global = select_global(&snapshot);
        Ok(Topology::build(&snapshot, global.as_ref(), &self.links))
    }

    /// Run one pass for `kind`.
    ///
    /// Only a failure to obtain the snapshot, or a rejected write, is an
    /// `Err`. Every per-policy failure ends up in the report's statuses.
    #[instrument(skip(self))]
    pub fn reconcile(&self, kind: PolicyKind) -> Result<PassReport> {
        let generation = self.generation();
        let snapshot = Snapshot::acquire(&self.store, kinds::OBSERVED)?;
        let global = select_global(&snapshot);
        let topology = Topology::build(&snapshot, global.as_ref(), &self.links);
        debug!(
            nodes = topology.node_count(),
            edges = topology.edge_count(),
            global = ?global,
            "topology built"
        );

        let mut report = PassReport { generation, ..PassReport::default() };
        let outcomes = self.evaluate(kind, &snapshot, &topology, &mut report);

        report.statuses = outcomes
            .iter()
            .map(|(key, outcome)| (key.clone(), conditions(&key.group_kind.kind, outcome).to_vec()))
            .collect();

        self.write(kind, report)
    }

    /// Compute every policy's terminal outcome. Fills the report's
    /// descriptors and merge counts along the way.
    fn evaluate(
        &self,
        kind: PolicyKind,
        snapshot: &Snapshot,
        topology: &Topology,
        report: &mut PassReport,
    ) -> BTreeMap<ObjectKey, std::result::Result<(), PolicyError>> {
        let kind_name = kind.to_string();
        let mut outcomes = BTreeMap::new();

        let mut policies = Vec::new();
        for &id in topology.nodes_of_kind(&kind.group_kind()) {
            let node = topology.node(id);
            match Policy::from_node(node) {
                Ok(policy) => policies.push(policy),
                Err(e) => {
                    debug!(policy = %node.key, error = %e, "unparseable policy");
                    outcomes.insert(
                        node.key.clone(),
                        Err(PolicyError::Invalid { kind: kind_name.clone(), cause: e.to_string() }),
                    );
                }
            }
        }

        let missing: Vec<String> = kind
            .dependencies()
            .iter()
            .filter(|gk| !snapshot.is_installed(gk))
            .map(|gk| gk.kind.to_string())
            .collect();
        if !missing.is_empty() {
            warn!(missing = ?missing, "dependencies not installed");
            let keys: Vec<ObjectKey> = policies.iter().map(|p| p.key.clone()).chain(outcomes.keys().cloned()).collect();
            for key in keys {
                outcomes.insert(key, Err(PolicyError::MissingDependency { dependencies: missing.clone() }));
            }
            return outcomes;
        }

        let mut attachments = Vec::with_capacity(policies.len());
        for policy in &policies {
            match resolve(policy, topology) {
                Ok(target) => attachments.push(Attachment { policy, target }),
                Err(e) => {
                    debug!(policy = %policy.key, error = %e, "target resolution failed");
                    outcomes.insert(policy.key.clone(), Err(e));
                }
            }
        }

        let merged = merge(topology, &attachments);
        report.effective = merged.effective.len();
        report.conflicted = merged.conflicted.len();
        let winners: BTreeSet<ObjectKey> = merged.winners().into_iter().cloned().collect();
        outcomes.extend(merged.outcomes);

        if kind == PolicyKind::RateLimit {
            self.compile(&policies, &winners, &mut outcomes, report);
        }

        self.check_component(kind, topology, &mut outcomes, &report.descriptors);

        info!(
            policies = outcomes.len(),
            enforced = outcomes.values().filter(|o| o.is_ok()).count(),
            effective = report.effective,
            conflicted = report.conflicted,
            "pass evaluated"
        );
        outcomes
    }

    /// Compile every rate-limit policy that is effective on at least one
    /// leaf, even when a tie elsewhere leaves it `Conflicted`. A rules block
    /// that does not deserialize makes the policy Invalid.
    fn compile(
        &self,
        policies: &[Policy],
        winners: &BTreeSet<ObjectKey>,
        outcomes: &mut BTreeMap<ObjectKey, std::result::Result<(), PolicyError>>,
        report: &mut PassReport,
    ) {
        for policy in policies {
            if !winners.contains(&policy.key)
                || matches!(outcomes.get(&policy.key), Some(Err(PolicyError::Invalid { .. })))
            {
                continue;
            }
            match ratelimit::parse_rules(&policy.rules) {
                Ok(spec) => {
                    let name = policy.namespaced_name();
                    let descriptors = ratelimit::compile(&name, &spec);
                    debug!(policy = %policy.key, descriptors = descriptors.len(), "compiled");
                    report.descriptors.insert(name, descriptors);
                }
                Err(e) => {
                    outcomes.insert(
                        policy.key.clone(),
                        Err(PolicyError::Invalid { kind: policy.kind().to_owned(), cause: e.to_string() }),
                    );
                }
            }
        }
    }

    /// Downgrade enforced outcomes whose enforcement component is absent or
    /// has not converged.
    fn check_component(
        &self,
        kind: PolicyKind,
        topology: &Topology,
        outcomes: &mut BTreeMap<ObjectKey, std::result::Result<(), PolicyError>>,
        descriptors: &BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>,
    ) {
        let component = kind.component();
        let name = kind.component_name(&self.config);
        let instance = topology.global().and_then(|global| {
            topology
                .children_of_kind(global, &component)
                .map(|id| topology.node(id))
                .find(|node| node.name() == name)
        });

        for (key, outcome) in outcomes.iter_mut() {
            if outcome.is_err() {
                continue;
            }
            let Some(instance) = instance else {
                *outcome = Err(PolicyError::MissingResource { resource: component.kind.to_string() });
                continue;
            };
            if kind != PolicyKind::RateLimit {
                continue;
            }
            let wanted = descriptors
                .get(&key.namespaced_name())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            match ratelimit::is_synced(instance, wanted) {
                Ok(true) => {}
                Ok(false) => {
                    *outcome = Err(PolicyError::OutOfSync {
                        kind: key.group_kind.kind.to_string(),
                        components: vec![component.kind.to_string()],
                    });
                }
                Err(cause) => {
                    *outcome = Err(PolicyError::Unknown { kind: key.group_kind.kind.to_string(), cause });
                }
            }
        }
    }

    /// Push the pass results out, unless the pass went stale.
    fn write(&self, kind: PolicyKind, mut report: PassReport) -> Result<PassReport> {
        let mut cache = self.cache.lock();

        let current = self.generation();
        if current != report.generation {
            info!(started = report.generation, current, "newer snapshot announced, discarding pass");
            report.discarded = true;
            return Ok(report);
        }

        if kind == PolicyKind::RateLimit {
            if cache.descriptors.as_ref() == Some(&report.descriptors) {
                debug!("descriptors unchanged, skipping write");
            } else {
                self.sink.replace_descriptors(&report.descriptors).map_err(Error::EnforcementWrite)?;
                cache.descriptors = Some(report.descriptors.clone());
                report.descriptors_written = true;
            }
        }

        let policy_kind = kind.group_kind();
        let live: BTreeSet<&ObjectKey> = report.statuses.keys().collect();
        cache
            .statuses
            .retain(|key, _| key.group_kind != policy_kind || live.contains(key));

        let mut failure = None;
        for (key, conditions) in &report.statuses {
            if cache.statuses.get(key) == Some(conditions) {
                report.statuses_skipped += 1;
                continue;
            }
            match self.status.write_status(key, conditions) {
                Ok(()) => {
                    cache.statuses.insert(key.clone(), conditions.clone());
                    report.statuses_written += 1;
                }
                Err(source) => {
                    warn!(policy = %key, error = %source, "status write failed");
                    if failure.is_none() {
                        failure = Some(Error::StatusWrite { policy: key.clone(), source });
                    }
                }
            }
        }
        debug!(
            written = report.statuses_written,
            skipped = report.statuses_skipped,
            "statuses written"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn reconciler(store: &MemoryStore) -> Reconciler<MemoryStore, MemoryStore, MemoryStore> {
        Reconciler::new(store.clone(), store.clone(), store.clone(), ReconcilerConfig::default())
    }

    #[test]
    fn test_policy_kind_names() {
        assert_eq!(PolicyKind::RateLimit.to_string(), "RateLimitPolicy");
        assert_eq!(PolicyKind::Auth.component(), kinds::AUTHORINO);
    }

    #[test]
    fn test_empty_store_writes_empty_descriptor_set_once() {
        let store = MemoryStore::new();
        let r = reconciler(&store);

        let first = r.reconcile(PolicyKind::RateLimit).unwrap();
        assert!(first.statuses.is_empty());
        assert!(first.descriptors_written);

        let second = r.reconcile(PolicyKind::RateLimit).unwrap();
        assert!(!second.descriptors_written);
        assert_eq!(store.descriptor_writes(), 1);
    }

    #[test]
    fn test_unparseable_policy_is_invalid() {
        let store = MemoryStore::new();
        store.apply(Object::new(kinds::RATE_LIMIT_POLICY, "ns", "p").with_spec(json!({"limits": {}})));
        let report = reconciler(&store).reconcile(PolicyKind::RateLimit).unwrap();

        let key = ObjectKey::new(kinds::RATE_LIMIT_POLICY, "ns", "p");
        assert_eq!(report.reason_of(&key), Some(Reason::Invalid));
        assert_eq!(store.status(&key).unwrap()[0].message, "RateLimitPolicy target is invalid: spec.targetRef is missing");
    }

    #[test]
    fn test_invalidator_bumps_generation() {
        let store = MemoryStore::new();
        let r = reconciler(&store);
        let handle = r.invalidator();
        assert_eq!(handle.invalidate(), 1);
        assert_eq!(r.generation(), 1);
    }
}
