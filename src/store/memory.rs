//! In-memory store.
//!
//! Reference implementation of all three collaborator traits, using simple
//! maps protected by `RwLock`.
//!
//! ## Limitations
//!
//! - **No watches**: callers announce changes to the reconciler themselves.
//! - **No resource versions**: writes always succeed and replace.
//!
//! Use this store for:
//! - Testing the topology, resolver, merge engine and compiler end to end
//! - Embedding the core where objects come from somewhere other than an API server

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::*;
use super::{EnforcementSink, ResourceStore, StatusWriter, StoreError};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory object store and write sink.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: RwLock<BTreeMap<GroupKind, BTreeMap<ObjectKey, Object>>>,
    uninstalled: RwLock<BTreeSet<GroupKind>>,
    statuses: RwLock<HashMap<ObjectKey, Vec<Condition>>>,
    descriptors: RwLock<BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>>,
    /// Limitador object whose `spec.limits` mirrors the descriptor sink.
    mirror: RwLock<Option<ObjectKey>>,
    status_writes: AtomicU64,
    descriptor_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object.
    pub fn apply(&self, obj: Object) {
        let mut objects = self.inner.objects.write();
        objects
            .entry(obj.key.group_kind.clone())
            .or_default()
            .insert(obj.key.clone(), obj);
    }

    /// Delete an object. Returns true if it existed.
    pub fn delete(&self, key: &ObjectKey) -> bool {
        let mut objects = self.inner.objects.write();
        objects
            .get_mut(&key.group_kind)
            .and_then(|by_key| by_key.remove(key))
            .is_some()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Object> {
        self.inner.objects.read().get(&key.group_kind)?.get(key).cloned()
    }

    /// Make `list` report the kind as not installed.
    pub fn uninstall(&self, gk: GroupKind) {
        self.inner.uninstalled.write().insert(gk);
    }

    /// Copy every descriptor written to the sink into `spec.limits` of the
    /// given Limitador object, the way the Limitador operator would.
    pub fn mirror_limits_into(&self, limitador: ObjectKey) {
        *self.inner.mirror.write() = Some(limitador);
    }

    pub fn status(&self, policy: &ObjectKey) -> Option<Vec<Condition>> {
        self.inner.statuses.read().get(policy).cloned()
    }

    pub fn descriptors(&self) -> BTreeMap<NamespacedName, Vec<EnforcementDescriptor>> {
        self.inner.descriptors.read().clone()
    }

    pub fn status_writes(&self) -> u64 {
        self.inner.status_writes.load(Ordering::Relaxed)
    }

    pub fn descriptor_writes(&self) -> u64 {
        self.inner.descriptor_writes.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Collaborator impls
// ============================================================================

impl ResourceStore for MemoryStore {
    fn list(&self, group_kind: &GroupKind) -> Result<Vec<Object>, StoreError> {
        if self.inner.uninstalled.read().contains(group_kind) {
            return Err(StoreError::KindNotInstalled(group_kind.clone()));
        }
        Ok(self
            .inner
            .objects
            .read()
            .get(group_kind)
            .map(|by_key| by_key.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl StatusWriter for MemoryStore {
    fn write_status(&self, policy: &ObjectKey, conditions: &[Condition]) -> Result<(), StoreError> {
        self.inner.status_writes.fetch_add(1, Ordering::Relaxed);
        self.inner.statuses.write().insert(policy.clone(), conditions.to_vec());
        Ok(())
    }
}

impl EnforcementSink for MemoryStore {
    fn replace_descriptors(
        &self,
        descriptors: &BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>,
    ) -> Result<(), StoreError> {
        self.inner.descriptor_writes.fetch_add(1, Ordering::Relaxed);
        *self.inner.descriptors.write() = descriptors.clone();

        let mirror = self.inner.mirror.read().clone();
        if let Some(key) = mirror {
            let mut obj = self
                .get(&key)
                .ok_or_else(|| StoreError::Rejected(format!("{key} does not exist")))?;
            let flat: Vec<&EnforcementDescriptor> = descriptors.values().flatten().collect();
            let limits = serde_json::to_value(flat).map_err(|e| StoreError::Rejected(e.to_string()))?;
            match obj.spec.as_object_mut() {
                Some(spec) => {
                    spec.insert("limits".into(), limits);
                }
                None => obj.spec = serde_json::json!({ "limits": limits }),
            }
            self.apply(obj);
        }
        Ok(())
    }
}
