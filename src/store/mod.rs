//! # Collaborator Contracts
//!
//! The core reads a snapshot from a [`ResourceStore`] and writes its results
//! to a [`StatusWriter`] and an [`EnforcementSink`]. Everything between those
//! calls is pure.
//!
//! ## Implementations
//!
//! | Collaborator | Module | Description |
//! |--------------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory store + sinks for testing/embedding |

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The kind is not served at all (its CRD is not installed).
    #[error("{0} is not installed")]
    KindNotInstalled(GroupKind),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Traits
// ============================================================================

/// Snapshot provider: all currently observed objects of a kind.
pub trait ResourceStore: Send + Sync {
    fn list(&self, group_kind: &GroupKind) -> std::result::Result<Vec<Object>, StoreError>;
}

/// Receives the terminal conditions of every processed policy.
pub trait StatusWriter: Send + Sync {
    fn write_status(
        &self,
        policy: &ObjectKey,
        conditions: &[Condition],
    ) -> std::result::Result<(), StoreError>;
}

/// Receives the full set of compiled descriptors, keyed by policy.
///
/// Every call replaces whatever the sink held before.
pub trait EnforcementSink: Send + Sync {
    fn replace_descriptors(
        &self,
        descriptors: &BTreeMap<NamespacedName, Vec<EnforcementDescriptor>>,
    ) -> std::result::Result<(), StoreError>;
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable set of objects observed at the start of a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    objects: BTreeMap<ObjectKey, Object>,
    missing_kinds: BTreeSet<GroupKind>,
}

impl Snapshot {
    /// List every kind in `kinds` from the store.
    ///
    /// A kind reported as not installed is recorded and skipped. Any other
    /// store failure means no consistent snapshot exists and fails the pass.
    pub fn acquire<S: ResourceStore + ?Sized>(store: &S, kinds: &[GroupKind]) -> Result<Self> {
        let mut snapshot = Snapshot::default();
        for gk in kinds {
            match store.list(gk) {
                Ok(objects) => {
                    debug!(kind = %gk, count = objects.len(), "listed objects");
                    for obj in objects {
                        snapshot.insert(obj);
                    }
                }
                Err(StoreError::KindNotInstalled(kind)) => {
                    debug!(kind = %kind, "kind not installed");
                    snapshot.missing_kinds.insert(kind);
                }
                Err(source) => {
                    return Err(Error::SnapshotUnavailable { kind: gk.clone(), source });
                }
            }
        }
        Ok(snapshot)
    }

    pub fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let mut snapshot = Snapshot::default();
        for obj in objects {
            snapshot.insert(obj);
        }
        snapshot
    }

    fn insert(&mut self, obj: Object) {
        if let Some(previous) = self.objects.insert(obj.key.clone(), obj) {
            warn!(key = %previous.key, "duplicate object in listing, keeping the last one");
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn of_kind<'a>(&'a self, gk: &'a GroupKind) -> impl Iterator<Item = &'a Object> + 'a {
        self.objects.values().filter(move |o| o.key.group_kind == *gk)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Object> {
        self.objects.get(key)
    }

    pub fn is_installed(&self, gk: &GroupKind) -> bool {
        !self.missing_kinds.contains(gk)
    }

    pub fn missing_kinds(&self) -> impl Iterator<Item = &GroupKind> {
        self.missing_kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl ResourceStore for FailingStore {
        fn list(&self, gk: &GroupKind) -> std::result::Result<Vec<Object>, StoreError> {
            if *gk == kinds::LIMITADOR {
                Err(StoreError::KindNotInstalled(gk.clone()))
            } else if *gk == kinds::HTTP_ROUTE {
                Err(StoreError::Unavailable("connection refused".into()))
            } else {
                Ok(vec![Object::new(gk.clone(), "ns", "x")])
            }
        }
    }

    #[test]
    fn test_missing_kind_is_recorded() {
        let snapshot =
            Snapshot::acquire(&FailingStore, &[kinds::GATEWAY, kinds::LIMITADOR]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_installed(&kinds::LIMITADOR));
        assert!(snapshot.is_installed(&kinds::GATEWAY));
    }

    #[test]
    fn test_unavailable_store_fails_the_pass() {
        let err = Snapshot::acquire(&FailingStore, &[kinds::GATEWAY, kinds::HTTP_ROUTE]).unwrap_err();
        assert!(matches!(err, Error::SnapshotUnavailable { .. }));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let snapshot = Snapshot::from_objects([
            Object::new(kinds::GATEWAY, "ns", "gw").with_label("v", "1"),
            Object::new(kinds::GATEWAY, "ns", "gw").with_label("v", "2"),
        ]);
        assert_eq!(snapshot.len(), 1);
        let gw = snapshot.get(&ObjectKey::new(kinds::GATEWAY, "ns", "gw")).unwrap();
        assert_eq!(gw.labels["v"], "2");
    }
}
