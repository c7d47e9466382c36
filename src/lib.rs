//! # policy-topology: Gateway Policy Topology Core
//!
//! Builds a typed graph of gateway infrastructure, attaches policies to it,
//! decides which policy governs each route rule, and compiles effective
//! rate-limit policies into flat enforcement descriptors.
//!
//! ## Design Principles
//!
//! 1. **Rebuilt, not patched**: every pass builds a fresh [`Topology`] from a [`Snapshot`]
//! 2. **Plain DTOs**: `Object`, `Node`, `Edge`, `Policy` cross all boundaries
//! 3. **Pure pipeline**: resolve → merge → compile never touch I/O
//! 4. **Trait seams**: collaborators are [`ResourceStore`], [`StatusWriter`], [`EnforcementSink`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use policy_topology::{MemoryStore, PolicyKind, Reconciler, ReconcilerConfig};
//!
//! # fn example() -> policy_topology::Result<()> {
//! let store = MemoryStore::new();
//! let reconciler = Reconciler::new(store.clone(), store.clone(), store, ReconcilerConfig::default());
//!
//! let report = reconciler.reconcile(PolicyKind::RateLimit)?;
//! for (policy, conditions) in &report.statuses {
//!     println!("{policy}: {:?}", conditions);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Snapshot | `store` | Objects of every observed kind |
//! | Build | `topology` | Nodes + typed edges |
//! | Resolve | `policy::resolver` | Target node per policy |
//! | Merge | `policy::merge` | Effective policy per route rule, outcome per policy |
//! | Compile | `ratelimit` | Enforcement descriptors |
//! | Report | `reconciler` | Status conditions, descriptor writes |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod store;
pub mod topology;
pub mod policy;
pub mod ratelimit;
pub mod export;
pub mod config;
pub mod reconciler;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    kinds, Condition, EnforcementDescriptor, GroupKind, NamespacedName, Node, NodeId, Object,
    ObjectKey, Policy, Reason,
};

// ============================================================================
// Re-exports: Collaborators
// ============================================================================

pub use store::{EnforcementSink, MemoryStore, ResourceStore, Snapshot, StatusWriter, StoreError};

// ============================================================================
// Re-exports: Pipeline
// ============================================================================

pub use config::ReconcilerConfig;
pub use policy::PolicyError;
pub use reconciler::{Invalidator, PassReport, PolicyKind, Reconciler};
pub use topology::{LinkFunction, LinkRegistry, Topology};

// ============================================================================
// Error Types
// ============================================================================

/// Pass-level failures. Per-policy outcomes are [`PolicyError`] values and
/// never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("snapshot unavailable: listing {kind} failed: {source}")]
    SnapshotUnavailable {
        kind: GroupKind,
        #[source]
        source: StoreError,
    },

    #[error("status write for {policy} failed: {source}")]
    StatusWrite {
        policy: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("enforcement write failed: {0}")]
    EnforcementWrite(#[source] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
