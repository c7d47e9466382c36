//! # Policy Resolution
//!
//! ```text
//! Policy ──resolve()──> target node ──merge()──> leaf → effective policy
//!                                           └──> policy → outcome ──conditions()──> status
//! ```
//!
//! Both stages are pure queries over an immutable [`Topology`](crate::topology::Topology);
//! per-policy failures are values ([`PolicyError`]), never panics or aborts.

pub mod error;
pub mod resolver;
pub mod merge;
pub mod status;

pub use error::PolicyError;
pub use resolver::resolve;
pub use merge::{merge, Attachment, EffectivePolicy, MergeResult};
pub use status::conditions;
