//! # Topology Model
//!
//! Plain data that crosses every boundary: store ↔ topology ↔ resolver ↔
//! merge engine ↔ compiler ↔ collaborators.
//!
//! Design rule: this module is pure data. Graph logic lives in `topology`.

pub mod kinds;
pub mod object;
pub mod node;
pub mod edge;
pub mod policy;
pub mod ratelimit;

pub use object::{GroupKind, NamespacedName, Object, ObjectKey, OwnerRef};
pub use node::{Node, NodeCategory, NodeId};
pub use edge::{Edge, EdgeType};
pub use policy::{
    Condition, ConditionType, Policy, PolicyParseError, Reason, Strategy, TargetRef,
};
pub use ratelimit::{Counter, EnforcementDescriptor, Limit, Rate, RateLimitSpec};
