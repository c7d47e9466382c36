//! Per-policy outcomes.
//!
//! Every failure the resolver, merge engine or sync check can produce is one
//! of these variants, and each maps to exactly one [`Reason`]. Nothing else
//! reaches status reporting.

use crate::model::{NamespacedName, Reason};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("{kind} target {target} was not found{}", suffix(.cause))]
    TargetNotFound { kind: String, target: String, cause: Option<String> },

    #[error("{kind} target is invalid: {cause}")]
    Invalid { kind: String, cause: String },

    #[error("{kind} is conflicted by {}: {cause}", join(.conflicting))]
    Conflict { kind: String, conflicting: Vec<NamespacedName>, cause: String },

    #[error("{kind} is overridden{}", by(.winners))]
    Overridden { kind: String, winners: Vec<NamespacedName> },

    #[error("{kind} has encountered some issues: {cause}")]
    Unknown { kind: String, cause: String },

    #[error("{kind} is not in the path to any existing routes")]
    NoRoutes { kind: String },

    #[error("{kind} waiting for the following components to sync: [{}]", .components.join(", "))]
    OutOfSync { kind: String, components: Vec<String> },

    #[error("[{}] is not installed, please reconcile again once the dependency has been installed", .dependencies.join(", "))]
    MissingDependency { dependencies: Vec<String> },

    #[error("{resource} is not installed, please create resource")]
    MissingResource { resource: String },
}

fn suffix(cause: &Option<String>) -> String {
    cause.as_ref().map(|c| format!(": {c}")).unwrap_or_default()
}

fn join(names: &[NamespacedName]) -> String {
    names.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn by(winners: &[NamespacedName]) -> String {
    if winners.is_empty() {
        String::new()
    } else {
        format!(" by [{}]", join(winners))
    }
}

impl PolicyError {
    pub fn reason(&self) -> Reason {
        match self {
            PolicyError::TargetNotFound { .. } => Reason::TargetNotFound,
            PolicyError::Invalid { .. } => Reason::Invalid,
            PolicyError::Conflict { .. } => Reason::Conflicted,
            PolicyError::Overridden { .. } => Reason::Overridden,
            PolicyError::Unknown { .. } => Reason::Unknown,
            PolicyError::NoRoutes { .. } => Reason::NoRoutes,
            PolicyError::OutOfSync { .. } => Reason::OutOfSync,
            PolicyError::MissingDependency { .. } => Reason::MissingDependency,
            PolicyError::MissingResource { .. } => Reason::MissingResource,
        }
    }

    /// Whether the policy is rejected outright (Accepted=false) rather than
    /// accepted but not enforced.
    pub fn rejects(&self) -> bool {
        matches!(
            self,
            PolicyError::TargetNotFound { .. }
                | PolicyError::Invalid { .. }
                | PolicyError::Conflict { .. }
                | PolicyError::MissingDependency { .. }
        )
    }

    /// Retrying the pass later may clear this outcome without any change to
    /// the policy itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PolicyError::OutOfSync { .. })
    }
}
