//! Policy objects and their status conditions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupKind, NamespacedName, Node, ObjectKey};

/// A policy's reference to the object (and optional sub-scope) it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl TargetRef {
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.clone(), self.kind.clone())
    }
}

/// Whether a policy wins over narrower scopes or only fills in for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Override,
    Default,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Override => write!(f, "override"),
            Strategy::Default => write!(f, "default"),
        }
    }
}

/// A policy parsed from its node.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub key: ObjectKey,
    pub target_ref: TargetRef,
    pub strategy: Strategy,
    /// The `overrides` / `defaults` block, or the top-level spec minus
    /// `targetRef` when neither is given (implicit default).
    pub rules: serde_json::Value,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// Why a policy document could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyParseError {
    #[error("spec.targetRef is missing")]
    MissingTargetRef,

    #[error("spec.targetRef is malformed: {0}")]
    MalformedTargetRef(String),

    #[error("spec must be an object")]
    NotAnObject,

    #[error("overrides and defaults are mutually exclusive")]
    OverridesAndDefaults,

    #[error("implicit defaults cannot be combined with spec.{0}")]
    ImplicitAndExplicit(&'static str),
}

impl Policy {
    pub fn from_node(node: &Node) -> Result<Self, PolicyParseError> {
        let spec = node.spec.as_object().ok_or(PolicyParseError::NotAnObject)?;

        let raw_target = spec.get("targetRef").ok_or(PolicyParseError::MissingTargetRef)?;
        let target_ref: TargetRef = serde_json::from_value(raw_target.clone())
            .map_err(|e| PolicyParseError::MalformedTargetRef(e.to_string()))?;

        let overrides = spec.get("overrides");
        let defaults = spec.get("defaults");
        let mut implicit = spec.clone();
        implicit.remove("targetRef");
        implicit.remove("overrides");
        implicit.remove("defaults");

        let (strategy, rules) = match (overrides, defaults) {
            (Some(_), Some(_)) => return Err(PolicyParseError::OverridesAndDefaults),
            (Some(block), None) => {
                if !implicit.is_empty() {
                    return Err(PolicyParseError::ImplicitAndExplicit("overrides"));
                }
                (Strategy::Override, block.clone())
            }
            (None, Some(block)) => {
                if !implicit.is_empty() {
                    return Err(PolicyParseError::ImplicitAndExplicit("defaults"));
                }
                (Strategy::Default, block.clone())
            }
            (None, None) => (Strategy::Default, serde_json::Value::Object(implicit)),
        };

        Ok(Self {
            key: node.key.clone(),
            target_ref,
            strategy,
            rules,
            creation_timestamp: node.creation_timestamp,
        })
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        self.key.namespaced_name()
    }

    pub fn kind(&self) -> &str {
        &self.key.group_kind.kind
    }
}

// ============================================================================
// Status conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionType {
    Accepted,
    Enforced,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::Accepted => write!(f, "Accepted"),
            ConditionType::Enforced => write!(f, "Enforced"),
        }
    }
}

/// Reason surfaced in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    Accepted,
    Enforced,
    TargetNotFound,
    Invalid,
    Conflicted,
    Overridden,
    Unknown,
    NoRoutes,
    OutOfSync,
    MissingDependency,
    MissingResource,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: bool,
    pub reason: Reason,
    pub message: String,
}

impl Condition {
    pub fn new(condition_type: ConditionType, status: bool, reason: Reason, message: impl Into<String>) -> Self {
        Self { condition_type, status, reason, message: message.into() }
    }
}
