//! Node in the topology graph.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{kinds, GroupKind, Object, ObjectKey};

/// Opaque node identifier, valid for the topology that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    Infrastructure,
    Policy,
    EnforcementComponent,
}

impl NodeCategory {
    pub fn of(gk: &GroupKind) -> Self {
        if kinds::is_policy(gk) {
            NodeCategory::Policy
        } else if kinds::is_enforcement_component(gk) {
            NodeCategory::EnforcementComponent
        } else {
            NodeCategory::Infrastructure
        }
    }
}

/// A node in the topology.
///
/// Every object is normalized into this shape once, at ingestion. Link
/// functions and the merge engine only go through the accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: ObjectKey,
    pub category: NodeCategory,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub spec: serde_json::Value,
    pub status: serde_json::Value,
    /// Declaring object for expanded sub-scopes, else the first owner reference.
    pub owner: Option<ObjectKey>,
    /// Section name for expanded sub-scopes.
    pub section_name: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl Node {
    /// Normalize a store object. The first owner reference, resolved in the
    /// object's namespace, becomes the node's owner.
    pub fn from_object(obj: Object) -> Self {
        let category = NodeCategory::of(&obj.key.group_kind);
        let owner = obj
            .owner_refs
            .first()
            .map(|o| ObjectKey::new(o.group_kind.clone(), obj.key.namespace.clone(), o.name.clone()));
        Self {
            key: obj.key,
            category,
            labels: obj.labels,
            annotations: obj.annotations,
            spec: obj.spec,
            status: obj.status,
            owner,
            section_name: None,
            creation_timestamp: obj.creation_timestamp,
        }
    }

    /// A sub-scope declared inside `owner`'s spec, named `<owner>#<section>`.
    pub fn section(owner: &Node, group_kind: GroupKind, section: &str, spec: serde_json::Value) -> Self {
        Self {
            key: ObjectKey::new(
                group_kind,
                owner.key.namespace.clone(),
                format!("{}#{}", owner.key.name, section),
            ),
            category: NodeCategory::Infrastructure,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec,
            status: serde_json::Value::Null,
            owner: Some(owner.key.clone()),
            section_name: Some(section.to_owned()),
            creation_timestamp: owner.creation_timestamp,
        }
    }

    pub fn group_kind(&self) -> &GroupKind {
        &self.key.group_kind
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn is_kind(&self, gk: &GroupKind) -> bool {
        self.key.group_kind == *gk
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// JSON-pointer lookup into the spec document (`/parentRefs/0/name`).
    pub fn spec_field(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.spec.pointer(pointer)
    }

    /// String-valued spec field; anything else reads as absent.
    pub fn spec_str(&self, pointer: &str) -> Option<&str> {
        self.spec_field(pointer).and_then(serde_json::Value::as_str)
    }

    pub fn status_field(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.status.pointer(pointer)
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    pub fn owner(&self) -> Option<&ObjectKey> {
        self.owner.as_ref()
    }
}
