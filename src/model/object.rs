//! Store records and their identities.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API group + kind pair.
///
/// Uses `Cow<'static, str>` so the well-known kinds in [`super::kinds`] can be
/// `const` while kinds read from policy documents stay owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: Cow<'static, str>,
    pub kind: Cow<'static, str>,
}

impl GroupKind {
    pub const fn from_static(group: &'static str, kind: &'static str) -> Self {
        Self { group: Cow::Borrowed(group), kind: Cow::Borrowed(kind) }
    }

    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: Cow::Owned(group.into()), kind: Cow::Owned(kind.into()) }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Namespace/name pair identifying a namespaced object within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Globally unique object identity: (Group, Kind, Namespace, Name).
///
/// Ordering follows that tuple, which is also the export sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub group_kind: GroupKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(group_kind: GroupKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { group_kind, namespace: namespace.into(), name: name.into() }
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_kind, self.namespaced_name())
    }
}

/// Reference from an object to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub group_kind: GroupKind,
    pub name: String,
}

/// An object as returned by the resource store.
///
/// Only the fields the core links and merges on are kept; the spec and status
/// documents stay opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub key: ObjectKey,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub owner_refs: Vec<OwnerRef>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl Object {
    pub fn new(group_kind: GroupKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: ObjectKey::new(group_kind, namespace, name),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec: serde_json::Value::Null,
            status: serde_json::Value::Null,
            owner_refs: Vec::new(),
            creation_timestamp: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_status(mut self, status: serde_json::Value) -> Self {
        self.status = status;
        self
    }

    pub fn with_owner(mut self, group_kind: GroupKind, name: impl Into<String>) -> Self {
        self.owner_refs.push(OwnerRef { group_kind, name: name.into() });
        self
    }

    pub fn created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(ts);
        self
    }
}
