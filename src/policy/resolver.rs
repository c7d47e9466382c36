//! Target resolution: policy → topology node.

use crate::model::{kinds, GroupKind, ObjectKey, Policy, NodeId};
use crate::topology::Topology;
use super::PolicyError;

/// Map the policy's target reference onto a node of `topology`.
///
/// Lookup is confined to the policy's own namespace. With a section name the
/// result is the listener or route-rule node; a target that exists but lacks
/// the section is reported exactly like a missing target, with the cause
/// attached.
pub fn resolve(policy: &Policy, topology: &Topology) -> Result<NodeId, PolicyError> {
    let target = &policy.target_ref;
    let group = if target.group.is_empty() { kinds::GATEWAY_API_GROUP } else { target.group.as_str() };
    let gk = GroupKind::new(group, target.kind.clone());

    let section_kind = if gk == kinds::GATEWAY {
        kinds::LISTENER
    } else if gk == kinds::HTTP_ROUTE {
        kinds::HTTP_ROUTE_RULE
    } else {
        return Err(PolicyError::Invalid {
            kind: policy.kind().to_owned(),
            cause: format!("{gk} is not a supported target kind"),
        });
    };

    let namespace = &policy.key.namespace;
    let not_found = |cause: Option<String>| PolicyError::TargetNotFound {
        kind: policy.kind().to_owned(),
        target: target.name.clone(),
        cause,
    };

    let object = topology
        .lookup(&ObjectKey::new(gk.clone(), namespace.clone(), target.name.clone()))
        .ok_or_else(|| not_found(None))?;

    let Some(section) = target.section_name.as_deref() else {
        return Ok(object);
    };

    topology
        .lookup(&ObjectKey::new(section_kind, namespace.clone(), format!("{}#{}", target.name, section)))
        .filter(|&id| topology.node(id).owner() == Some(&topology.node(object).key))
        .ok_or_else(|| {
            not_found(Some(format!("{} {} has no section named {}", gk.kind, target.name, section)))
        })
}
