//! Built-in link functions.
//!
//! ```text
//! Kuadrant ─┬─> GatewayClass ─> Gateway ─> Listener ─> HTTPRoute ─> HTTPRouteRule
//!           ├─> Limitador        (same namespace, well-known name)
//!           ├─> Authorino        (same namespace, well-known name)
//!           └─> ServiceMonitor / PodMonitor   (observability label == "true")
//!
//! Gateway | Listener | HTTPRoute | HTTPRouteRule ─> RateLimitPolicy / AuthPolicy
//!                                                  (spec.targetRef, policy's namespace)
//! ```
//!
//! Every resolver treats missing or mistyped fields as "no parent".

use crate::config::ReconcilerConfig;
use crate::model::{kinds, GroupKind, Node, ObjectKey};
use super::link::{LinkContext, LinkFunction, LinkRegistry};

impl LinkRegistry {
    /// Structural Gateway API links plus the global-config links.
    pub fn builtin(config: &ReconcilerConfig) -> Self {
        let mut registry = LinkRegistry::new()
            .with(gateway_class_to_gateway())
            .with(gateway_to_listener())
            .with(listener_to_http_route())
            .with(http_route_to_rule())
            .with(kuadrant_to_gateway_classes())
            .with(kuadrant_to_limitador(&config.limitador_name))
            .with(kuadrant_to_authorino(&config.authorino_name))
            .with(kuadrant_to_monitor(kinds::SERVICE_MONITOR, &config.observability_label))
            .with(kuadrant_to_monitor(kinds::POD_MONITOR, &config.observability_label));

        for policy in [kinds::RATE_LIMIT_POLICY, kinds::AUTH_POLICY] {
            for target in [kinds::GATEWAY, kinds::LISTENER, kinds::HTTP_ROUTE, kinds::HTTP_ROUTE_RULE] {
                registry = registry.with(target_to_policy(target, policy.clone()));
            }
        }
        registry
    }
}

// ============================================================================
// Gateway API structure
// ============================================================================

pub fn gateway_class_to_gateway() -> LinkFunction {
    LinkFunction::new(kinds::GATEWAY_CLASS, kinds::GATEWAY, |_, gateway| {
        gateway
            .spec_str("/gatewayClassName")
            .map(|class| vec![ObjectKey::new(kinds::GATEWAY_CLASS, "", class)])
            .unwrap_or_default()
    })
}

pub fn gateway_to_listener() -> LinkFunction {
    LinkFunction::new(kinds::GATEWAY, kinds::LISTENER, |_, listener| owned_by(listener, &kinds::GATEWAY))
}

/// Routes attach through `spec.parentRefs`. A `sectionName` narrows the
/// attachment to one listener; otherwise every listener of the gateway is a
/// parent.
pub fn listener_to_http_route() -> LinkFunction {
    LinkFunction::new(kinds::LISTENER, kinds::HTTP_ROUTE, |ctx, route| {
        let Some(refs) = route.spec_field("/parentRefs").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        let mut parents = Vec::new();
        for parent_ref in refs {
            let kind = parent_ref.get("kind").and_then(|v| v.as_str()).unwrap_or("Gateway");
            let group = parent_ref
                .get("group")
                .and_then(|v| v.as_str())
                .unwrap_or(kinds::GATEWAY_API_GROUP);
            if kind != kinds::GATEWAY.kind || group != kinds::GATEWAY_API_GROUP {
                continue;
            }
            let Some(name) = parent_ref.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let namespace = parent_ref
                .get("namespace")
                .and_then(|v| v.as_str())
                .unwrap_or(route.namespace());
            let gateway = ObjectKey::new(kinds::GATEWAY, namespace, name);

            match parent_ref.get("sectionName").and_then(|v| v.as_str()) {
                Some(section) => {
                    parents.push(ObjectKey::new(kinds::LISTENER, namespace, format!("{name}#{section}")));
                }
                None => parents.extend(
                    ctx.nodes_of_kind(&kinds::LISTENER)
                        .filter(|listener| listener.owner() == Some(&gateway))
                        .map(|listener| listener.key.clone()),
                ),
            }
        }
        parents
    })
}

pub fn http_route_to_rule() -> LinkFunction {
    LinkFunction::new(kinds::HTTP_ROUTE, kinds::HTTP_ROUTE_RULE, |_, rule| owned_by(rule, &kinds::HTTP_ROUTE))
}

fn owned_by(child: &Node, owner_kind: &GroupKind) -> Vec<ObjectKey> {
    child
        .owner()
        .filter(|owner| owner.group_kind == *owner_kind)
        .map(|owner| vec![owner.clone()])
        .unwrap_or_default()
}

// ============================================================================
// Policy attachment
// ============================================================================

/// Policies hang under the object their `spec.targetRef` names. A
/// `sectionName` points at the listener or route rule instead. One instance
/// per target kind; candidates of other kinds are dropped by the build.
pub fn target_to_policy(target: GroupKind, policy: GroupKind) -> LinkFunction {
    LinkFunction::new(target, policy, |_, node| policy_target(node).into_iter().collect())
}

fn policy_target(policy: &Node) -> Option<ObjectKey> {
    let group = policy
        .spec_str("/targetRef/group")
        .filter(|g| !g.is_empty())
        .unwrap_or(kinds::GATEWAY_API_GROUP);
    let kind = policy.spec_str("/targetRef/kind")?;
    let name = policy.spec_str("/targetRef/name")?;
    let gk = GroupKind::new(group, kind);

    match policy.spec_str("/targetRef/sectionName") {
        None => Some(ObjectKey::new(gk, policy.namespace(), name)),
        Some(section) if gk == kinds::GATEWAY => {
            Some(ObjectKey::new(kinds::LISTENER, policy.namespace(), format!("{name}#{section}")))
        }
        Some(section) if gk == kinds::HTTP_ROUTE => {
            Some(ObjectKey::new(kinds::HTTP_ROUTE_RULE, policy.namespace(), format!("{name}#{section}")))
        }
        Some(_) => None,
    }
}

// ============================================================================
// Global config
// ============================================================================

pub fn kuadrant_to_gateway_classes() -> LinkFunction {
    LinkFunction::new(kinds::KUADRANT, kinds::GATEWAY_CLASS, |ctx, _| global_parent(ctx))
}

pub fn kuadrant_to_limitador(name: &str) -> LinkFunction {
    let name = name.to_owned();
    LinkFunction::new(kinds::KUADRANT, kinds::LIMITADOR, move |ctx, limitador| {
        well_known_instance(ctx, limitador, &name)
    })
}

pub fn kuadrant_to_authorino(name: &str) -> LinkFunction {
    let name = name.to_owned();
    LinkFunction::new(kinds::KUADRANT, kinds::AUTHORINO, move |ctx, authorino| {
        well_known_instance(ctx, authorino, &name)
    })
}

pub fn kuadrant_to_monitor(monitor: GroupKind, label: &str) -> LinkFunction {
    let label = label.to_owned();
    LinkFunction::new(kinds::KUADRANT, monitor, move |ctx, child| {
        if child.label(&label) == Some("true") {
            global_parent(ctx)
        } else {
            Vec::new()
        }
    })
}

fn global_parent(ctx: &LinkContext<'_>) -> Vec<ObjectKey> {
    ctx.global().map(|global| vec![global.key.clone()]).unwrap_or_default()
}

fn well_known_instance(ctx: &LinkContext<'_>, child: &Node, name: &str) -> Vec<ObjectKey> {
    match ctx.global() {
        Some(global) if global.namespace() == child.namespace() && child.name() == name => {
            vec![global.key.clone()]
        }
        _ => Vec::new(),
    }
}
