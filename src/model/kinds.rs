//! Well-known group kinds.

use super::GroupKind;

pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
pub const KUADRANT_GROUP: &str = "kuadrant.io";

// Infrastructure
pub const GATEWAY_CLASS: GroupKind = GroupKind::from_static(GATEWAY_API_GROUP, "GatewayClass");
pub const GATEWAY: GroupKind = GroupKind::from_static(GATEWAY_API_GROUP, "Gateway");
pub const LISTENER: GroupKind = GroupKind::from_static(GATEWAY_API_GROUP, "Listener");
pub const HTTP_ROUTE: GroupKind = GroupKind::from_static(GATEWAY_API_GROUP, "HTTPRoute");
pub const HTTP_ROUTE_RULE: GroupKind = GroupKind::from_static(GATEWAY_API_GROUP, "HTTPRouteRule");

// Global config
pub const KUADRANT: GroupKind = GroupKind::from_static(KUADRANT_GROUP, "Kuadrant");

// Policies
pub const RATE_LIMIT_POLICY: GroupKind = GroupKind::from_static(KUADRANT_GROUP, "RateLimitPolicy");
pub const AUTH_POLICY: GroupKind = GroupKind::from_static(KUADRANT_GROUP, "AuthPolicy");

// Enforcement components
pub const LIMITADOR: GroupKind = GroupKind::from_static("limitador.kuadrant.io", "Limitador");
pub const AUTHORINO: GroupKind = GroupKind::from_static("operator.authorino.kuadrant.io", "Authorino");
pub const SERVICE_MONITOR: GroupKind = GroupKind::from_static("monitoring.coreos.com", "ServiceMonitor");
pub const POD_MONITOR: GroupKind = GroupKind::from_static("monitoring.coreos.com", "PodMonitor");

/// Kinds a resource store is asked for on every pass.
pub const OBSERVED: &[GroupKind] = &[
    KUADRANT,
    GATEWAY_CLASS,
    GATEWAY,
    HTTP_ROUTE,
    RATE_LIMIT_POLICY,
    AUTH_POLICY,
    LIMITADOR,
    AUTHORINO,
    SERVICE_MONITOR,
    POD_MONITOR,
];

/// Position of a kind in the routing hierarchy; higher is more specific.
///
/// Kinds outside the hierarchy have no level and cannot carry policies.
pub fn scope_level(gk: &GroupKind) -> Option<u8> {
    if *gk == GATEWAY_CLASS {
        Some(0)
    } else if *gk == GATEWAY {
        Some(1)
    } else if *gk == LISTENER {
        Some(2)
    } else if *gk == HTTP_ROUTE {
        Some(3)
    } else if *gk == HTTP_ROUTE_RULE {
        Some(4)
    } else {
        None
    }
}

pub fn is_policy(gk: &GroupKind) -> bool {
    *gk == RATE_LIMIT_POLICY || *gk == AUTH_POLICY
}

pub fn is_enforcement_component(gk: &GroupKind) -> bool {
    *gk == LIMITADOR || *gk == AUTHORINO || *gk == SERVICE_MONITOR || *gk == POD_MONITOR
}
