//! End-to-end tests for target resolution and the override/default merge.
//!
//! Each test exercises: snapshot -> build -> resolve -> merge, using the
//! public pipeline functions directly rather than the reconciler.

use policy_topology::model::NamespacedName;
use policy_topology::policy::{merge, resolve, Attachment, MergeResult, PolicyError};
use policy_topology::topology::select_global;
use policy_topology::{kinds, LinkFunction, LinkRegistry, Node, Object, ObjectKey, Policy, ReconcilerConfig, Snapshot, Topology};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

/// gw (listeners http, https)
///   ├── route-a (both listeners, rules: login, rule-2)
///   └── route-b (https only, one rule)
fn objects() -> Vec<Object> {
    vec![
        Object::new(kinds::GATEWAY, "ns", "gw").with_spec(json!({
            "listeners": [{"name": "http"}, {"name": "https"}]
        })),
        Object::new(kinds::HTTP_ROUTE, "ns", "route-a").with_spec(json!({
            "parentRefs": [{"name": "gw"}],
            "rules": [{"name": "login"}, {}]
        })),
        Object::new(kinds::HTTP_ROUTE, "ns", "route-b").with_spec(json!({
            "parentRefs": [{"name": "gw", "sectionName": "https"}],
            "rules": [{}]
        })),
    ]
}

fn build(objects: Vec<Object>, links: &LinkRegistry) -> Topology {
    let snapshot = Snapshot::from_objects(objects);
    Topology::build(&snapshot, select_global(&snapshot).as_ref(), links)
}

fn builtin() -> LinkRegistry {
    LinkRegistry::builtin(&ReconcilerConfig::default())
}

fn policy(name: &str, block: &str, target: Value) -> Policy {
    let mut spec = json!({"targetRef": target});
    spec[block] = json!({"limits": {name: {"rates": [{"limit": 1, "duration": 1, "unit": "second"}]}}});
    let node = Node::from_object(Object::new(kinds::RATE_LIMIT_POLICY, "ns", name).with_spec(spec));
    Policy::from_node(&node).unwrap()
}

fn run(topo: &Topology, policies: &[Policy]) -> MergeResult {
    let attachments: Vec<Attachment<'_>> = policies
        .iter()
        .map(|p| Attachment { policy: p, target: resolve(p, topo).unwrap() })
        .collect();
    merge(topo, &attachments)
}

fn rule(route: &str, rule: &str) -> ObjectKey {
    ObjectKey::new(kinds::HTTP_ROUTE_RULE, "ns", format!("{route}#{rule}"))
}

fn effective_name<'a>(result: &'a MergeResult, leaf: &ObjectKey) -> Option<&'a str> {
    result.effective.get(leaf).map(|e| e.policy.name.as_str())
}

// ============================================================================
// 1. Resolution
// ============================================================================

#[test]
fn test_absent_gateway_is_target_not_found() {
    let topo = build(objects(), &builtin());
    let p = policy("p", "defaults", json!({"kind": "Gateway", "name": "missing"}));
    assert_eq!(
        resolve(&p, &topo),
        Err(PolicyError::TargetNotFound { kind: "RateLimitPolicy".into(), target: "missing".into(), cause: None })
    );
}

#[test]
fn test_missing_section_is_target_not_found_with_cause() {
    let topo = build(objects(), &builtin());
    let p = policy("p", "defaults", json!({"kind": "HTTPRoute", "name": "route-a", "sectionName": "logout"}));
    match resolve(&p, &topo) {
        Err(e @ PolicyError::TargetNotFound { cause: Some(_), .. }) => {
            assert!(e.to_string().contains("logout"), "{e}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_target_lookup_is_namespace_scoped() {
    let mut objs = objects();
    objs.push(Object::new(kinds::GATEWAY, "other", "elsewhere"));
    let topo = build(objs, &builtin());
    let p = policy("p", "defaults", json!({"kind": "Gateway", "name": "elsewhere"}));
    assert!(matches!(resolve(&p, &topo), Err(PolicyError::TargetNotFound { .. })));
}

#[test]
fn test_unsupported_target_kind_is_invalid() {
    let topo = build(objects(), &builtin());
    let p = policy("p", "defaults", json!({"group": "", "kind": "Service", "name": "gw"}));
    assert!(matches!(resolve(&p, &topo), Err(PolicyError::Invalid { .. })));
}

// ============================================================================
// 2. Override / default precedence
// ============================================================================

#[test]
fn test_gateway_default_and_route_override() {
    let topo = build(objects(), &builtin());
    let policies = vec![
        policy("gw-default", "defaults", json!({"kind": "Gateway", "name": "gw"})),
        policy("a-override", "overrides", json!({"kind": "HTTPRoute", "name": "route-a"})),
    ];
    let result = run(&topo, &policies);

    assert_eq!(effective_name(&result, &rule("route-a", "login")), Some("a-override"));
    assert_eq!(effective_name(&result, &rule("route-a", "rule-2")), Some("a-override"));
    assert_eq!(effective_name(&result, &rule("route-b", "rule-1")), Some("gw-default"));
    assert!(result.outcomes.values().all(Result::is_ok));
}

#[test]
fn test_gateway_override_beats_route_default() {
    let topo = build(objects(), &builtin());
    let policies = vec![
        policy("gw-override", "overrides", json!({"kind": "Gateway", "name": "gw"})),
        policy("b-default", "defaults", json!({"kind": "HTTPRoute", "name": "route-b"})),
    ];
    let result = run(&topo, &policies);

    assert_eq!(effective_name(&result, &rule("route-b", "rule-1")), Some("gw-override"));
    assert_eq!(
        result.outcomes[&policies[1].key],
        Err(PolicyError::Overridden {
            kind: "RateLimitPolicy".into(),
            winners: vec![NamespacedName::new("ns", "gw-override")],
        })
    );
    assert_eq!(
        result.outcomes[&policies[1].key].as_ref().unwrap_err().to_string(),
        "RateLimitPolicy is overridden by [ns/gw-override]"
    );
}

#[test]
fn test_rule_level_default_beats_route_default() {
    let topo = build(objects(), &builtin());
    let policies = vec![
        policy("route", "defaults", json!({"kind": "HTTPRoute", "name": "route-a"})),
        policy("login", "defaults", json!({"kind": "HTTPRoute", "name": "route-a", "sectionName": "login"})),
    ];
    let result = run(&topo, &policies);

    assert_eq!(effective_name(&result, &rule("route-a", "login")), Some("login"));
    assert_eq!(effective_name(&result, &rule("route-a", "rule-2")), Some("route"));
    assert_eq!(
        result.effective[&rule("route-a", "login")].superseded,
        vec![NamespacedName::new("ns", "route")]
    );
}

#[test]
fn test_sibling_overrides_conflict() {
    let topo = build(objects(), &builtin());
    let policies = vec![
        policy("first", "overrides", json!({"kind": "HTTPRoute", "name": "route-b"})),
        policy("second", "overrides", json!({"kind": "HTTPRoute", "name": "route-b"})),
        policy("gw-default", "defaults", json!({"kind": "Gateway", "name": "gw"})),
    ];
    let result = run(&topo, &policies);

    let leaf = rule("route-b", "rule-1");
    assert_eq!(result.effective.get(&leaf), None);
    assert_eq!(
        result.conflicted[&leaf],
        vec![NamespacedName::new("ns", "first"), NamespacedName::new("ns", "second")]
    );
    match &result.outcomes[&policies[0].key] {
        Err(e @ PolicyError::Conflict { conflicting, .. }) => {
            assert_eq!(conflicting, &vec![NamespacedName::new("ns", "second")]);
            assert!(e.to_string().starts_with("RateLimitPolicy is conflicted by ns/second"));
        }
        other => panic!("unexpected {other:?}"),
    }
    // still effective on route-a
    assert!(result.outcomes[&policies[2].key].is_ok());
}

#[test]
fn test_diamond_hierarchy_is_not_a_cycle() {
    // route-a hangs under both listeners; the gateway is reached twice
    let topo = build(objects(), &builtin());
    let policies = vec![policy("gw", "defaults", json!({"kind": "Gateway", "name": "gw"}))];
    let result = run(&topo, &policies);

    assert_eq!(result.effective.len(), 3);
    assert_eq!(result.outcomes[&policies[0].key], Ok(()));
}

// ============================================================================
// 3. Cycles
// ============================================================================

#[test]
fn test_cycle_makes_attached_policies_invalid() {
    // rule → gateway closes the loop gateway → listener → route → rule
    let links = builtin().with(LinkFunction::new(kinds::HTTP_ROUTE_RULE, kinds::GATEWAY, |ctx, gateway| {
        ctx.nodes_of_kind(&kinds::HTTP_ROUTE_RULE)
            .filter(|rule| rule.namespace() == gateway.namespace() && rule.name().starts_with("route-b"))
            .map(|rule| rule.key.clone())
            .collect()
    }));
    let topo = build(objects(), &links);
    let policies = vec![policy("gw", "defaults", json!({"kind": "Gateway", "name": "gw"}))];
    let result = run(&topo, &policies);

    match &result.outcomes[&policies[0].key] {
        Err(PolicyError::Invalid { cause, .. }) => assert!(cause.contains("cycle"), "{cause}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_cycle_invalidates_policies_on_branches_walked_earlier() {
    // route-b → gw#https closes the loop gw#https → route-b; route-a reaches
    // gw#http first, finishes that branch, then runs into the loop
    let links = builtin().with(LinkFunction::new(kinds::HTTP_ROUTE, kinds::LISTENER, |ctx, listener| {
        if listener.name() != "gw#https" {
            return Vec::new();
        }
        ctx.nodes_of_kind(&kinds::HTTP_ROUTE)
            .filter(|route| route.namespace() == listener.namespace() && route.name() == "route-b")
            .map(|route| route.key.clone())
            .collect()
    }));
    let topo = build(objects(), &links);
    let policies = vec![policy(
        "http-only",
        "overrides",
        json!({"kind": "Gateway", "name": "gw", "sectionName": "http"}),
    )];
    let result = run(&topo, &policies);

    assert!(result.effective.is_empty());
    match &result.outcomes[&policies[0].key] {
        Err(PolicyError::Invalid { cause, .. }) => assert!(cause.contains("route-b"), "{cause}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_merge_is_deterministic() {
    let topo = build(objects(), &builtin());
    let policies = vec![
        policy("gw-default", "defaults", json!({"kind": "Gateway", "name": "gw"})),
        policy("a", "overrides", json!({"kind": "HTTPRoute", "name": "route-a"})),
        policy("b", "overrides", json!({"kind": "HTTPRoute", "name": "route-a"})),
    ];
    let mut reversed = policies.clone();
    reversed.reverse();
    assert_eq!(run(&topo, &policies), run(&topo, &reversed));
}
