//! End-to-end tests for the DOT export.
//!
//! Builds a realistic topology, renders it, and checks that every node and
//! every edge appears exactly once and in a stable order.

use policy_topology::export::{export_dot, to_dot};
use policy_topology::topology::select_global;
use policy_topology::{kinds, LinkRegistry, Object, ReconcilerConfig, Snapshot, Topology};
use pretty_assertions::assert_eq;
use serde_json::json;

fn topology(reverse: bool) -> Topology {
    let mut objects = vec![
        Object::new(kinds::KUADRANT, "kuadrant-system", "kuadrant"),
        Object::new(kinds::LIMITADOR, "kuadrant-system", "limitador"),
        Object::new(kinds::GATEWAY_CLASS, "", "istio"),
        Object::new(kinds::GATEWAY, "ns", "gw").with_spec(json!({
            "gatewayClassName": "istio",
            "listeners": [{"name": "http"}, {"name": "https"}]
        })),
        Object::new(kinds::HTTP_ROUTE, "ns", "route").with_spec(json!({
            "parentRefs": [{"name": "gw"}],
            "rules": [{}, {}]
        })),
        Object::new(kinds::RATE_LIMIT_POLICY, "ns", "rlp").with_spec(json!({
            "targetRef": {"kind": "Gateway", "name": "gw"}
        })),
    ];
    if reverse {
        objects.reverse();
    }
    let snapshot = Snapshot::from_objects(objects);
    Topology::build(&snapshot, select_global(&snapshot).as_ref(), &LinkRegistry::builtin(&ReconcilerConfig::default()))
}

fn node_lines(dot: &str) -> Vec<&str> {
    dot.lines().filter(|l| l.contains("[label=") && !l.contains("->")).collect()
}

fn edge_lines(dot: &str) -> Vec<&str> {
    dot.lines().filter(|l| l.contains(" -> ")).collect()
}

#[test]
fn test_every_node_and_edge_once() {
    let topo = topology(false);
    let dot = to_dot(&topo).unwrap();

    assert!(dot.starts_with("digraph topology {\n"));
    assert!(dot.trim_end().ends_with('}'));
    assert_eq!(node_lines(&dot).len(), topo.node_count());
    assert_eq!(edge_lines(&dot).len(), topo.edge_count());

    for node in topo.nodes() {
        let id = format!("  \"{}\" [", node.key);
        assert_eq!(dot.matches(&id).count(), 1, "{id}");
    }
}

#[test]
fn test_nodes_sorted_by_kind_namespace_name() {
    let topo = topology(false);
    let dot = to_dot(&topo).unwrap();

    let mut keys: Vec<_> = topo.nodes().iter().map(|n| n.key.clone()).collect();
    keys.sort();
    let expected: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
    let rendered: Vec<String> = node_lines(&dot)
        .iter()
        .map(|l| l.trim().split(" [").next().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(rendered, expected);
}

#[test]
fn test_edges_are_labelled_by_type() {
    let dot = to_dot(&topology(false)).unwrap();
    assert!(dot.contains(
        "  \"Gateway.gateway.networking.k8s.io:ns/gw\" -> \"Listener.gateway.networking.k8s.io:ns/gw#http\" [label=\"Gateway->Listener\"];"
    ));
    assert!(dot.contains("[label=\"Kuadrant->Limitador\"]"));
    assert!(dot.contains(
        "  \"Gateway.gateway.networking.k8s.io:ns/gw\" -> \"RateLimitPolicy.kuadrant.io:ns/rlp\" [label=\"Gateway->RateLimitPolicy\"];"
    ));
    assert!(dot.contains("shape=note"));
}

#[test]
fn test_rendering_is_stable() {
    assert_eq!(to_dot(&topology(false)).unwrap(), to_dot(&topology(true)).unwrap());
}

#[test]
fn test_export_to_writer() {
    let topo = topology(false);
    let mut buf = Vec::new();
    export_dot(&topo, &mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), to_dot(&topo).unwrap());
}
