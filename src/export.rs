//! DOT export of a topology, for observability.
//!
//! Every node is listed once and every edge once, in (GroupKind, Namespace,
//! Name) order, so two renderings of the same snapshot diff cleanly.
//!
//! ```text
//! Topology → export_dot() → `dot -Tsvg`, or a status field for humans
//! ```

use std::io::Write;

use crate::model::*;
use crate::topology::Topology;
use crate::Result;

/// Write `topology` as a Graphviz digraph.
pub fn export_dot(topology: &Topology, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "digraph topology {{")?;
    writeln!(writer, "  // nodes: {}", topology.node_count())?;
    writeln!(writer, "  // edges: {}", topology.edge_count())?;

    for node in topology.nodes() {
        writeln!(
            writer,
            "  {} [label={}, shape={}];",
            quote(&node.key.to_string()),
            label(&node.key.group_kind.kind, &node.key.namespaced_name().to_string()),
            shape(node.category),
        )?;
    }

    for edge in topology.edges() {
        writeln!(
            writer,
            "  {} -> {} [label={}];",
            quote(&topology.node(edge.from).key.to_string()),
            quote(&topology.node(edge.to).key.to_string()),
            quote(&edge.edge_type.to_string()),
        )?;
    }

    writeln!(writer, "}}")?;
    Ok(())
}

/// Convenience wrapper returning the rendering as a string.
pub fn to_dot(topology: &Topology) -> Result<String> {
    let mut buf = Vec::new();
    export_dot(topology, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn shape(category: NodeCategory) -> &'static str {
    match category {
        NodeCategory::Infrastructure => "box",
        NodeCategory::Policy => "note",
        NodeCategory::EnforcementComponent => "component",
    }
}

/// Quote a DOT identifier.
fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

/// Two-line node label: kind above namespace/name.
fn label(kind: &str, name: &str) -> String {
    format!("\"{}\\n{}\"", escape(kind), escape(name))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote("trailing\\"), "\"trailing\\\\\"");
    }

    #[test]
    fn test_label_keeps_line_break() {
        assert_eq!(label("Gateway", "ns/gw"), "\"Gateway\\nns/gw\"");
        assert_eq!(label("Gateway", "ns/a\\b"), "\"Gateway\\nns/a\\\\b\"");
    }

    #[test]
    fn test_shape() {
        assert_eq!(shape(NodeCategory::Policy), "note");
        assert_eq!(shape(NodeCategory::Infrastructure), "box");
    }
}
