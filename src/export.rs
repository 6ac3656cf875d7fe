//! Export types for serializing graph state.
//!
//! The triple model exports flat [`TripleRecord`]s; the property graph exports
//! a node-link document ([`NodeLinkGraph`]) that can also be rendered as
//! GraphML.

use serde::{Deserialize, Serialize};

use crate::entity::NodeKey;
use crate::graph::{EdgeAttributes, NodeAttributes};

/// What kind of RDF term sits in the object position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Uri,
    Literal,
    Bnode,
}

/// One statement of the triple model with full IRIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripleRecord {
    pub subject: String,
    pub predicate: String,
    /// IRI, blank node id or literal lexical form.
    pub object: String,
    pub object_type: ObjectKind,
    /// Literal datatype IRI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Property-graph node in the node-link document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkNode {
    pub id: NodeKey,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

/// Property-graph edge in the node-link document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkEdge {
    pub source: NodeKey,
    pub target: NodeKey,
    #[serde(flatten)]
    pub attributes: EdgeAttributes,
}

/// Node-link interchange document for the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<NodeLinkNode>,
    pub links: Vec<NodeLinkEdge>,
}

// ---------------------------------------------------------------------------
// GraphML
// ---------------------------------------------------------------------------

/// `(attribute name, GraphML type)` for node data keys.
const NODE_KEYS: &[(&str, &str)] = &[
    ("type", "string"),
    ("entity_id", "string"),
    ("title", "string"),
    ("definition", "string"),
    ("version", "long"),
    ("created_at", "string"),
    ("last_modified", "string"),
    ("primary_predicate", "string"),
    ("layer_id", "string"),
    ("domain_id", "string"),
    ("parent_term_id", "string"),
];

const EDGE_KEYS: &[(&str, &str)] = &[
    ("kind", "string"),
    ("predicate", "string"),
    ("relationship", "string"),
    ("relationship_id", "string"),
    ("created_at", "string"),
];

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn node_data(attrs: &NodeAttributes) -> Vec<(&'static str, String)> {
    let mut data = vec![
        ("type", attrs.kind.to_string()),
        ("entity_id", attrs.entity_id.clone()),
        ("title", attrs.title.clone()),
        ("version", attrs.version.to_string()),
    ];
    let optional = [
        ("definition", attrs.definition.clone()),
        ("created_at", attrs.created_at.map(|t| t.to_rfc3339())),
        ("last_modified", attrs.last_modified.map(|t| t.to_rfc3339())),
        ("primary_predicate", attrs.primary_predicate.clone()),
        ("layer_id", attrs.layer_id.clone()),
        ("domain_id", attrs.domain_id.clone()),
        ("parent_term_id", attrs.parent_term_id.clone()),
    ];
    data.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
    data
}

fn edge_data(attrs: &EdgeAttributes) -> Vec<(&'static str, String)> {
    let mut data = vec![
        ("kind", attrs.kind.as_str().to_string()),
        ("predicate", attrs.predicate.clone()),
        ("relationship", attrs.relationship.as_str().to_string()),
    ];
    if let Some(id) = &attrs.relationship_id {
        data.push(("relationship_id", id.clone()));
    }
    if let Some(ts) = attrs.created_at {
        data.push(("created_at", ts.to_rfc3339()));
    }
    data
}

fn push_data(out: &mut String, prefix: &str, data: &[(&'static str, String)]) {
    for (key, value) in data {
        out.push_str(&format!(
            "      <data key=\"{prefix}_{key}\">{}</data>\n",
            xml_escape(value)
        ));
    }
}

/// Render a node-link document as a GraphML file.
pub fn to_graphml(graph: &NodeLinkGraph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
         http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">\n",
    );
    for (name, ty) in NODE_KEYS {
        out.push_str(&format!(
            "  <key id=\"n_{name}\" for=\"node\" attr.name=\"{name}\" attr.type=\"{ty}\"/>\n"
        ));
    }
    for (name, ty) in EDGE_KEYS {
        out.push_str(&format!(
            "  <key id=\"e_{name}\" for=\"edge\" attr.name=\"{name}\" attr.type=\"{ty}\"/>\n"
        ));
    }
    let edgedefault = if graph.directed { "directed" } else { "undirected" };
    out.push_str(&format!("  <graph id=\"taxonomy\" edgedefault=\"{edgedefault}\">\n"));

    for node in &graph.nodes {
        out.push_str(&format!(
            "    <node id=\"{}\">\n",
            xml_escape(&node.id.to_string())
        ));
        push_data(&mut out, "n", &node_data(&node.attributes));
        out.push_str("    </node>\n");
    }
    for (i, link) in graph.links.iter().enumerate() {
        out.push_str(&format!(
            "    <edge id=\"e{i}\" source=\"{}\" target=\"{}\">\n",
            xml_escape(&link.source.to_string()),
            xml_escape(&link.target.to_string())
        ));
        push_data(&mut out, "e", &edge_data(&link.attributes));
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}
