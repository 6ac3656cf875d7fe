//! Property graph of the taxonomy.
//!
//! Uses `petgraph` for the graph structure and a `HashMap` for lookups by
//! [`NodeKey`]. Hierarchy edges always point child -> parent (domain -> layer,
//! term -> domain, term -> parent term); relationship edges point source ->
//! target. Parallel edges are kept, so a term pair can carry both a parent
//! edge and a relationship edge.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use petgraph::Direction as PetDirection;
use petgraph::algo::{connected_components, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::entity::{Entity, NodeKey};
use crate::error::{GraphError, GraphResult};
use crate::export::{NodeLinkEdge, NodeLinkGraph, NodeLinkNode, to_graphml};
use crate::snapshot::{BuildReport, Snapshot};

use super::{EdgeAttributes, EdgeKind, EdgeRelation, NodeAttributes};

/// Detailed view of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub key: NodeKey,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
    /// Edge counts; parallel edges count separately.
    pub in_degree: usize,
    pub out_degree: usize,
    /// Distinct neighbors, sorted.
    pub predecessors: Vec<NodeKey>,
    pub successors: Vec<NodeKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyGraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub is_directed: bool,
    /// Weak connectivity; an empty graph is not connected.
    pub is_connected: bool,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub weakly_connected_components: usize,
    pub strongly_connected_components: usize,
}

/// Interchange formats for the property graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Json,
    GraphMl,
}

impl GraphFormat {
    pub const SUPPORTED: &'static [&'static str] = &["json", "graphml"];
}

impl FromStr for GraphFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(GraphFormat::Json),
            "graphml" => Ok(GraphFormat::GraphMl),
            _ => Err(GraphError::unsupported_format(s, Self::SUPPORTED)),
        }
    }
}

/// Directed, typed property graph built from one snapshot.
///
/// Node indices are dense (`0..node_count`) and follow snapshot order, which
/// keeps every algorithm over the graph deterministic.
#[derive(Debug, Clone)]
pub struct PropertyGraph {
    graph: DiGraph<NodeAttributes, EdgeAttributes>,
    nodes: HashMap<NodeKey, NodeIndex>,
    keys: Vec<NodeKey>,
    /// Distinct successors / predecessors per node index, sorted.
    out_adj: Vec<Vec<usize>>,
    in_adj: Vec<Vec<usize>>,
    report: BuildReport,
}

impl PropertyGraph {
    /// Build the property graph of `snapshot`.
    pub fn build(snapshot: &Snapshot, config: &GraphConfig) -> Self {
        let index = snapshot.index();
        let mut graph = DiGraph::with_capacity(index.entities().len(), index.entities().len());
        let mut nodes = HashMap::with_capacity(index.entities().len());
        let mut keys = Vec::with_capacity(index.entities().len());

        for entity in index.entities() {
            let key = entity.key();
            let idx = graph.add_node(NodeAttributes::from_entity(entity));
            nodes.insert(key.clone(), idx);
            keys.push(key);
        }

        let mut add_edge = |from: &NodeKey, to: &NodeKey, attrs: EdgeAttributes| {
            if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
                graph.add_edge(a, b, attrs);
            }
        };

        for entity in index.entities() {
            let key = entity.key();
            let links = index.parents(entity);
            let predicate = index.hierarchy_predicate(entity.layer_id(), &config.default_predicate);
            if let Entity::Layer(_) = entity {
                continue;
            }
            if let Some(container) = &links.container {
                add_edge(
                    &key,
                    container,
                    EdgeAttributes::hierarchical(EdgeRelation::BelongsTo, predicate),
                );
            }
            if let Some(parent) = &links.parent_term {
                add_edge(
                    &key,
                    parent,
                    EdgeAttributes::hierarchical(EdgeRelation::ChildOf, predicate),
                );
            }
        }

        for rel in index.relationships() {
            add_edge(
                &NodeKey::term(&rel.source_term_id),
                &NodeKey::term(&rel.target_term_id),
                EdgeAttributes {
                    kind: EdgeKind::Relationship,
                    predicate: rel.predicate.clone(),
                    relationship: EdgeRelation::RelatedTo,
                    relationship_id: Some(rel.id.clone()),
                    created_at: rel.created_at,
                },
            );
        }

        let (out_adj, in_adj) = collapsed_adjacency(&graph);
        let report = index.report();
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = report.warnings.len(),
            "built property graph"
        );

        Self {
            graph,
            nodes,
            keys,
            out_adj,
            in_adj,
            report,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Rows skipped while building this graph.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Every node key in index order.
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    pub fn attributes(&self, key: &NodeKey) -> Option<&NodeAttributes> {
        self.nodes.get(key).map(|&idx| &self.graph[idx])
    }

    /// Nodes with their attributes, in index order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &NodeAttributes)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key, &self.graph[NodeIndex::new(i)]))
    }

    /// Edges as `(source, target, attributes)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeKey, &NodeKey, &EdgeAttributes)> {
        self.graph.edge_references().map(|e| {
            (
                &self.keys[e.source().index()],
                &self.keys[e.target().index()],
                e.weight(),
            )
        })
    }

    pub(crate) fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.get(key).map(|idx| idx.index())
    }

    pub(crate) fn key_at(&self, index: usize) -> &NodeKey {
        &self.keys[index]
    }

    pub(crate) fn attributes_at(&self, index: usize) -> &NodeAttributes {
        &self.graph[NodeIndex::new(index)]
    }

    /// Distinct successors of a node index.
    pub(crate) fn successors(&self, index: usize) -> &[usize] {
        &self.out_adj[index]
    }

    /// Distinct predecessors of a node index.
    pub(crate) fn predecessors(&self, index: usize) -> &[usize] {
        &self.in_adj[index]
    }

    /// Attributes, degrees and direct neighbors of a node; `None` if absent.
    pub fn node_info(&self, key: &NodeKey) -> Option<NodeInfo> {
        let &idx = self.nodes.get(key)?;
        let i = idx.index();
        let sorted_keys = |indices: &[usize]| {
            let mut keys: Vec<NodeKey> = indices.iter().map(|&j| self.keys[j].clone()).collect();
            keys.sort();
            keys
        };
        Some(NodeInfo {
            key: key.clone(),
            attributes: self.graph[idx].clone(),
            in_degree: self.graph.edges_directed(idx, PetDirection::Incoming).count(),
            out_degree: self.graph.edges_directed(idx, PetDirection::Outgoing).count(),
            predecessors: sorted_keys(&self.in_adj[i]),
            successors: sorted_keys(&self.out_adj[i]),
        })
    }

    /// Totals, connectivity and per-type counts.
    pub fn stats(&self) -> PropertyGraphStats {
        let mut node_types = BTreeMap::new();
        for attrs in self.graph.node_weights() {
            *node_types.entry(attrs.kind.to_string()).or_insert(0) += 1;
        }
        let mut edge_types = BTreeMap::new();
        for attrs in self.graph.edge_weights() {
            *edge_types.entry(attrs.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let weak = if self.is_empty() {
            0
        } else {
            connected_components(&self.graph)
        };
        PropertyGraphStats {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            is_directed: true,
            is_connected: weak == 1,
            node_types,
            edge_types,
            weakly_connected_components: weak,
            strongly_connected_components: tarjan_scc(&self.graph).len(),
        }
    }

    /// Node-link document of the whole graph.
    pub fn to_node_link(&self) -> NodeLinkGraph {
        NodeLinkGraph {
            directed: true,
            multigraph: true,
            nodes: self
                .nodes()
                .map(|(key, attrs)| NodeLinkNode {
                    id: key.clone(),
                    attributes: attrs.clone(),
                })
                .collect(),
            links: self
                .edges()
                .map(|(source, target, attrs)| NodeLinkEdge {
                    source: source.clone(),
                    target: target.clone(),
                    attributes: attrs.clone(),
                })
                .collect(),
        }
    }

    /// Render the graph as `json` (node-link) or `graphml`.
    pub fn export(&self, format: &str) -> GraphResult<String> {
        match format.parse::<GraphFormat>()? {
            GraphFormat::Json => serde_json::to_string_pretty(&self.to_node_link()).map_err(|e| {
                GraphError::Serialization {
                    message: e.to_string(),
                }
            }),
            GraphFormat::GraphMl => Ok(to_graphml(&self.to_node_link())),
        }
    }
}

/// Per-node distinct successor and predecessor lists, sorted by index.
fn collapsed_adjacency(
    graph: &DiGraph<NodeAttributes, EdgeAttributes>,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let n = graph.node_count();
    let mut out_adj = vec![Vec::new(); n];
    let mut in_adj = vec![Vec::new(); n];
    for edge in graph.edge_references() {
        out_adj[edge.source().index()].push(edge.target().index());
        in_adj[edge.target().index()].push(edge.source().index());
    }
    for list in out_adj.iter_mut().chain(in_adj.iter_mut()) {
        list.sort_unstable();
        list.dedup();
    }
    (out_adj, in_adj)
}
