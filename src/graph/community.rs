//! Community detection on the undirected projection of the property graph.
//!
//! The projection collapses parallel and antiparallel edges into a single
//! unit-weight link and drops self-loops. Both algorithms are deterministic:
//! nodes are visited in index order and ties resolve toward the lowest id.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::entity::NodeKey;
use crate::error::GraphError;

use super::index::PropertyGraph;

/// Minimum modularity gain for a Louvain move.
const GAIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityMethod {
    Louvain,
    LabelPropagation,
}

impl CommunityMethod {
    pub const SUPPORTED: &'static [&'static str] = &["louvain", "label_propagation"];

    pub fn as_str(self) -> &'static str {
        match self {
            CommunityMethod::Louvain => "louvain",
            CommunityMethod::LabelPropagation => "label_propagation",
        }
    }
}

impl fmt::Display for CommunityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommunityMethod {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "louvain" | "greedy_modularity" | "modularity" => Ok(CommunityMethod::Louvain),
            "label_propagation" => Ok(CommunityMethod::LabelPropagation),
            other => Err(GraphError::unknown_method("community", other, Self::SUPPORTED)),
        }
    }
}

/// Tuning knobs for [`communities`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommunityParams {
    pub resolution: f64,
    pub max_iterations: usize,
}

impl Default for CommunityParams {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_iterations: 100,
        }
    }
}

/// Undirected, deduplicated neighbor lists without self-loops.
fn undirected_adjacency(graph: &PropertyGraph) -> Vec<Vec<usize>> {
    (0..graph.node_count())
        .map(|i| {
            let mut nbrs: Vec<usize> = graph
                .successors(i)
                .iter()
                .chain(graph.predecessors(i))
                .copied()
                .filter(|&j| j != i)
                .collect();
            nbrs.sort_unstable();
            nbrs.dedup();
            nbrs
        })
        .collect()
}

/// Partition every node into communities.
///
/// Communities are sorted largest first, ties by their smallest key; each
/// node appears in exactly one.
pub fn communities(
    graph: &PropertyGraph,
    method: CommunityMethod,
    params: &CommunityParams,
) -> Vec<BTreeSet<NodeKey>> {
    let adj = undirected_adjacency(graph);
    let labels = match method {
        CommunityMethod::Louvain => louvain(&adj, params.resolution),
        CommunityMethod::LabelPropagation => label_propagation(&adj, params.max_iterations),
    };

    let mut groups: BTreeMap<usize, BTreeSet<NodeKey>> = BTreeMap::new();
    for (i, label) in labels.into_iter().enumerate() {
        groups.entry(label).or_default().insert(graph.key_at(i).clone());
    }
    let mut result: Vec<BTreeSet<NodeKey>> = groups.into_values().collect();
    result.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
    tracing::debug!(method = %method, communities = result.len(), "detected communities");
    result
}

/// Newman modularity of a partition on the undirected projection.
///
/// Nodes missing from `partition` count as singletons. Zero for a graph with
/// no links.
pub fn modularity(graph: &PropertyGraph, partition: &[BTreeSet<NodeKey>], resolution: f64) -> f64 {
    let adj = undirected_adjacency(graph);
    let links: usize = adj.iter().map(Vec::len).sum::<usize>() / 2;
    if links == 0 {
        return 0.0;
    }
    let m = links as f64;
    let n = graph.node_count();
    let mut community = vec![usize::MAX; n];
    for (c, members) in partition.iter().enumerate() {
        for key in members {
            if let Some(i) = graph.index_of(key) {
                community[i] = c;
            }
        }
    }
    let mut next = partition.len();
    for c in community.iter_mut().filter(|c| **c == usize::MAX) {
        *c = next;
        next += 1;
    }

    let mut internal = vec![0.0f64; next];
    let mut degree = vec![0.0f64; next];
    for i in 0..n {
        degree[community[i]] += adj[i].len() as f64;
        for &j in &adj[i] {
            if community[i] == community[j] {
                internal[community[i]] += 1.0;
            }
        }
    }
    // `internal` counted each link from both ends.
    internal
        .iter()
        .zip(&degree)
        .map(|(&l, &d)| l / (2.0 * m) - resolution * (d / (2.0 * m)).powi(2))
        .sum()
}

// ---------------------------------------------------------------------------
// Louvain
// ---------------------------------------------------------------------------

/// Weighted graph for one Louvain level.
struct Level {
    adj: Vec<BTreeMap<usize, f64>>,
    self_weight: Vec<f64>,
    degree: Vec<f64>,
    total: f64,
}

impl Level {
    fn from_adjacency(adj: &[Vec<usize>]) -> Self {
        let adj: Vec<BTreeMap<usize, f64>> = adj
            .iter()
            .map(|nbrs| nbrs.iter().map(|&j| (j, 1.0)).collect())
            .collect();
        let degree: Vec<f64> = adj.iter().map(|m| m.values().sum()).collect();
        let total = degree.iter().sum::<f64>() / 2.0;
        Self {
            self_weight: vec![0.0; adj.len()],
            adj,
            degree,
            total,
        }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    /// One local-moving phase. Returns the community of each level node and
    /// whether anything moved.
    fn local_moves(&self, resolution: f64) -> (Vec<usize>, bool) {
        let n = self.len();
        let m2 = 2.0 * self.total;
        let mut community: Vec<usize> = (0..n).collect();
        let mut tot: Vec<f64> = self.degree.clone();
        let mut moved_any = false;

        loop {
            let mut moved = false;
            for i in 0..n {
                let k_i = self.degree[i];
                let current = community[i];

                let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
                for (&j, &w) in &self.adj[i] {
                    *weights.entry(community[j]).or_insert(0.0) += w;
                }

                tot[current] -= k_i;
                let gain = |c: usize, w_ic: f64, tot: &[f64]| w_ic - resolution * tot[c] * k_i / m2;
                let mut best = current;
                let mut best_gain = gain(current, weights.get(&current).copied().unwrap_or(0.0), &tot);
                for (&c, &w_ic) in &weights {
                    let g = gain(c, w_ic, &tot);
                    if g > best_gain + GAIN_EPSILON {
                        best = c;
                        best_gain = g;
                    }
                }
                tot[best] += k_i;
                if best != current {
                    community[i] = best;
                    moved = true;
                    moved_any = true;
                }
            }
            if !moved {
                break;
            }
        }
        (community, moved_any)
    }

    /// Collapse communities into nodes. `community` must be renumbered densely.
    fn aggregate(&self, community: &[usize], count: usize) -> Level {
        let mut adj: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_weight = vec![0.0; count];
        for i in 0..self.len() {
            let ci = community[i];
            self_weight[ci] += self.self_weight[i];
            for (&j, &w) in &self.adj[i] {
                let cj = community[j];
                if ci == cj {
                    // each internal link is seen from both ends
                    self_weight[ci] += w / 2.0;
                } else {
                    *adj[ci].entry(cj).or_insert(0.0) += w;
                }
            }
        }
        let degree = (0..count)
            .map(|c| adj[c].values().sum::<f64>() + 2.0 * self_weight[c])
            .collect();
        Level {
            adj,
            self_weight,
            degree,
            total: self.total,
        }
    }
}

/// Renumber labels densely by first appearance.
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut order = Vec::with_capacity(labels.len());
    for &label in labels {
        let next = mapping.len();
        order.push(*mapping.entry(label).or_insert(next));
    }
    (order, mapping.len())
}

fn louvain(adj: &[Vec<usize>], resolution: f64) -> Vec<usize> {
    let n = adj.len();
    let mut membership: Vec<usize> = (0..n).collect();
    let mut level = Level::from_adjacency(adj);
    if level.total == 0.0 {
        return membership;
    }

    loop {
        let (community, moved) = level.local_moves(resolution);
        if !moved {
            break;
        }
        let (dense, count) = renumber(&community);
        for m in membership.iter_mut() {
            *m = dense[*m];
        }
        level = level.aggregate(&dense, count);
    }
    membership
}

// ---------------------------------------------------------------------------
// Label propagation
// ---------------------------------------------------------------------------

/// Asynchronous label propagation. A node keeps its label when it is among the
/// most frequent around it, otherwise takes the smallest most-frequent label.
fn label_propagation(adj: &[Vec<usize>], max_iterations: usize) -> Vec<usize> {
    let n = adj.len();
    let mut labels: Vec<usize> = (0..n).collect();

    for iteration in 0..max_iterations {
        let mut changed = false;
        for i in 0..n {
            if adj[i].is_empty() {
                continue;
            }
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for &j in &adj[i] {
                *counts.entry(labels[j]).or_insert(0) += 1;
            }
            let max = counts.values().copied().max().unwrap_or(0);
            if counts.get(&labels[i]) == Some(&max) {
                continue;
            }
            if let Some((&label, _)) = counts.iter().find(|&(_, &c)| c == max) {
                labels[i] = label;
                changed = true;
            }
        }
        if !changed {
            tracing::debug!(iterations = iteration + 1, "label propagation settled");
            return labels;
        }
    }
    tracing::warn!(max_iterations, "label propagation hit its iteration cap");
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::snapshot::Snapshot;
    use crate::snapshot::fixtures::*;

    fn methods() -> [CommunityMethod; 2] {
        [CommunityMethod::Louvain, CommunityMethod::LabelPropagation]
    }

    /// Two disjoint taxonomies: L1 <- D1 <- {a, b, c} with a-b-c linked, and
    /// L2 <- D2 <- d.
    fn two_islands() -> PropertyGraph {
        let snapshot = Snapshot {
            layers: vec![layer("L1", "One", None), layer("L2", "Two", None)],
            domains: vec![domain("D1", "L1", "First"), domain("D2", "L2", "Second")],
            terms: vec![
                term("a", "D1", "L1", "A", None),
                term("b", "D1", "L1", "B", Some("a")),
                term("c", "D1", "L1", "C", Some("b")),
                term("d", "D2", "L2", "D", None),
            ],
            term_relationships: vec![
                relationship("1", "a", "c", "sees"),
                relationship("2", "c", "a", "sees"),
                relationship("3", "d", "d", "self"),
            ],
        };
        PropertyGraph::build(&snapshot, &GraphConfig::default())
    }

    fn community_of<'a>(parts: &'a [BTreeSet<NodeKey>], key: &NodeKey) -> &'a BTreeSet<NodeKey> {
        parts.iter().find(|p| p.contains(key)).unwrap()
    }

    #[test]
    fn parse_methods_and_aliases() {
        assert_eq!("louvain".parse::<CommunityMethod>().unwrap(), CommunityMethod::Louvain);
        assert_eq!(
            "greedy_modularity".parse::<CommunityMethod>().unwrap(),
            CommunityMethod::Louvain
        );
        assert_eq!(
            "label_propagation".parse::<CommunityMethod>().unwrap(),
            CommunityMethod::LabelPropagation
        );
        match "spectral".parse::<CommunityMethod>() {
            Err(GraphError::UnknownMethod { method, supported, .. }) => {
                assert_eq!(method, "spectral");
                assert!(supported.0.contains(&"label_propagation"));
            }
            other => panic!("expected unknown method, got {other:?}"),
        }
    }

    #[test]
    fn partition_covers_each_node_once() {
        for graph in [two_islands(), PropertyGraph::build(&scenario(), &GraphConfig::default())] {
            for method in methods() {
                let parts = communities(&graph, method, &CommunityParams::default());
                let total: usize = parts.iter().map(BTreeSet::len).sum();
                assert_eq!(total, graph.node_count(), "{method}");
                let union: BTreeSet<&NodeKey> = parts.iter().flatten().collect();
                assert_eq!(union.len(), graph.node_count(), "{method}");
                assert!(parts.iter().all(|p| !p.is_empty()));
            }
        }
    }

    #[test]
    fn islands_never_share_a_community() {
        let graph = two_islands();
        for method in methods() {
            let parts = communities(&graph, method, &CommunityParams::default());
            let first = community_of(&parts, &NodeKey::term("a"));
            assert!(first.contains(&NodeKey::term("b")), "{method}: {parts:?}");
            assert!(first.contains(&NodeKey::term("c")), "{method}: {parts:?}");
            assert!(!first.contains(&NodeKey::term("d")), "{method}: {parts:?}");
            let second = community_of(&parts, &NodeKey::term("d"));
            assert!(second.contains(&NodeKey::domain("D2")), "{method}: {parts:?}");
        }
    }

    #[test]
    fn communities_are_sorted_largest_first() {
        let graph = two_islands();
        let parts = communities(&graph, CommunityMethod::Louvain, &CommunityParams::default());
        assert!(parts.windows(2).all(|w| w[0].len() >= w[1].len()));
    }

    #[test]
    fn louvain_does_not_lose_modularity() {
        let graph = two_islands();
        let parts = communities(&graph, CommunityMethod::Louvain, &CommunityParams::default());
        let singletons: Vec<BTreeSet<NodeKey>> = graph
            .keys()
            .iter()
            .map(|k| BTreeSet::from([k.clone()]))
            .collect();
        assert!(modularity(&graph, &parts, 1.0) > modularity(&graph, &singletons, 1.0));
    }

    #[test]
    fn detection_is_deterministic() {
        let graph = two_islands();
        for method in methods() {
            let first = communities(&graph, method, &CommunityParams::default());
            let second = communities(&graph, method, &CommunityParams::default());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn linkless_graphs_are_singletons() {
        let empty = PropertyGraph::build(&Snapshot::default(), &GraphConfig::default());
        for method in methods() {
            assert!(communities(&empty, method, &CommunityParams::default()).is_empty());
        }

        let lone = PropertyGraph::build(
            &Snapshot {
                layers: vec![layer("L1", "One", None), layer("L2", "Two", None)],
                ..Snapshot::default()
            },
            &GraphConfig::default(),
        );
        for method in methods() {
            let parts = communities(&lone, method, &CommunityParams::default());
            assert_eq!(parts.len(), 2);
        }
        assert_eq!(modularity(&lone, &[], 1.0), 0.0);
    }
}
