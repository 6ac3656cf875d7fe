//! Graph analytics: centrality measures over the property graph.
//!
//! All measures run on the directed graph with parallel edges collapsed, so a
//! term pair linked by both a parent edge and a relationship edge counts as one
//! link. Results are keyed by [`NodeKey`] and cover every node.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::config::PageRankConfig;
use crate::entity::NodeKey;
use crate::error::GraphError;

use super::index::PropertyGraph;

/// Sources per parallel work unit in betweenness; fixed so float sums are
/// reproducible across runs.
const BETWEENNESS_CHUNK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityMethod {
    PageRank,
    Betweenness,
    Closeness,
    Degree,
}

impl CentralityMethod {
    pub const SUPPORTED: &'static [&'static str] = &["pagerank", "betweenness", "closeness", "degree"];

    pub fn as_str(self) -> &'static str {
        match self {
            CentralityMethod::PageRank => "pagerank",
            CentralityMethod::Betweenness => "betweenness",
            CentralityMethod::Closeness => "closeness",
            CentralityMethod::Degree => "degree",
        }
    }
}

impl fmt::Display for CentralityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CentralityMethod {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pagerank" => Ok(CentralityMethod::PageRank),
            "betweenness" => Ok(CentralityMethod::Betweenness),
            "closeness" => Ok(CentralityMethod::Closeness),
            "degree" => Ok(CentralityMethod::Degree),
            other => Err(GraphError::unknown_method("centrality", other, Self::SUPPORTED)),
        }
    }
}

/// Score every node with the given method.
pub fn centrality(
    graph: &PropertyGraph,
    method: CentralityMethod,
    pagerank_config: &PageRankConfig,
) -> BTreeMap<NodeKey, f64> {
    let scores = match method {
        CentralityMethod::PageRank => pagerank(graph, pagerank_config),
        CentralityMethod::Betweenness => betweenness(graph),
        CentralityMethod::Closeness => closeness(graph),
        CentralityMethod::Degree => degree(graph),
    };
    tracing::debug!(method = %method, nodes = scores.len(), "computed centrality");
    keyed(graph, scores)
}

fn keyed(graph: &PropertyGraph, scores: Vec<f64>) -> BTreeMap<NodeKey, f64> {
    graph.keys().iter().cloned().zip(scores).collect()
}

/// Scores sorted descending, ties broken by key.
pub fn ranked(scores: &BTreeMap<NodeKey, f64>) -> Vec<(NodeKey, f64)> {
    let mut ranked: Vec<(NodeKey, f64)> = scores.iter().map(|(k, &v)| (k.clone(), v)).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

// ---------------------------------------------------------------------------
// PageRank
// ---------------------------------------------------------------------------

/// Power-iteration PageRank with uniform teleport and dangling redistribution.
///
/// Scores sum to 1. Stops when the L1 change drops below
/// `node_count * tolerance`; if `max_iterations` is reached first the last
/// iterate is returned and a warning is logged.
pub fn pagerank(graph: &PropertyGraph, config: &PageRankConfig) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }
    let alpha = config.damping;
    let uniform = 1.0 / n as f64;
    let out_degree: Vec<usize> = (0..n).map(|i| graph.successors(i).len()).collect();
    let dangling: Vec<usize> = (0..n).filter(|&i| out_degree[i] == 0).collect();

    let mut x = vec![uniform; n];
    for iteration in 0..config.max_iterations {
        let last = std::mem::replace(&mut x, vec![0.0; n]);
        let dangle_sum: f64 = alpha * dangling.iter().map(|&i| last[i]).sum::<f64>();
        for i in 0..n {
            if out_degree[i] == 0 {
                continue;
            }
            let share = alpha * last[i] / out_degree[i] as f64;
            for &j in graph.successors(i) {
                x[j] += share;
            }
        }
        for v in x.iter_mut() {
            *v += dangle_sum * uniform + (1.0 - alpha) * uniform;
        }
        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * config.tolerance {
            tracing::debug!(iterations = iteration + 1, "pagerank converged");
            return x;
        }
    }
    tracing::warn!(
        max_iterations = config.max_iterations,
        "pagerank did not converge; returning last iterate"
    );
    x
}

// ---------------------------------------------------------------------------
// Betweenness
// ---------------------------------------------------------------------------

/// Brandes dependency accumulation from one source.
fn single_source_dependency(graph: &PropertyGraph, source: usize, acc: &mut [f64]) {
    let n = graph.node_count();
    let mut stack = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist: Vec<i64> = vec![-1; n];
    sigma[source] = 1.0;
    dist[source] = 0;
    let mut queue = VecDeque::from([source]);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in graph.successors(v) {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                preds[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    while let Some(w) = stack.pop() {
        for &v in &preds[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            acc[w] += delta[w];
        }
    }
}

/// Directed betweenness, normalized by `1 / ((n-1)(n-2))` when `n > 2`.
pub fn betweenness(graph: &PropertyGraph) -> Vec<f64> {
    use rayon::prelude::*;

    let n = graph.node_count();
    let sources: Vec<usize> = (0..n).collect();
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(BETWEENNESS_CHUNK)
        .map(|chunk| {
            let mut acc = vec![0.0; n];
            for &s in chunk {
                single_source_dependency(graph, s, &mut acc);
            }
            acc
        })
        .collect();

    let mut scores = vec![0.0; n];
    for partial in partials {
        for (total, value) in scores.iter_mut().zip(partial) {
            *total += value;
        }
    }
    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for v in scores.iter_mut() {
            *v *= scale;
        }
    }
    scores
}

// ---------------------------------------------------------------------------
// Closeness
// ---------------------------------------------------------------------------

/// Closeness over incoming distances with the Wasserman-Faust correction, so
/// nodes reachable from few others are not over-rated. Always in `[0, 1]`.
pub fn closeness(graph: &PropertyGraph) -> Vec<f64> {
    use rayon::prelude::*;

    let n = graph.node_count();
    (0..n)
        .into_par_iter()
        .map(|target| {
            let mut dist: Vec<Option<usize>> = vec![None; n];
            dist[target] = Some(0);
            let mut queue = VecDeque::from([target]);
            let mut total = 0usize;
            let mut reached = 1usize;
            while let Some(v) = queue.pop_front() {
                let d = dist[v].unwrap_or(0);
                for &u in graph.predecessors(v) {
                    if dist[u].is_none() {
                        dist[u] = Some(d + 1);
                        total += d + 1;
                        reached += 1;
                        queue.push_back(u);
                    }
                }
            }
            if total == 0 || n <= 1 {
                return 0.0;
            }
            let r = (reached - 1) as f64;
            (r / total as f64) * (r / (n - 1) as f64)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Degree
// ---------------------------------------------------------------------------

/// Distinct in- plus out-neighbors over `2(n-1)`; self-loops are ignored.
///
/// A single node scores 1.
pub fn degree(graph: &PropertyGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n == 1 {
        return vec![1.0];
    }
    let denom = 2.0 * (n.saturating_sub(1)) as f64;
    (0..n)
        .map(|i| {
            let out = graph.successors(i).iter().filter(|&&j| j != i).count();
            let inc = graph.predecessors(i).iter().filter(|&&j| j != i).count();
            (out + inc) as f64 / denom
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::snapshot::Snapshot;
    use crate::snapshot::fixtures::*;

    fn scenario_graph() -> PropertyGraph {
        PropertyGraph::build(&scenario(), &GraphConfig::default())
    }

    /// L <- D <- {a, b, c, d}; a -> b -> c -> d via relationships; d -> a closes a cycle.
    fn ring() -> PropertyGraph {
        let snapshot = Snapshot {
            layers: vec![layer("L", "Layer", None)],
            domains: vec![domain("D", "L", "Domain")],
            terms: ["a", "b", "c", "d"]
                .iter()
                .map(|id| term(id, "D", "L", id, None))
                .collect(),
            term_relationships: vec![
                relationship("1", "a", "b", "next"),
                relationship("2", "b", "c", "next"),
                relationship("3", "c", "d", "next"),
                relationship("4", "d", "a", "next"),
                relationship("5", "a", "a", "self"),
            ],
        };
        PropertyGraph::build(&snapshot, &GraphConfig::default())
    }

    fn all_methods() -> [CentralityMethod; 4] {
        [
            CentralityMethod::PageRank,
            CentralityMethod::Betweenness,
            CentralityMethod::Closeness,
            CentralityMethod::Degree,
        ]
    }

    #[test]
    fn parse_methods() {
        for name in CentralityMethod::SUPPORTED {
            let method: CentralityMethod = name.parse().unwrap();
            assert_eq!(method.as_str(), *name);
        }
        match "bogus".parse::<CentralityMethod>() {
            Err(GraphError::UnknownMethod { method, kind, .. }) => {
                assert_eq!(method, "bogus");
                assert_eq!(kind, "centrality");
            }
            other => panic!("expected unknown method, got {other:?}"),
        }
    }

    #[test]
    fn every_method_covers_every_node() {
        let graph = ring();
        for method in all_methods() {
            let scores = centrality(&graph, method, &PageRankConfig::default());
            assert_eq!(scores.len(), graph.node_count(), "{method}");
            assert!(scores.values().all(|v| v.is_finite() && *v >= 0.0), "{method}");
        }
    }

    #[test]
    fn degree_and_closeness_are_bounded() {
        for graph in [scenario_graph(), ring()] {
            for method in [CentralityMethod::Degree, CentralityMethod::Closeness] {
                let scores = centrality(&graph, method, &PageRankConfig::default());
                assert!(
                    scores.values().all(|v| (0.0..=1.0).contains(v)),
                    "{method}: {scores:?}"
                );
            }
        }
    }

    #[test]
    fn pagerank_sums_to_one() {
        for graph in [scenario_graph(), ring()] {
            let total: f64 = pagerank(&graph, &PageRankConfig::default()).iter().sum();
            assert!((total - 1.0).abs() < 1e-6, "sum was {total}");
        }
    }

    #[test]
    fn pagerank_favours_the_root() {
        let graph = scenario_graph();
        let scores = centrality(&graph, CentralityMethod::PageRank, &PageRankConfig::default());
        let top = ranked(&scores);
        assert_eq!(top[0].0, NodeKey::layer("L1"));
    }

    #[test]
    fn pagerank_non_convergence_still_returns_scores() {
        let graph = ring();
        let config = PageRankConfig {
            max_iterations: 1,
            tolerance: 1e-15,
            ..PageRankConfig::default()
        };
        let scores = pagerank(&graph, &config);
        assert_eq!(scores.len(), graph.node_count());
        let total: f64 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn betweenness_of_a_chain() {
        // T2 -> D1 -> L1 is the only route from terms to the layer
        let graph = scenario_graph();
        let scores = centrality(&graph, CentralityMethod::Betweenness, &PageRankConfig::default());
        assert!(scores[&NodeKey::domain("D1")] > 0.0);
        assert_eq!(scores[&NodeKey::layer("L1")], 0.0);
        // pairs (T1,L1) and (T2,L1) both pass D1: 2 / (3 * 2)
        assert!((scores[&NodeKey::domain("D1")] - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn degree_ignores_parallel_edges_and_self_loops() {
        let graph = ring();
        let scores = centrality(&graph, CentralityMethod::Degree, &PageRankConfig::default());
        // a: out {D, b}, in {d}; n = 6
        assert!((scores[&NodeKey::term("a")] - 3.0 / 10.0).abs() < 1e-12);
    }

    #[test]
    fn closeness_of_sink() {
        let graph = scenario_graph();
        let scores = closeness(&graph);
        // L1 is reached by all 3 others at distances 1, 2, 2
        let l1 = graph.index_of(&NodeKey::layer("L1")).unwrap();
        assert!((scores[l1] - 3.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_and_single_node_graphs() {
        let empty = PropertyGraph::build(&Snapshot::default(), &GraphConfig::default());
        for method in all_methods() {
            assert!(centrality(&empty, method, &PageRankConfig::default()).is_empty());
        }
        let single = PropertyGraph::build(
            &Snapshot {
                layers: vec![layer("L", "Only", None)],
                ..Snapshot::default()
            },
            &GraphConfig::default(),
        );
        let degree = centrality(&single, CentralityMethod::Degree, &PageRankConfig::default());
        assert_eq!(degree[&NodeKey::layer("L")], 1.0);
        let pr = centrality(&single, CentralityMethod::PageRank, &PageRankConfig::default());
        assert!((pr[&NodeKey::layer("L")] - 1.0).abs() < 1e-9);
    }
}
