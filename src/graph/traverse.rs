//! Reachability queries over the property graph.
//!
//! Everything here is breadth-first over distinct neighbors, so distances are
//! hop counts and parallel edges never change a result. Closure scans
//! ([`ancestors_descendants`], [`subtree_members`]) run one BFS from the query
//! node instead of a path search per graph node; they still touch up to every
//! node, so callers can bound them with a node budget.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::entity::{EntityKind, NodeKey};
use crate::error::{GraphError, GraphResult};

use super::Direction;
use super::index::PropertyGraph;

/// One node of a closure, with its hop distance from the query node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub title: String,
    pub distance: usize,
}

/// Ancestors are reachable from the node along edge direction (toward
/// parents); descendants reach the node. Both are sorted by distance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub ancestors: Vec<ClosureEntry>,
    pub descendants: Vec<ClosureEntry>,
}

/// Unweighted directed shortest path, endpoints included.
///
/// `None` when either key is absent or `target` is unreachable.
pub fn shortest_path(graph: &PropertyGraph, source: &NodeKey, target: &NodeKey) -> Option<Vec<NodeKey>> {
    let start = graph.index_of(source)?;
    let goal = graph.index_of(target)?;
    if start == goal {
        return Some(vec![source.clone()]);
    }

    let mut parent: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut seen = vec![false; graph.node_count()];
    seen[start] = true;
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &next in graph.successors(node) {
            if seen[next] {
                continue;
            }
            seen[next] = true;
            parent[next] = Some(node);
            if next == goal {
                let mut path = vec![goal];
                let mut cur = goal;
                while let Some(p) = parent[cur] {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(path.into_iter().map(|i| graph.key_at(i).clone()).collect());
            }
            queue.push_back(next);
        }
    }
    None
}

/// Nodes first reached at each hop, up to `depth` hops.
///
/// A node appears at most once, at the earliest depth it is reached; the start
/// node never appears. Expansion stops at the first empty level. An absent
/// key yields an empty map.
pub fn neighbors(
    graph: &PropertyGraph,
    key: &NodeKey,
    depth: usize,
    direction: Direction,
) -> BTreeMap<usize, BTreeSet<NodeKey>> {
    let mut levels = BTreeMap::new();
    let Some(start) = graph.index_of(key) else {
        return levels;
    };

    let mut visited = vec![false; graph.node_count()];
    visited[start] = true;
    let mut frontier = vec![start];

    for level in 1..=depth {
        let mut next = Vec::new();
        for &node in &frontier {
            let outgoing = matches!(direction, Direction::Outgoing | Direction::Both)
                .then(|| graph.successors(node))
                .unwrap_or(&[]);
            let incoming = matches!(direction, Direction::Incoming | Direction::Both)
                .then(|| graph.predecessors(node))
                .unwrap_or(&[]);
            for &n in outgoing.iter().chain(incoming) {
                if !visited[n] {
                    visited[n] = true;
                    next.push(n);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.insert(
            level,
            next.iter().map(|&i| graph.key_at(i).clone()).collect(),
        );
        frontier = next;
    }
    levels
}

/// Hop distances from `start` following successors (`forward`) or
/// predecessors. Fails once more than `budget` nodes have been reached.
fn bfs_distances(
    graph: &PropertyGraph,
    start: usize,
    forward: bool,
    budget: Option<usize>,
) -> GraphResult<Vec<Option<usize>>> {
    let mut dist: Vec<Option<usize>> = vec![None; graph.node_count()];
    dist[start] = Some(0);
    let mut reached = 0usize;
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        let d = dist[node].unwrap_or(0);
        let next = if forward {
            graph.successors(node)
        } else {
            graph.predecessors(node)
        };
        for &n in next {
            if dist[n].is_some() {
                continue;
            }
            reached += 1;
            if let Some(budget) = budget {
                if reached > budget {
                    return Err(GraphError::ScanBudgetExceeded {
                        budget,
                        visited: reached,
                    });
                }
            }
            dist[n] = Some(d + 1);
            queue.push_back(n);
        }
    }
    Ok(dist)
}

fn closure_entries(graph: &PropertyGraph, start: usize, dist: &[Option<usize>]) -> Vec<ClosureEntry> {
    let mut entries: Vec<ClosureEntry> = dist
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != start)
        .filter_map(|(i, d)| {
            let attrs = graph.attributes_at(i);
            d.map(|distance| ClosureEntry {
                id: attrs.entity_id.clone(),
                kind: attrs.kind,
                title: attrs.title.clone(),
                distance,
            })
        })
        .collect();
    // stable: ties stay in node order
    entries.sort_by_key(|e| e.distance);
    entries
}

/// Full ancestor/descendant closure of a node.
///
/// Cost is linear in the size of the reachable subgraph, which on a connected
/// taxonomy is the whole graph. An absent key yields an empty closure.
pub fn ancestors_descendants(
    graph: &PropertyGraph,
    key: &NodeKey,
    budget: Option<usize>,
) -> GraphResult<Closure> {
    let Some(start) = graph.index_of(key) else {
        return Ok(Closure::default());
    };
    let up = bfs_distances(graph, start, true, budget)?;
    let down = bfs_distances(graph, start, false, budget)?;
    Ok(Closure {
        ancestors: closure_entries(graph, start, &up),
        descendants: closure_entries(graph, start, &down),
    })
}

/// Ids of every term with a directed path to `domain`, in node order.
pub fn subtree_members(
    graph: &PropertyGraph,
    domain: &NodeKey,
    budget: Option<usize>,
) -> GraphResult<Vec<String>> {
    let Some(start) = graph.index_of(domain) else {
        return Ok(Vec::new());
    };
    let dist = bfs_distances(graph, start, false, budget)?;
    Ok(dist
        .iter()
        .enumerate()
        .filter(|&(i, d)| i != start && d.is_some() && graph.key_at(i).kind == EntityKind::Term)
        .map(|(i, _)| graph.key_at(i).id.clone())
        .collect())
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

    /// A -> B -> C -> D as a term parent chain inside one domain.
    fn chain() -> PropertyGraph {
        let snapshot = Snapshot {
            layers: vec![layer("L", "Layer", None)],
            domains: vec![domain("Dm", "L", "Domain")],
            terms: vec![
                term("A", "Dm", "L", "A", Some("B")),
                term("B", "Dm", "L", "B", Some("C")),
                term("C", "Dm", "L", "C", Some("D")),
                term("D", "Dm", "L", "D", None),
            ],
            term_relationships: vec![],
        };
        PropertyGraph::build(&snapshot, &GraphConfig::default())
    }

    /// Several branches, a relationship cycle and an isolated domain.
    fn wide() -> PropertyGraph {
        let snapshot = Snapshot {
            layers: vec![layer("L1", "One", None), layer("L2", "Two", Some("part_of"))],
            domains: vec![
                domain("D1", "L1", "First"),
                domain("D2", "L2", "Second"),
                domain("D3", "L2", "Third"),
            ],
            terms: vec![
                term("a", "D1", "L1", "a", None),
                term("b", "D1", "L1", "b", Some("a")),
                term("c", "D1", "L1", "c", Some("b")),
                term("d", "D2", "L2", "d", None),
                term("e", "D2", "L2", "e", Some("d")),
                term("f", "D2", "L2", "f", Some("d")),
            ],
            term_relationships: vec![
                relationship("r1", "c", "e", "uses"),
                relationship("r2", "e", "a", "refines"),
                relationship("r3", "f", "f", "self"),
            ],
        };
        PropertyGraph::build(&snapshot, &GraphConfig::default())
    }

    fn terms(keys: &[&str]) -> Vec<NodeKey> {
        keys.iter().map(|k| NodeKey::term(*k)).collect()
    }

    #[test]
    fn shortest_path_follows_direction() {
        let graph = chain();
        assert_eq!(
            shortest_path(&graph, &NodeKey::term("A"), &NodeKey::term("D")),
            Some(terms(&["A", "B", "C", "D"]))
        );
        assert_eq!(shortest_path(&graph, &NodeKey::term("D"), &NodeKey::term("A")), None);
    }

    #[test]
    fn shortest_path_through_hierarchy() {
        let graph = scenario_graph();
        assert_eq!(
            shortest_path(&graph, &NodeKey::term("T2"), &NodeKey::layer("L1")),
            Some(vec![NodeKey::term("T2"), NodeKey::domain("D1"), NodeKey::layer("L1")])
        );
    }

    #[test]
    fn shortest_path_absent_keys() {
        let graph = chain();
        assert_eq!(shortest_path(&graph, &NodeKey::term("X"), &NodeKey::term("A")), None);
        assert_eq!(shortest_path(&graph, &NodeKey::term("A"), &NodeKey::term("X")), None);
        assert_eq!(
            shortest_path(&graph, &NodeKey::term("A"), &NodeKey::term("A")),
            Some(terms(&["A"]))
        );
    }

    #[test]
    fn neighbors_by_direction() {
        let graph = chain();
        let b = NodeKey::term("B");
        let out = neighbors(&graph, &b, 1, Direction::Outgoing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[&1], BTreeSet::from([NodeKey::term("C"), NodeKey::domain("Dm")]));

        let inc = neighbors(&graph, &b, 1, Direction::Incoming);
        assert_eq!(inc[&1], BTreeSet::from([NodeKey::term("A")]));

        let both = neighbors(&graph, &b, 1, Direction::Both);
        assert_eq!(
            both[&1],
            BTreeSet::from([NodeKey::term("A"), NodeKey::term("C"), NodeKey::domain("Dm")])
        );
    }

    #[test]
    fn neighbors_never_revisit_and_stop_early() {
        let graph = chain();
        let levels = neighbors(&graph, &NodeKey::term("C"), 10, Direction::Outgoing);
        // C -> {D, Dm}; D -> {Dm} already seen, Dm -> {L}
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[&1], BTreeSet::from([NodeKey::term("D"), NodeKey::domain("Dm")]));
        assert_eq!(levels[&2], BTreeSet::from([NodeKey::layer("L")]));
        assert!(neighbors(&graph, &NodeKey::term("nope"), 2, Direction::Both).is_empty());
        assert!(neighbors(&graph, &NodeKey::term("C"), 0, Direction::Both).is_empty());
    }

    #[test]
    fn scenario_closure() {
        let graph = scenario_graph();
        let closure = ancestors_descendants(&graph, &NodeKey::term("T2"), None).unwrap();
        let ancestors: Vec<(&str, usize)> = closure
            .ancestors
            .iter()
            .map(|e| (e.id.as_str(), e.distance))
            .collect();
        assert_eq!(ancestors, vec![("D1", 1), ("T1", 1), ("L1", 2)]);
        let descendants: Vec<(&str, usize)> = closure
            .descendants
            .iter()
            .map(|e| (e.id.as_str(), e.distance))
            .collect();
        assert_eq!(descendants, vec![("T1", 1)]);
    }

    #[test]
    fn closure_of_absent_key_is_empty() {
        let graph = scenario_graph();
        let closure = ancestors_descendants(&graph, &NodeKey::term("missing"), None).unwrap();
        assert_eq!(closure, Closure::default());
    }

    #[test]
    fn subtree_members_of_domain() {
        let graph = wide();
        // e -> a pulls e into D1's subtree, c -> e pulls c into D2's
        assert_eq!(
            subtree_members(&graph, &NodeKey::domain("D1"), None).unwrap(),
            ["a", "b", "c", "e"]
        );
        assert_eq!(
            subtree_members(&graph, &NodeKey::domain("D2"), None).unwrap(),
            ["c", "d", "e", "f"]
        );
        assert!(subtree_members(&graph, &NodeKey::domain("D3"), None).unwrap().is_empty());
        assert!(subtree_members(&graph, &NodeKey::domain("none"), None).unwrap().is_empty());
    }

    #[test]
    fn budget_is_enforced() {
        let graph = wide();
        let err = ancestors_descendants(&graph, &NodeKey::term("c"), Some(2)).unwrap_err();
        assert!(matches!(err, GraphError::ScanBudgetExceeded { budget: 2, visited: 3 }));
        assert!(subtree_members(&graph, &NodeKey::domain("D2"), Some(3)).is_err());
        assert!(subtree_members(&graph, &NodeKey::domain("D2"), Some(100)).is_ok());
    }

    /// Per-node path search, the baseline the single BFS must reproduce.
    fn brute_force(graph: &PropertyGraph, key: &NodeKey) -> (Vec<(NodeKey, usize)>, Vec<(NodeKey, usize)>) {
        let mut ancestors = Vec::new();
        let mut descendants = Vec::new();
        for other in graph.keys() {
            if let Some(path) = shortest_path(graph, key, other) {
                if path.len() > 1 {
                    ancestors.push((other.clone(), path.len() - 1));
                }
            }
            if let Some(path) = shortest_path(graph, other, key) {
                if path.len() > 1 {
                    descendants.push((other.clone(), path.len() - 1));
                }
            }
        }
        ancestors.sort_by_key(|(_, d)| *d);
        descendants.sort_by_key(|(_, d)| *d);
        (ancestors, descendants)
    }

    #[test]
    fn closure_matches_brute_force() {
        for graph in [scenario_graph(), chain(), wide()] {
            for key in graph.keys() {
                let closure = ancestors_descendants(&graph, key, None).unwrap();
                let as_pairs = |entries: &[ClosureEntry]| -> Vec<(NodeKey, usize)> {
                    entries
                        .iter()
                        .map(|e| (NodeKey::new(e.kind, e.id.clone()), e.distance))
                        .collect()
                };
                let (ancestors, descendants) = brute_force(&graph, key);
                assert_eq!(as_pairs(&closure.ancestors), ancestors, "ancestors of {key}");
                assert_eq!(as_pairs(&closure.descendants), descendants, "descendants of {key}");
            }
        }
    }

    #[test]
    fn subtree_matches_brute_force() {
        let graph = wide();
        for domain_key in graph.keys().iter().filter(|k| k.kind == EntityKind::Domain) {
            let expected: Vec<String> = graph
                .keys()
                .iter()
                .filter(|k| k.kind == EntityKind::Term)
                .filter(|k| shortest_path(&graph, k, domain_key).is_some())
                .map(|k| k.id.clone())
                .collect();
            assert_eq!(subtree_members(&graph, domain_key, None).unwrap(), expected);
        }
    }
}
