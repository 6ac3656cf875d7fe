//! End-to-end tests for the taxonomy graph engine.
//!
//! These drive the public API only: a snapshot goes in through a
//! `SnapshotSource`, and both graph models are checked through the
//! orchestrator.

use std::collections::BTreeSet;
use std::io::Write;

use taxonomy_graph::config::GraphConfig;
use taxonomy_graph::engine::GraphOrchestrator;
use taxonomy_graph::entity::{Domain, Layer, NodeKey, Term, TermRelationship};
use taxonomy_graph::error::{GraphError, SnapshotError, TaxonomyError};
use taxonomy_graph::graph::Direction;
use taxonomy_graph::graph::sparql::{TripleFormat, count_serialized_triples};
use taxonomy_graph::snapshot::{JsonSnapshotSource, Snapshot};

const ENTITY: &str = "http://context-studio.local/entity/";

fn layer(id: &str, title: &str, predicate: Option<&str>) -> Layer {
    Layer {
        id: id.into(),
        title: title.into(),
        definition: None,
        primary_predicate: predicate.map(str::to_string),
        version: 1,
        created_at: None,
        last_modified: None,
    }
}

fn domain(id: &str, layer_id: &str, title: &str) -> Domain {
    Domain {
        id: id.into(),
        layer_id: layer_id.into(),
        title: title.into(),
        definition: None,
        version: 1,
        created_at: None,
        last_modified: None,
    }
}

fn term(id: &str, domain_id: &str, title: &str, parent: Option<&str>) -> Term {
    Term {
        id: id.into(),
        domain_id: domain_id.into(),
        layer_id: "L1".into(),
        title: title.into(),
        definition: Some(format!("{title} definition")),
        parent_term_id: parent.map(str::to_string),
        version: 1,
        created_at: None,
        last_modified: None,
    }
}

fn link(id: &str, source: &str, target: &str, predicate: &str) -> TermRelationship {
    TermRelationship {
        id: id.into(),
        source_term_id: source.into(),
        target_term_id: target.into(),
        predicate: predicate.into(),
        created_at: None,
    }
}

fn scenario() -> Snapshot {
    Snapshot {
        layers: vec![layer("L1", "Layer One", Some("is_a"))],
        domains: vec![domain("D1", "L1", "Domain One")],
        terms: vec![
            term("T1", "D1", "Root", None),
            term("T2", "D1", "Child", Some("T1")),
        ],
        term_relationships: vec![link("R1", "T1", "T2", "relates_to")],
    }
}

fn orchestrator() -> GraphOrchestrator {
    GraphOrchestrator::from_snapshot(scenario(), GraphConfig::default()).unwrap()
}

/// Whether `(entity:subject, predicate, entity:object)` is in the triple set.
fn holds(orch: &GraphOrchestrator, subject: &str, predicate: &str, object: &str) -> bool {
    orch.ask(&format!("ASK {{ <{ENTITY}{subject}> {predicate} <{ENTITY}{object}> }}"))
        .unwrap()
}

fn count(orch: &GraphOrchestrator, pattern: &str) -> i64 {
    let rows = orch
        .query(&format!("SELECT (COUNT(*) AS ?n) WHERE {{ {pattern} }}"))
        .unwrap();
    rows[0].get("n").and_then(|v| v.as_i64()).unwrap()
}

#[test]
fn end_to_end_scenario() {
    let orch = orchestrator();

    // triple model
    assert_eq!(count(&orch, "?s a ?type"), 4);
    assert_eq!(count(&orch, "?s rdfs:label ?label"), 4);
    assert!(holds(&orch, "domain/D1", "cs:is_a", "layer/L1"));
    assert!(holds(&orch, "term/T1", "cs:is_a", "domain/D1"));
    assert!(holds(&orch, "term/T2", "cs:is_a", "domain/D1"));
    assert!(holds(&orch, "term/T2", "cs:is_a", "term/T1"));
    assert!(holds(&orch, "term/T2", "skos:broader", "term/T1"));
    assert!(holds(&orch, "term/T1", "skos:narrower", "term/T2"));
    assert!(holds(&orch, "term/T1", "cs:relates_to", "term/T2"));

    // property graph
    let stats = orch.graph_stats();
    assert_eq!(stats.total_nodes, 4);
    assert_eq!(stats.total_edges, 5);
    let d1 = orch.node_info(&NodeKey::domain("D1")).unwrap();
    assert_eq!(d1.successors, vec![NodeKey::layer("L1")]);
    let t1 = orch.node_info(&NodeKey::term("T1")).unwrap();
    assert_eq!(t1.successors, vec![NodeKey::domain("D1"), NodeKey::term("T2")]);
    let t2 = orch.node_info(&NodeKey::term("T2")).unwrap();
    assert_eq!(t2.successors, vec![NodeKey::domain("D1"), NodeKey::term("T1")]);

    // closure and path
    let closure = orch.ancestors_descendants(&NodeKey::term("T2")).unwrap();
    let ancestors: Vec<(&str, usize)> = closure
        .ancestors
        .iter()
        .map(|e| (e.id.as_str(), e.distance))
        .collect();
    assert!(ancestors.contains(&("T1", 1)));
    assert!(ancestors.contains(&("D1", 1)));
    assert_eq!(
        orch.shortest_path(&NodeKey::term("T2"), &NodeKey::layer("L1")),
        Some(vec![
            NodeKey::term("T2"),
            NodeKey::domain("D1"),
            NodeKey::layer("L1"),
        ])
    );
}

#[test]
fn refresh_is_idempotent() {
    let orch = orchestrator();
    let query = "SELECT ?s ?p ?o WHERE { ?s ?p ?o } ORDER BY ?s ?p ?o";
    let before_rows = serde_json::to_value(orch.query(query).unwrap()).unwrap();
    let before_stats = orch.comprehensive_stats().unwrap();
    let before_communities = orch.communities("louvain").unwrap();

    orch.refresh().unwrap();
    orch.refresh().unwrap();

    let after_stats = orch.comprehensive_stats().unwrap();
    assert_eq!(after_stats.total_triples, before_stats.total_triples);
    assert_eq!(after_stats.total_nodes, before_stats.total_nodes);
    assert_eq!(after_stats.total_edges, before_stats.total_edges);
    assert_eq!(serde_json::to_value(orch.query(query).unwrap()).unwrap(), before_rows);
    assert_eq!(orch.communities("louvain").unwrap(), before_communities);
}

#[test]
fn node_identity_is_unique_across_kinds() {
    // the same raw id on a layer, a domain and a term
    let snapshot = Snapshot {
        layers: vec![layer("X", "Layer X", None)],
        domains: vec![domain("X", "X", "Domain X")],
        terms: vec![term("X", "X", "Term X", None)],
        term_relationships: Vec::new(),
    };
    let orch = GraphOrchestrator::from_snapshot(snapshot, GraphConfig::default()).unwrap();
    let keys: BTreeSet<NodeKey> = orch.current().property().keys().iter().cloned().collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(count(&orch, "?s a ?type"), 3);
    assert_eq!(
        count(
            &orch,
            &format!("?s a ?type . FILTER(?s IN (<{ENTITY}layer/X>, <{ENTITY}domain/X>, <{ENTITY}term/X>))")
        ),
        3
    );
}

#[test]
fn chain_paths_and_neighbors() {
    let snapshot = Snapshot {
        layers: vec![layer("L1", "Layer", None)],
        domains: vec![domain("D1", "L1", "Domain")],
        terms: vec![
            term("A", "D1", "A", None),
            term("B", "D1", "B", None),
            term("C", "D1", "C", None),
            term("D", "D1", "D", None),
        ],
        term_relationships: vec![
            link("1", "A", "B", "next"),
            link("2", "B", "C", "next"),
            link("3", "C", "D", "next"),
        ],
    };
    let orch = GraphOrchestrator::from_snapshot(snapshot, GraphConfig::default()).unwrap();
    let (a, b, c, d) = (
        NodeKey::term("A"),
        NodeKey::term("B"),
        NodeKey::term("C"),
        NodeKey::term("D"),
    );
    assert_eq!(
        orch.shortest_path(&a, &d),
        Some(vec![a.clone(), b.clone(), c.clone(), d.clone()])
    );
    assert_eq!(orch.shortest_path(&d, &a), None);

    let out = orch.neighbors(&b, 1, Direction::Outgoing);
    assert_eq!(out[&1], BTreeSet::from([c.clone(), NodeKey::domain("D1")]));
    let inc = orch.neighbors(&b, 1, Direction::Incoming);
    assert_eq!(inc[&1], BTreeSet::from([a.clone()]));
}

#[test]
fn centrality_and_communities_hold_their_invariants() {
    let orch = orchestrator();
    for method in ["degree", "closeness"] {
        let scores = orch.centrality(method).unwrap();
        assert!(scores.values().all(|v| (0.0..=1.0).contains(v)), "{method}");
    }
    let pagerank: f64 = orch.centrality("pagerank").unwrap().values().sum();
    assert!((pagerank - 1.0).abs() < 1e-6);

    let all: BTreeSet<NodeKey> = orch.current().property().keys().iter().cloned().collect();
    for method in ["louvain", "label_propagation"] {
        let parts = orch.communities(method).unwrap();
        let union: BTreeSet<NodeKey> = parts.iter().flatten().cloned().collect();
        assert_eq!(union, all, "{method}");
        assert_eq!(parts.iter().map(BTreeSet::len).sum::<usize>(), all.len(), "{method}");
    }
}

#[test]
fn unknown_method_and_format_are_named_errors() {
    let orch = orchestrator();
    match orch.centrality("bogus") {
        Err(TaxonomyError::Graph(GraphError::UnknownMethod { method, supported, .. })) => {
            assert_eq!(method, "bogus");
            assert!(supported.0.contains(&"pagerank"));
        }
        other => panic!("expected unknown method, got {other:?}"),
    }
    assert!(matches!(
        orch.communities("bogus"),
        Err(TaxonomyError::Graph(GraphError::UnknownMethod { .. }))
    ));
    match orch.serialize("bogus") {
        Err(TaxonomyError::Graph(GraphError::UnsupportedFormat { format, .. })) => {
            assert_eq!(format, "bogus");
        }
        other => panic!("expected unsupported format, got {other:?}"),
    }
    assert!(matches!(
        orch.export("bogus"),
        Err(TaxonomyError::Graph(GraphError::UnsupportedFormat { .. }))
    ));
}

#[test]
fn malformed_query_carries_its_text() {
    let orch = orchestrator();
    let bad = "SELECT ?x WHERE { ?x nope:thing ?y }";
    match orch.query(bad) {
        Err(TaxonomyError::Graph(GraphError::Query { query, .. })) => assert_eq!(query, bad),
        other => panic!("expected query error, got {other:?}"),
    }
}

#[test]
fn turtle_round_trip_keeps_every_triple() {
    let orch = orchestrator();
    let turtle = orch.serialize("turtle").unwrap();
    let total = orch.triple_stats().unwrap().triple_count;
    assert_eq!(count_serialized_triples(&turtle, TripleFormat::Turtle).unwrap(), total);
}

#[test]
fn json_snapshot_source_feeds_refresh() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("taxonomy.json");
    std::fs::write(&path, serde_json::to_string(&scenario()).unwrap()).unwrap();

    let orch = GraphOrchestrator::new(JsonSnapshotSource::new(&path), GraphConfig::default()).unwrap();
    assert_eq!(orch.graph_stats().total_nodes, 4);

    let mut grown = scenario();
    grown.terms.push(term("T3", "D1", "Grandchild", Some("T2")));
    std::fs::write(&path, serde_json::to_string(&grown).unwrap()).unwrap();
    orch.refresh().unwrap();
    assert_eq!(orch.graph_stats().total_nodes, 5);
    assert_eq!(
        orch.subtree_members(&NodeKey::domain("D1")).unwrap(),
        vec!["T1".to_string(), "T2".to_string(), "T3".to_string()]
    );

    // a broken file fails the refresh and keeps the last good graphs
    std::fs::write(&path, "{ not json").unwrap();
    match orch.refresh() {
        Err(TaxonomyError::Snapshot(SnapshotError::Parse { path: reported, .. })) => {
            assert_eq!(reported, path.display().to_string())
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert_eq!(orch.graph_stats().total_nodes, 5);
}

#[test]
fn config_file_is_honored() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_predicate = \"part_of\"\nmax_scan_nodes = 2").unwrap();
    let config = GraphConfig::load(file.path()).unwrap();

    let mut snapshot = scenario();
    snapshot.layers[0].primary_predicate = None;
    let orch = GraphOrchestrator::from_snapshot(snapshot, config).unwrap();
    assert!(holds(&orch, "domain/D1", "cs:part_of", "layer/L1"));
    assert!(matches!(
        orch.ancestors_descendants(&NodeKey::term("T2")),
        Err(TaxonomyError::Graph(GraphError::ScanBudgetExceeded { budget: 2, .. }))
    ));
}
