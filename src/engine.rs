//! Orchestrator: the top-level API over both graph models.
//!
//! [`GraphOrchestrator`] owns one immutable [`GraphSnapshot`] (triple model and
//! property graph built from the same entity snapshot) behind a swappable
//! handle. [`GraphOrchestrator::refresh`] builds a complete new pair before
//! swapping it in, so readers see either the old pair or the new one.
//! Every combined query clones the handle once and runs entirely against it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::GraphConfig;
use crate::entity::{EntityKind, NodeKey};
use crate::error::{GraphError, GraphResult, TaxonomyResult};
use crate::export::{NodeLinkGraph, TripleRecord};
use crate::graph::analytics::{self, CentralityMethod};
use crate::graph::community::{self, CommunityMethod, CommunityParams};
use crate::graph::index::{NodeInfo, PropertyGraph, PropertyGraphStats};
use crate::graph::sparql::{
    DomainMetadata, HierarchyEntry, QueryRow, TermLink, TermMatch, TripleGraph, TripleStats,
};
use crate::graph::traverse::{self, Closure};
use crate::graph::Direction;
use crate::snapshot::{BuildReport, Snapshot, SnapshotSource};

/// Both graph models built from one entity snapshot.
pub struct GraphSnapshot {
    triples: TripleGraph,
    property: PropertyGraph,
    built_at: DateTime<Utc>,
    report: BuildReport,
    generation: u64,
}

impl GraphSnapshot {
    /// Build both models from `snapshot`. The builders share no state.
    pub fn build(snapshot: &Snapshot, config: &GraphConfig) -> GraphResult<Self> {
        let triples = TripleGraph::build(snapshot, config)?;
        let property = PropertyGraph::build(snapshot, config);
        let report = triples.report().merge(property.report());
        Ok(Self {
            triples,
            property,
            built_at: Utc::now(),
            report,
            generation: 0,
        })
    }

    pub fn triples(&self) -> &TripleGraph {
        &self.triples
    }

    pub fn property(&self) -> &PropertyGraph {
        &self.property
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Which refresh produced this pair; the initial build is 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSnapshot")
            .field("nodes", &self.property.node_count())
            .field("edges", &self.property.edge_count())
            .field("built_at", &self.built_at)
            .field("generation", &self.generation)
            .field("warnings", &self.report.warnings.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Combined results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveStats {
    pub triples: TripleStats,
    pub property_graph: PropertyGraphStats,
    pub total_triples: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub warnings: usize,
    pub built_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

/// Everything known about one term's surroundings.
#[derive(Debug, Clone, Serialize)]
pub struct TermAnalysis {
    pub term: NodeKey,
    pub title: String,
    /// Direct statement-level links from the triple model.
    pub links: Vec<TermLink>,
    /// Property-graph neighborhood in both directions, by hop count.
    pub neighbors: BTreeMap<usize, BTreeSet<NodeKey>>,
    pub pagerank: f64,
    pub closure: Closure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTerm {
    pub id: String,
    pub title: String,
    pub pagerank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainStructure {
    pub domain: NodeKey,
    pub metadata: Option<DomainMetadata>,
    pub node: NodeInfo,
    /// Every term in the domain's subtree, highest pagerank first.
    pub terms: Vec<ScoredTerm>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "match")]
    pub matched: TermMatch,
    pub analysis: Option<TermAnalysis>,
}

/// Domains and terms whose `layer_id` attribute names one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerContents {
    pub layer: NodeKey,
    pub title: Option<String>,
    pub domains: Vec<NodeKey>,
    pub terms: Vec<NodeKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerAnalytics {
    pub hierarchy: Vec<HierarchyEntry>,
    pub graph: PropertyGraphStats,
    pub layer: Option<LayerContents>,
}

/// Full dump of both models.
#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub stats: ComprehensiveStats,
    pub triples: Vec<TripleRecord>,
    pub graph: NodeLinkGraph,
}

/// Formats accepted by [`GraphOrchestrator::export_graph_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Turtle,
    GraphMl,
}

impl ExportFormat {
    pub const SUPPORTED: &'static [&'static str] = &["json", "turtle", "graphml"];
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "turtle" | "ttl" => Ok(ExportFormat::Turtle),
            "graphml" => Ok(ExportFormat::GraphMl),
            _ => Err(GraphError::unsupported_format(s, Self::SUPPORTED)),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns both graph models and answers combined queries over them.
pub struct GraphOrchestrator {
    config: GraphConfig,
    source: Box<dyn SnapshotSource>,
    current: RwLock<Arc<GraphSnapshot>>,
    generations: AtomicU64,
}

impl GraphOrchestrator {
    /// Read the source once and build the initial graphs.
    pub fn new(source: impl SnapshotSource + 'static, config: GraphConfig) -> TaxonomyResult<Self> {
        config.validate()?;
        let snapshot = source.snapshot()?;
        let graphs = GraphSnapshot::build(&snapshot, &config)?;
        log_build(&graphs, "built taxonomy graphs");
        Ok(Self {
            config,
            source: Box::new(source),
            current: RwLock::new(Arc::new(graphs)),
            generations: AtomicU64::new(0),
        })
    }

    /// Orchestrator over a fixed in-memory snapshot.
    pub fn from_snapshot(snapshot: Snapshot, config: GraphConfig) -> TaxonomyResult<Self> {
        Self::new(snapshot, config)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The graphs every query issued now will see.
    pub fn current(&self) -> Arc<GraphSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Re-read the source and atomically replace both graphs.
    ///
    /// On error the previous graphs stay in place. When refreshes overlap, the
    /// one that started last wins and an older build is never published over it;
    /// the returned handle is whatever is current afterwards.
    pub fn refresh(&self) -> TaxonomyResult<Arc<GraphSnapshot>> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.source.snapshot()?;
        let graphs = GraphSnapshot::build(&snapshot, &self.config)?;
        Ok(self.publish(generation, graphs))
    }

    fn publish(&self, generation: u64, mut graphs: GraphSnapshot) -> Arc<GraphSnapshot> {
        graphs.generation = generation;
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        if guard.generation > generation {
            tracing::debug!(
                generation,
                current = guard.generation,
                "discarding refresh overtaken by a newer one"
            );
            return Arc::clone(&guard);
        }
        let graphs = Arc::new(graphs);
        *guard = Arc::clone(&graphs);
        drop(guard);
        log_build(&graphs, "refreshed taxonomy graphs");
        graphs
    }

    /// Warnings from the most recent build.
    pub fn build_report(&self) -> BuildReport {
        self.current().report.clone()
    }

    pub fn comprehensive_stats(&self) -> TaxonomyResult<ComprehensiveStats> {
        Ok(stats_of(&self.current())?)
    }

    /// Links, neighborhood, rank and closure of one term.
    ///
    /// The closure part scans every node reachable from the term, so cost
    /// grows with the graph rather than the answer. `None` if the term is
    /// absent.
    pub fn related_terms(&self, term_id: &str, max_depth: usize) -> TaxonomyResult<Option<TermAnalysis>> {
        let graphs = self.current();
        let ranks = analytics::pagerank(&graphs.property, &self.config.pagerank);
        Ok(self.analyze_term(&graphs, &NodeKey::term(term_id), max_depth, &ranks)?)
    }

    fn analyze_term(
        &self,
        graphs: &GraphSnapshot,
        key: &NodeKey,
        max_depth: usize,
        ranks: &[f64],
    ) -> GraphResult<Option<TermAnalysis>> {
        let Some(index) = graphs.property.index_of(key) else {
            return Ok(None);
        };
        Ok(Some(TermAnalysis {
            term: key.clone(),
            title: graphs.property.attributes_at(index).title.clone(),
            links: graphs.triples.related_terms(&key.id)?,
            neighbors: traverse::neighbors(&graphs.property, key, max_depth, Direction::Both),
            pagerank: ranks.get(index).copied().unwrap_or(0.0),
            closure: traverse::ancestors_descendants(&graphs.property, key, self.config.max_scan_nodes)?,
        }))
    }

    /// Metadata, node info and ranked subtree of one domain; `None` if absent.
    pub fn domain_structure(&self, domain_id: &str) -> TaxonomyResult<Option<DomainStructure>> {
        let graphs = self.current();
        let key = NodeKey::domain(domain_id);
        let Some(node) = graphs.property.node_info(&key) else {
            return Ok(None);
        };
        let metadata = graphs.triples.domain_metadata(domain_id)?;
        let members = traverse::subtree_members(&graphs.property, &key, self.config.max_scan_nodes)?;
        let ranks = analytics::pagerank(&graphs.property, &self.config.pagerank);

        let mut terms: Vec<ScoredTerm> = members
            .into_iter()
            .filter_map(|id| {
                let index = graphs.property.index_of(&NodeKey::term(&id))?;
                Some(ScoredTerm {
                    title: graphs.property.attributes_at(index).title.clone(),
                    pagerank: ranks.get(index).copied().unwrap_or(0.0),
                    id,
                })
            })
            .collect();
        terms.sort_by(|a, b| {
            b.pagerank
                .partial_cmp(&a.pagerank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(Some(DomainStructure {
            domain: key,
            metadata,
            node,
            terms,
        }))
    }

    /// Label search followed by a term analysis of every hit.
    pub fn search_and_analyze(&self, text: &str, max_depth: usize) -> TaxonomyResult<Vec<SearchHit>> {
        let graphs = self.current();
        let matches = graphs.triples.find_by_label(text, false)?;
        tracing::debug!(text, matches = matches.len(), "label search");
        let ranks = analytics::pagerank(&graphs.property, &self.config.pagerank);
        let mut hits = Vec::with_capacity(matches.len());
        for matched in matches {
            let analysis = self.analyze_term(&graphs, &matched.term, max_depth, &ranks)?;
            hits.push(SearchHit { matched, analysis });
        }
        Ok(hits)
    }

    /// Domain/layer listing plus graph stats, narrowed to one layer if given.
    pub fn layer_analytics(&self, layer_id: Option<&str>) -> TaxonomyResult<LayerAnalytics> {
        let graphs = self.current();
        let hierarchy = graphs.triples.hierarchy(layer_id)?;
        let layer = layer_id.map(|id| {
            let key = NodeKey::layer(id);
            let mut contents = LayerContents {
                title: graphs.property.attributes(&key).map(|a| a.title.clone()),
                layer: key,
                domains: Vec::new(),
                terms: Vec::new(),
            };
            for (node, attrs) in graphs.property.nodes() {
                if attrs.layer_id.as_deref() != Some(id) {
                    continue;
                }
                match node.kind {
                    EntityKind::Domain => contents.domains.push(node.clone()),
                    EntityKind::Term => contents.terms.push(node.clone()),
                    EntityKind::Layer => {}
                }
            }
            contents
        });
        Ok(LayerAnalytics {
            hierarchy,
            graph: graphs.property.stats(),
            layer,
        })
    }

    /// Dump both models as `json`, the triples as `turtle`, or the property
    /// graph as `graphml`.
    pub fn export_graph_data(&self, format: &str) -> TaxonomyResult<String> {
        let format: ExportFormat = format.parse()?;
        let graphs = self.current();
        let text = match format {
            ExportFormat::Json => {
                let export = GraphExport {
                    stats: stats_of(&graphs)?,
                    triples: graphs.triples.triples()?,
                    graph: graphs.property.to_node_link(),
                };
                serde_json::to_string_pretty(&export).map_err(|e| GraphError::Serialization {
                    message: e.to_string(),
                })?
            }
            ExportFormat::Turtle => graphs.triples.serialize("turtle")?,
            ExportFormat::GraphMl => graphs.property.export("graphml")?,
        };
        Ok(text)
    }

    // -- triple model ------------------------------------------------------

    pub fn query(&self, sparql: &str) -> TaxonomyResult<Vec<QueryRow>> {
        Ok(self.current().triples.query(sparql)?)
    }

    pub fn ask(&self, sparql: &str) -> TaxonomyResult<bool> {
        Ok(self.current().triples.ask(sparql)?)
    }

    pub fn find_by_label(&self, text: &str, exact: bool) -> TaxonomyResult<Vec<TermMatch>> {
        Ok(self.current().triples.find_by_label(text, exact)?)
    }

    pub fn hierarchy(&self, layer_id: Option<&str>) -> TaxonomyResult<Vec<HierarchyEntry>> {
        Ok(self.current().triples.hierarchy(layer_id)?)
    }

    /// Statement-level links of a term, without graph analytics.
    pub fn term_links(&self, term_id: &str) -> TaxonomyResult<Vec<TermLink>> {
        Ok(self.current().triples.related_terms(term_id)?)
    }

    pub fn domain_metadata(&self, domain_id: &str) -> TaxonomyResult<Option<DomainMetadata>> {
        Ok(self.current().triples.domain_metadata(domain_id)?)
    }

    pub fn serialize(&self, format: &str) -> TaxonomyResult<String> {
        Ok(self.current().triples.serialize(format)?)
    }

    pub fn triple_stats(&self) -> TaxonomyResult<TripleStats> {
        Ok(self.current().triples.stats()?)
    }

    // -- property graph ----------------------------------------------------

    pub fn shortest_path(&self, source: &NodeKey, target: &NodeKey) -> Option<Vec<NodeKey>> {
        traverse::shortest_path(&self.current().property, source, target)
    }

    pub fn neighbors(
        &self,
        key: &NodeKey,
        depth: usize,
        direction: Direction,
    ) -> BTreeMap<usize, BTreeSet<NodeKey>> {
        traverse::neighbors(&self.current().property, key, depth, direction)
    }

    pub fn centrality(&self, method: &str) -> TaxonomyResult<BTreeMap<NodeKey, f64>> {
        let method: CentralityMethod = method.parse()?;
        Ok(analytics::centrality(
            &self.current().property,
            method,
            &self.config.pagerank,
        ))
    }

    pub fn communities(&self, method: &str) -> TaxonomyResult<Vec<BTreeSet<NodeKey>>> {
        let method: CommunityMethod = method.parse()?;
        let params = CommunityParams {
            resolution: self.config.louvain_resolution,
            max_iterations: self.config.label_propagation_max_iterations,
        };
        Ok(community::communities(&self.current().property, method, &params))
    }

    /// Bounded by `max_scan_nodes` when configured.
    pub fn ancestors_descendants(&self, key: &NodeKey) -> TaxonomyResult<Closure> {
        Ok(traverse::ancestors_descendants(
            &self.current().property,
            key,
            self.config.max_scan_nodes,
        )?)
    }

    pub fn subtree_members(&self, domain: &NodeKey) -> TaxonomyResult<Vec<String>> {
        Ok(traverse::subtree_members(
            &self.current().property,
            domain,
            self.config.max_scan_nodes,
        )?)
    }

    pub fn node_info(&self, key: &NodeKey) -> Option<NodeInfo> {
        self.current().property.node_info(key)
    }

    pub fn graph_stats(&self) -> PropertyGraphStats {
        self.current().property.stats()
    }

    pub fn export(&self, format: &str) -> TaxonomyResult<String> {
        Ok(self.current().property.export(format)?)
    }
}

impl fmt::Debug for GraphOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphOrchestrator")
            .field("config", &self.config)
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

fn stats_of(graphs: &GraphSnapshot) -> GraphResult<ComprehensiveStats> {
    let triples = graphs.triples.stats()?;
    let property_graph = graphs.property.stats();
    Ok(ComprehensiveStats {
        total_triples: triples.triple_count,
        total_nodes: property_graph.total_nodes,
        total_edges: property_graph.total_edges,
        warnings: graphs.report.warnings.len(),
        built_at: graphs.built_at,
        generated_at: Utc::now(),
        triples,
        property_graph,
    })
}

fn log_build(graphs: &GraphSnapshot, message: &'static str) {
    for warning in &graphs.report.warnings {
        tracing::warn!(subject = %warning.subject, reason = %warning.reason, "skipped during build");
    }
    tracing::info!(
        nodes = graphs.property.node_count(),
        edges = graphs.property.edge_count(),
        warnings = graphs.report.warnings.len(),
        "{message}"
    );
}
