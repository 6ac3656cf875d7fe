//! Triple model of the taxonomy, backed by an in-memory oxigraph store.
//!
//! [`TripleGraph::build`] turns a [`Snapshot`] into RDF statements using the
//! fixed vocabulary in [`super::vocab`]; the resulting graph is immutable.
//! Refreshing means building a new one and swapping it in (see
//! [`crate::engine::GraphOrchestrator`]).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{GraphName, GraphNameRef, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::{QueryResults, QuerySolution};
use oxigraph::store::Store;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::entity::{Entity, NodeKey, TermRelationship};
use crate::error::{GraphError, GraphResult};
use crate::export::{ObjectKind, TripleRecord};
use crate::snapshot::{BuildReport, Snapshot, SnapshotIndex};

use super::vocab::{
    BELONGS_TO_LAYER, DCTERMS_CREATED, DCTERMS_MODIFIED, PRIMARY_PREDICATE, SKOS_BROADER,
    SKOS_NARROWER, VERSION, Vocabulary, has_xml_local_name, sparql_string,
};

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// A single bound value in a query result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Map an RDF term to a scalar: IRIs and plain literals become text,
    /// numeric and boolean literals their native types.
    pub fn from_term(term: &Term) -> Self {
        match term {
            Term::NamedNode(node) => Scalar::Text(node.as_str().to_string()),
            Term::BlankNode(node) => Scalar::Text(format!("_:{}", node.as_str())),
            Term::Literal(lit) => Self::from_literal(lit),
            #[allow(unreachable_patterns)]
            other => Scalar::Text(other.to_string()),
        }
    }

    fn from_literal(lit: &Literal) -> Self {
        let value = lit.value();
        let datatype = lit.datatype();
        if datatype == xsd::BOOLEAN {
            if let Ok(b) = value.parse::<bool>() {
                return Scalar::Boolean(b);
            }
        } else if datatype == xsd::INTEGER
            || datatype == xsd::INT
            || datatype == xsd::LONG
            || datatype == xsd::SHORT
            || datatype == xsd::NON_NEGATIVE_INTEGER
        {
            if let Ok(i) = value.parse::<i64>() {
                return Scalar::Integer(i);
            }
        } else if datatype == xsd::DECIMAL || datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
            if let Ok(f) = value.parse::<f64>() {
                return Scalar::Float(f);
            }
        }
        Scalar::Text(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Boolean(b) => write!(f, "{b}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One solution of a pattern query, in the query's declared variable order.
/// Unbound variables are present as [`Scalar::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRow(Vec<(String, Scalar)>);

impl QueryRow {
    pub fn get(&self, variable: &str) -> Option<&Scalar> {
        self.0
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, value)| value)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for QueryRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Canned query results
// ---------------------------------------------------------------------------

/// A term found by label search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    pub term: NodeKey,
    pub title: String,
    pub definition: Option<String>,
    pub domain: Option<NodeKey>,
    pub layer: Option<NodeKey>,
}

/// One row of the domain/layer join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub domain: NodeKey,
    pub domain_title: String,
    pub layer: NodeKey,
    pub layer_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    Outgoing,
    Incoming,
}

/// A term directly linked to another term by any non-type statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermLink {
    pub term: NodeKey,
    /// The linking predicate, compacted to `prefix:local` where possible.
    pub relation: String,
    pub title: String,
    pub definition: Option<String>,
    pub direction: LinkDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainMetadata {
    pub domain: NodeKey,
    pub title: String,
    pub definition: Option<String>,
    pub layer: Option<NodeKey>,
    pub layer_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleStats {
    pub triple_count: usize,
    pub distinct_subjects: usize,
    pub distinct_predicates: usize,
    pub distinct_objects: usize,
    /// Bound prefix -> namespace IRI.
    pub namespaces: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Serialization formats
// ---------------------------------------------------------------------------

/// Textual renderings of the triple set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleFormat {
    Turtle,
    NTriples,
    RdfXml,
    Json,
}

impl TripleFormat {
    pub const SUPPORTED: &'static [&'static str] =
        &["turtle", "ttl", "ntriples", "nt", "rdfxml", "xml", "json"];

    fn rdf_format(self) -> Option<RdfFormat> {
        match self {
            TripleFormat::Turtle => Some(RdfFormat::Turtle),
            TripleFormat::NTriples => Some(RdfFormat::NTriples),
            TripleFormat::RdfXml => Some(RdfFormat::RdfXml),
            TripleFormat::Json => None,
        }
    }
}

impl FromStr for TripleFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(TripleFormat::Turtle),
            "ntriples" | "nt" | "n-triples" => Ok(TripleFormat::NTriples),
            "rdfxml" | "xml" | "rdf/xml" => Ok(TripleFormat::RdfXml),
            "json" => Ok(TripleFormat::Json),
            _ => Err(GraphError::unsupported_format(s, Self::SUPPORTED)),
        }
    }
}

/// Parse serialized triples and count them. Used to check that a rendering
/// carries the whole graph.
pub fn count_serialized_triples(text: &str, format: TripleFormat) -> GraphResult<usize> {
    let serialization = |e: &dyn fmt::Display| GraphError::Serialization {
        message: e.to_string(),
    };
    match format.rdf_format() {
        Some(rdf_format) => {
            let store = Store::new().map_err(GraphError::store)?;
            store
                .load_from_reader(rdf_format, text.as_bytes())
                .map_err(|e| serialization(&e))?;
            store.len().map_err(GraphError::store)
        }
        None => {
            let records: Vec<TripleRecord> =
                serde_json::from_str(text).map_err(|e| serialization(&e))?;
            Ok(records.into_iter().collect::<HashSet<_>>().len())
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Statements accumulated for a single entity before they reach the store.
struct Statements {
    subject: NamedNode,
    quads: Vec<Quad>,
}

impl Statements {
    fn new(subject: NamedNode) -> Self {
        Self {
            subject,
            quads: Vec::new(),
        }
    }

    fn add(&mut self, predicate: impl Into<NamedNode>, object: impl Into<Term>) {
        self.quads.push(Quad::new(
            self.subject.clone(),
            predicate,
            object,
            GraphName::DefaultGraph,
        ));
    }

    fn add_from(&mut self, subject: NamedNode, predicate: impl Into<NamedNode>, object: impl Into<Term>) {
        self.quads
            .push(Quad::new(subject, predicate, object, GraphName::DefaultGraph));
    }
}

fn timestamp(ts: DateTime<Utc>) -> Literal {
    Literal::new_typed_literal(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true), xsd::DATE_TIME)
}

struct TripleBuilder<'v, 'i, 'a> {
    vocab: &'v Vocabulary,
    index: &'i SnapshotIndex<'a>,
    default_predicate: &'v str,
}

impl TripleBuilder<'_, '_, '_> {
    fn entity_statements(&self, entity: &Entity<'_>) -> Vec<Quad> {
        let vocab = self.vocab;
        let mut st = Statements::new(vocab.entity_node(&entity.key()));

        st.add(rdf::TYPE, vocab.class_node(entity.kind()));
        st.add(rdfs::LABEL, Literal::new_simple_literal(entity.title()));
        if let Some(definition) = entity.definition() {
            st.add(rdfs::COMMENT, Literal::new_simple_literal(definition));
        }
        st.add(vocab.vocab_node(VERSION), Literal::from(entity.version()));
        if let Some(ts) = entity.created_at() {
            st.add(NamedNode::new_unchecked(DCTERMS_CREATED), timestamp(ts));
        }
        if let Some(ts) = entity.last_modified() {
            st.add(NamedNode::new_unchecked(DCTERMS_MODIFIED), timestamp(ts));
        }

        let links = self.index.parents(entity);
        let hierarchy = vocab.predicate_node(
            self.index
                .hierarchy_predicate(entity.layer_id(), self.default_predicate),
        );

        match entity {
            Entity::Layer(layer) => {
                if let Some(p) = layer.primary_predicate.as_deref().filter(|p| !p.trim().is_empty()) {
                    st.add(vocab.vocab_node(PRIMARY_PREDICATE), Literal::new_simple_literal(p));
                }
            }
            Entity::Domain(_) => {
                if let Some(layer) = &links.container {
                    st.add(hierarchy, vocab.entity_node(layer));
                }
            }
            Entity::Term(_) => {
                if let Some(domain) = &links.container {
                    st.add(hierarchy.clone(), vocab.entity_node(domain));
                }
                if let Some(layer) = &links.layer {
                    st.add(vocab.vocab_node(BELONGS_TO_LAYER), vocab.entity_node(layer));
                }
                if let Some(parent) = &links.parent_term {
                    let parent = vocab.entity_node(parent);
                    st.add(hierarchy, parent.clone());
                    st.add(NamedNode::new_unchecked(SKOS_BROADER), parent.clone());
                    let child = st.subject.clone();
                    st.add_from(parent, NamedNode::new_unchecked(SKOS_NARROWER), child);
                }
            }
        }
        st.quads
    }

    fn relationship_statement(&self, rel: &TermRelationship) -> Quad {
        Quad::new(
            self.vocab.entity_node(&NodeKey::term(&rel.source_term_id)),
            self.vocab.predicate_node(&rel.predicate),
            self.vocab.entity_node(&NodeKey::term(&rel.target_term_id)),
            GraphName::DefaultGraph,
        )
    }
}

// ---------------------------------------------------------------------------
// Triple graph
// ---------------------------------------------------------------------------

/// The RDF view of one snapshot, queryable with SPARQL.
pub struct TripleGraph {
    store: Store,
    vocab: Vocabulary,
    prelude: String,
    report: BuildReport,
}

impl TripleGraph {
    /// Build the triple model of `snapshot`.
    ///
    /// Rows the snapshot index rejects are skipped and listed in
    /// [`TripleGraph::report`]; only store failures abort the build.
    pub fn build(snapshot: &Snapshot, config: &GraphConfig) -> GraphResult<Self> {
        let vocab = Vocabulary::new(config);
        let index = snapshot.index();
        let store = Store::new().map_err(GraphError::store)?;

        let builder = TripleBuilder {
            vocab: &vocab,
            index: &index,
            default_predicate: &config.default_predicate,
        };
        for entity in index.entities() {
            for quad in builder.entity_statements(entity) {
                store.insert(&quad).map_err(GraphError::store)?;
            }
        }
        for rel in index.relationships() {
            store
                .insert(&builder.relationship_statement(rel))
                .map_err(GraphError::store)?;
        }

        let report = index.report();
        let triples = store.len().map_err(GraphError::store)?;
        tracing::info!(
            triples,
            entities = report.entities,
            relationships = report.relationships,
            warnings = report.warnings.len(),
            "built triple graph"
        );

        let prelude = vocab.sparql_prelude();
        Ok(Self {
            store,
            vocab,
            prelude,
            report,
        })
    }

    /// Rows skipped while building this graph.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Number of triples.
    pub fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(GraphError::store)
    }

    pub fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }

    fn run(&self, sparql: &str) -> GraphResult<QueryResults> {
        let full = format!("{}{}", self.prelude, sparql);
        self.store
            .query(full.as_str())
            .map_err(|e| GraphError::query(sparql, e))
    }

    /// Run a SELECT query used internally; other result forms are a bug.
    fn select(&self, sparql: &str) -> GraphResult<Vec<QuerySolution>> {
        match self.run(sparql)? {
            QueryResults::Solutions(solutions) => solutions
                .map(|s| s.map_err(|e| GraphError::query(sparql, e)))
                .collect(),
            _ => Err(GraphError::query(sparql, "expected SELECT results")),
        }
    }

    /// Execute a pattern query.
    ///
    /// SELECT rows keep the declared variable order. ASK yields one row with
    /// a `result` boolean; CONSTRUCT and DESCRIBE yield `subject`,
    /// `predicate`, `object` rows.
    pub fn query(&self, sparql: &str) -> GraphResult<Vec<QueryRow>> {
        tracing::debug!(query = sparql, "running pattern query");
        match self.run(sparql)? {
            QueryResults::Solutions(solutions) => {
                let variables: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| GraphError::query(sparql, e))?;
                    let row = variables
                        .iter()
                        .map(|var| {
                            let value = solution
                                .get(var.as_str())
                                .map(Scalar::from_term)
                                .unwrap_or(Scalar::Null);
                            (var.clone(), value)
                        })
                        .collect();
                    rows.push(QueryRow(row));
                }
                Ok(rows)
            }
            QueryResults::Boolean(b) => Ok(vec![QueryRow(vec![(
                "result".to_string(),
                Scalar::Boolean(b),
            )])]),
            QueryResults::Graph(triples) => {
                let mut rows = Vec::new();
                for triple in triples {
                    let triple = triple.map_err(|e| GraphError::query(sparql, e))?;
                    rows.push(QueryRow(vec![
                        ("subject".to_string(), Scalar::from_term(&Term::from(triple.subject))),
                        (
                            "predicate".to_string(),
                            Scalar::Text(triple.predicate.as_str().to_string()),
                        ),
                        ("object".to_string(), Scalar::from_term(&triple.object)),
                    ]));
                }
                Ok(rows)
            }
        }
    }

    /// Execute an ASK query.
    pub fn ask(&self, sparql: &str) -> GraphResult<bool> {
        match self.run(sparql)? {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(GraphError::query(sparql, "expected an ASK query")),
        }
    }

    fn key_of(&self, solution: &QuerySolution, var: &str) -> Option<NodeKey> {
        match solution.get(var)? {
            Term::NamedNode(node) => self.vocab.key_from_iri(node.as_str()),
            _ => None,
        }
    }

    /// Terms whose label equals `text` (case-sensitive) or, when `exact` is
    /// false, contains it ignoring case.
    pub fn find_by_label(&self, text: &str, exact: bool) -> GraphResult<Vec<TermMatch>> {
        let needle = sparql_string(text);
        let filter = if exact {
            format!("FILTER(STR(?title) = {needle})")
        } else {
            format!("FILTER(CONTAINS(LCASE(STR(?title)), LCASE({needle})))")
        };
        let sparql = format!(
            "SELECT ?term ?title ?definition ?domain ?layer WHERE {{
                ?term a cs:Term ; rdfs:label ?title .
                OPTIONAL {{ ?term rdfs:comment ?definition }}
                OPTIONAL {{ ?term ?hierarchy ?domain . ?domain a cs:Domain }}
                OPTIONAL {{ ?term cs:{BELONGS_TO_LAYER} ?layer }}
                {filter}
            }}
            ORDER BY ?title ?term"
        );
        let mut matches = Vec::new();
        for solution in self.select(&sparql)? {
            let (Some(term), Some(title)) = (self.key_of(&solution, "term"), literal(&solution, "title"))
            else {
                continue;
            };
            matches.push(TermMatch {
                term,
                title,
                definition: literal(&solution, "definition"),
                domain: self.key_of(&solution, "domain"),
                layer: self.key_of(&solution, "layer"),
            });
        }
        Ok(matches)
    }

    /// The domain/layer join, optionally restricted to one layer.
    pub fn hierarchy(&self, layer_id: Option<&str>) -> GraphResult<Vec<HierarchyEntry>> {
        let filter = layer_id
            .map(|id| {
                format!(
                    "FILTER(?layer = <{}>)",
                    self.vocab.entity_iri(&NodeKey::layer(id))
                )
            })
            .unwrap_or_default();
        let sparql = format!(
            "SELECT ?domain ?domainTitle ?layer ?layerTitle WHERE {{
                ?domain a cs:Domain ; rdfs:label ?domainTitle ; ?hierarchy ?layer .
                ?layer a cs:Layer ; rdfs:label ?layerTitle .
                {filter}
            }}
            ORDER BY ?layerTitle ?domainTitle ?domain"
        );
        let mut entries = Vec::new();
        for solution in self.select(&sparql)? {
            let (Some(domain), Some(domain_title), Some(layer), Some(layer_title)) = (
                self.key_of(&solution, "domain"),
                literal(&solution, "domainTitle"),
                self.key_of(&solution, "layer"),
                literal(&solution, "layerTitle"),
            ) else {
                continue;
            };
            entries.push(HierarchyEntry {
                domain,
                domain_title,
                layer,
                layer_title,
            });
        }
        Ok(entries)
    }

    /// Terms linked to `term_id` in either direction by any predicate other
    /// than `rdf:type`.
    pub fn related_terms(&self, term_id: &str) -> GraphResult<Vec<TermLink>> {
        let term = self.vocab.entity_iri(&NodeKey::term(term_id));
        let sparql = format!(
            "SELECT ?relatedTerm ?relation ?title ?definition ?direction WHERE {{
                {{ <{term}> ?relation ?relatedTerm . BIND(\"outgoing\" AS ?direction) }}
                UNION
                {{ ?relatedTerm ?relation <{term}> . BIND(\"incoming\" AS ?direction) }}
                FILTER(?relation != rdf:type)
                ?relatedTerm a cs:Term ; rdfs:label ?title .
                OPTIONAL {{ ?relatedTerm rdfs:comment ?definition }}
            }}
            ORDER BY ?direction ?relation ?title"
        );
        let mut links = Vec::new();
        for solution in self.select(&sparql)? {
            let (Some(related), Some(Term::NamedNode(relation)), Some(title)) = (
                self.key_of(&solution, "relatedTerm"),
                solution.get("relation"),
                literal(&solution, "title"),
            ) else {
                continue;
            };
            let direction = match literal(&solution, "direction").as_deref() {
                Some("incoming") => LinkDirection::Incoming,
                _ => LinkDirection::Outgoing,
            };
            links.push(TermLink {
                term: related,
                relation: self.vocab.compact(relation.as_str()),
                title,
                definition: literal(&solution, "definition"),
                direction,
            });
        }
        Ok(links)
    }

    /// Title, definition and owning layer of a domain; `None` if absent.
    pub fn domain_metadata(&self, domain_id: &str) -> GraphResult<Option<DomainMetadata>> {
        let key = NodeKey::domain(domain_id);
        let domain = self.vocab.entity_iri(&key);
        let sparql = format!(
            "SELECT ?title ?definition ?layer ?layerTitle WHERE {{
                <{domain}> a cs:Domain ; rdfs:label ?title .
                OPTIONAL {{ <{domain}> rdfs:comment ?definition }}
                OPTIONAL {{ <{domain}> ?hierarchy ?layer . ?layer a cs:Layer ; rdfs:label ?layerTitle }}
            }}
            LIMIT 1"
        );
        let Some(solution) = self.select(&sparql)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(title) = literal(&solution, "title") else {
            return Ok(None);
        };
        Ok(Some(DomainMetadata {
            domain: key,
            title,
            definition: literal(&solution, "definition"),
            layer: self.key_of(&solution, "layer"),
            layer_title: literal(&solution, "layerTitle"),
        }))
    }

    /// Every triple as a plain record, sorted.
    pub fn triples(&self) -> GraphResult<Vec<TripleRecord>> {
        let mut records = Vec::new();
        for quad in self.store.iter() {
            let quad = quad.map_err(GraphError::store)?;
            let subject = match Term::from(quad.subject) {
                Term::NamedNode(node) => node.into_string(),
                other => other.to_string(),
            };
            let (object_type, object, datatype, language) = match &quad.object {
                Term::NamedNode(node) => (ObjectKind::Uri, node.as_str().to_string(), None, None),
                Term::BlankNode(node) => (ObjectKind::Bnode, node.as_str().to_string(), None, None),
                Term::Literal(lit) => (
                    ObjectKind::Literal,
                    lit.value().to_string(),
                    Some(lit.datatype().as_str().to_string()),
                    lit.language().map(str::to_string),
                ),
                #[allow(unreachable_patterns)]
                other => (ObjectKind::Literal, other.to_string(), None, None),
            };
            records.push(TripleRecord {
                subject,
                predicate: quad.predicate.into_string(),
                object,
                object_type,
                datatype,
                language,
            });
        }
        records.sort();
        Ok(records)
    }

    /// Render the whole triple set as text.
    pub fn serialize(&self, format: &str) -> GraphResult<String> {
        let format: TripleFormat = format.parse()?;
        self.serialize_as(format)
    }

    pub fn serialize_as(&self, format: TripleFormat) -> GraphResult<String> {
        let serialization = |e: &dyn fmt::Display| GraphError::Serialization {
            message: e.to_string(),
        };
        let Some(rdf_format) = format.rdf_format() else {
            return serde_json::to_string_pretty(&self.triples()?).map_err(|e| serialization(&e));
        };

        if rdf_format == RdfFormat::RdfXml {
            self.check_xml_predicates()?;
        }

        let mut serializer = RdfSerializer::from_format(rdf_format);
        if matches!(rdf_format, RdfFormat::Turtle | RdfFormat::RdfXml) {
            for (prefix, ns) in self.vocab.prefixes() {
                serializer = serializer
                    .with_prefix(prefix, ns)
                    .map_err(|e| serialization(&e))?;
            }
        }
        let bytes = self
            .store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, serializer, Vec::new())
            .map_err(|e| serialization(&e))?;
        String::from_utf8(bytes).map_err(|e| serialization(&e))
    }

    /// RDF/XML writes predicates as element names; refuse labels like `123`
    /// that have no XML local name instead of emitting a broken document.
    fn check_xml_predicates(&self) -> GraphResult<()> {
        let mut seen = HashSet::new();
        for quad in self.store.iter() {
            let quad = quad.map_err(GraphError::store)?;
            let predicate = quad.predicate.into_string();
            if seen.contains(&predicate) {
                continue;
            }
            if !has_xml_local_name(&predicate) {
                return Err(GraphError::Serialization {
                    message: format!("predicate <{predicate}> has no XML local name, so rdfxml cannot express it"),
                });
            }
            seen.insert(predicate);
        }
        Ok(())
    }

    /// Triple count, distinct subject/predicate/object counts and bound prefixes.
    pub fn stats(&self) -> GraphResult<TripleStats> {
        let mut subjects = HashSet::new();
        let mut predicates = HashSet::new();
        let mut objects = HashSet::new();
        let mut triple_count = 0;
        for quad in self.store.iter() {
            let quad = quad.map_err(GraphError::store)?;
            triple_count += 1;
            subjects.insert(quad.subject.to_string());
            predicates.insert(quad.predicate.into_string());
            objects.insert(quad.object.to_string());
        }
        let namespaces = self
            .vocab
            .prefixes()
            .into_iter()
            .map(|(prefix, ns)| (prefix.to_string(), ns.to_string()))
            .collect();
        Ok(TripleStats {
            triple_count,
            distinct_subjects: subjects.len(),
            distinct_predicates: predicates.len(),
            distinct_objects: objects.len(),
            namespaces,
        })
    }
}

impl fmt::Debug for TripleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleGraph")
            .field("vocab", &self.vocab)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

fn literal(solution: &QuerySolution, var: &str) -> Option<String> {
    match solution.get(var)? {
        Term::Literal(lit) => Some(lit.value().to_string()),
        _ => None,
    }
}
