//! Read-only entity snapshots consumed by the graph builders.
//!
//! A [`Snapshot`] is a full table scan of the relational store: every layer,
//! domain, term and term relationship. Builders never talk to the store
//! directly; they ask a [`SnapshotSource`] for a fresh snapshot and derive both
//! graph models from it.
//!
//! [`SnapshotIndex`] validates a snapshot once per builder. Rows that cannot be
//! materialized (empty ids, duplicate ids, dangling references) are reported as
//! [`BuildWarning`]s and skipped; every other row is kept.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity::{Domain, Entity, EntityKind, Layer, NodeKey, Term, TermRelationship};
use crate::error::SnapshotError;

/// Every row of the taxonomy tables at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub term_relationships: Vec<TermRelationship>,
}

impl Snapshot {
    /// Parse a snapshot from its JSON export form.
    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Total number of node-bearing entities (layers + domains + terms).
    pub fn entity_count(&self) -> usize {
        self.layers.len() + self.domains.len() + self.terms.len()
    }

    /// Validate the snapshot and build lookup tables.
    pub fn index(&self) -> SnapshotIndex<'_> {
        SnapshotIndex::new(self)
    }
}

/// Supplier of entity snapshots (the relational store in production).
pub trait SnapshotSource: Send + Sync {
    /// Read every row of every taxonomy table.
    fn snapshot(&self) -> Result<Snapshot, SnapshotError>;
}

impl SnapshotSource for Snapshot {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Ok(self.clone())
    }
}

/// Reads a snapshot from a JSON export file on every call.
#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonSnapshotSource {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let path = self.path.display().to_string();
        let content = std::fs::read_to_string(&self.path).map_err(|source| SnapshotError::Read {
            path: path.clone(),
            source,
        })?;
        Snapshot::from_json_str(&content).map_err(|e| match e {
            SnapshotError::Parse { message, .. } => SnapshotError::Parse { path, message },
            other => other,
        })
    }
}

// ---------------------------------------------------------------------------
// Build warnings
// ---------------------------------------------------------------------------

/// A single row that could not be fully materialized during a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildWarning {
    /// The affected row, e.g. `term:42` or `relationship:7`.
    pub subject: String,
    pub reason: String,
}

impl BuildWarning {
    fn new(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.reason)
    }
}

/// Outcome of one graph build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub entities: usize,
    pub relationships: usize,
    pub warnings: Vec<BuildWarning>,
}

impl BuildReport {
    /// Union of two reports' warnings, sorted and deduplicated.
    pub fn merge(&self, other: &BuildReport) -> BuildReport {
        let mut warnings: Vec<BuildWarning> = self
            .warnings
            .iter()
            .chain(other.warnings.iter())
            .cloned()
            .collect();
        warnings.sort();
        warnings.dedup();
        BuildReport {
            entities: self.entities.max(other.entities),
            relationships: self.relationships.max(other.relationships),
            warnings,
        }
    }
}

// ---------------------------------------------------------------------------
// Validated index
// ---------------------------------------------------------------------------

/// Structural parents of one entity, resolved against the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentLinks {
    /// Domain -> layer, or term -> domain.
    pub container: Option<NodeKey>,
    /// Term -> layer (a membership link, not a hierarchy edge).
    pub layer: Option<NodeKey>,
    /// Term -> parent term.
    pub parent_term: Option<NodeKey>,
}

/// A validated, lookup-friendly view over a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotIndex<'a> {
    entities: Vec<Entity<'a>>,
    layers: HashMap<&'a str, &'a Layer>,
    domains: HashMap<&'a str, &'a Domain>,
    terms: HashMap<&'a str, &'a Term>,
    relationships: Vec<&'a TermRelationship>,
    warnings: Vec<BuildWarning>,
}

impl<'a> SnapshotIndex<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        let mut index = SnapshotIndex {
            entities: Vec::with_capacity(snapshot.entity_count()),
            layers: HashMap::new(),
            domains: HashMap::new(),
            terms: HashMap::new(),
            relationships: Vec::new(),
            warnings: Vec::new(),
        };

        for layer in &snapshot.layers {
            if index.admit(Entity::Layer(layer)) {
                index.layers.insert(&layer.id, layer);
            }
        }
        for domain in &snapshot.domains {
            if index.admit(Entity::Domain(domain)) {
                index.domains.insert(&domain.id, domain);
            }
        }
        for term in &snapshot.terms {
            if index.admit(Entity::Term(term)) {
                index.terms.insert(&term.id, term);
            }
        }

        // Dangling references are only detectable once every table is loaded.
        let mut dangling = Vec::new();
        for entity in &index.entities {
            let key = entity.key();
            match entity {
                Entity::Layer(_) => {}
                Entity::Domain(d) => {
                    if !index.layers.contains_key(d.layer_id.as_str()) {
                        dangling.push(BuildWarning::new(
                            key.to_string(),
                            format!("owning layer `{}` not found; hierarchy link skipped", d.layer_id),
                        ));
                    }
                }
                Entity::Term(t) => {
                    if !index.domains.contains_key(t.domain_id.as_str()) {
                        dangling.push(BuildWarning::new(
                            key.to_string(),
                            format!("owning domain `{}` not found; hierarchy link skipped", t.domain_id),
                        ));
                    }
                    if !index.layers.contains_key(t.layer_id.as_str()) {
                        dangling.push(BuildWarning::new(
                            key.to_string(),
                            format!("owning layer `{}` not found; layer link skipped", t.layer_id),
                        ));
                    }
                    if let Some(parent) = t.parent_term_id.as_deref().filter(|p| !p.is_empty()) {
                        if !index.terms.contains_key(parent) {
                            dangling.push(BuildWarning::new(
                                key.to_string(),
                                format!("parent term `{parent}` not found; parent link skipped"),
                            ));
                        }
                    }
                }
            }
        }
        index.warnings.extend(dangling);

        let mut seen_relationships = HashSet::new();
        for rel in &snapshot.term_relationships {
            let subject = format!("relationship:{}", rel.id);
            let problem = if rel.predicate.trim().is_empty() {
                Some("empty predicate".to_string())
            } else if !index.terms.contains_key(rel.source_term_id.as_str()) {
                Some(format!("source term `{}` not found", rel.source_term_id))
            } else if !index.terms.contains_key(rel.target_term_id.as_str()) {
                Some(format!("target term `{}` not found", rel.target_term_id))
            } else if !seen_relationships.insert((
                rel.source_term_id.as_str(),
                rel.target_term_id.as_str(),
                rel.predicate.as_str(),
            )) {
                Some("duplicate (source, target, predicate)".to_string())
            } else {
                None
            };
            match problem {
                Some(reason) => index.warnings.push(BuildWarning::new(subject, reason)),
                None => index.relationships.push(rel),
            }
        }

        index
    }

    /// Admit an entity unless it is malformed or its key is already taken.
    fn admit(&mut self, entity: Entity<'a>) -> bool {
        let key = entity.key();
        let problem = if entity.id().trim().is_empty() {
            Some("empty id")
        } else if entity.title().trim().is_empty() {
            Some("empty title")
        } else if self.contains(&key) {
            Some("duplicate id")
        } else {
            None
        };
        match problem {
            Some(reason) => {
                self.warnings.push(BuildWarning::new(key.to_string(), reason));
                false
            }
            None => {
                self.entities.push(entity);
                true
            }
        }
    }

    /// Valid entities in snapshot order: layers, then domains, then terms.
    pub fn entities(&self) -> &[Entity<'a>] {
        &self.entities
    }

    /// Relationships whose endpoints both exist.
    pub fn relationships(&self) -> &[&'a TermRelationship] {
        &self.relationships
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        let id = key.id.as_str();
        match key.kind {
            EntityKind::Layer => self.layers.contains_key(id),
            EntityKind::Domain => self.domains.contains_key(id),
            EntityKind::Term => self.terms.contains_key(id),
        }
    }

    pub fn layer(&self, id: &str) -> Option<&'a Layer> {
        self.layers.get(id).copied()
    }

    /// The hierarchy predicate for entities owned by `layer_id`; `fallback`
    /// applies when the layer is unknown or has no override.
    pub fn hierarchy_predicate<'b>(&self, layer_id: &str, fallback: &'b str) -> &'b str
    where
        'a: 'b,
    {
        match self.layer(layer_id) {
            Some(layer) => layer.hierarchy_predicate(fallback),
            None => fallback,
        }
    }

    /// Resolve the structural parents of an entity; absent targets are `None`.
    pub fn parents(&self, entity: &Entity<'a>) -> ParentLinks {
        match entity {
            Entity::Layer(_) => ParentLinks::default(),
            Entity::Domain(d) => ParentLinks {
                container: self
                    .layers
                    .contains_key(d.layer_id.as_str())
                    .then(|| NodeKey::layer(&d.layer_id)),
                ..Default::default()
            },
            Entity::Term(t) => ParentLinks {
                container: self
                    .domains
                    .contains_key(t.domain_id.as_str())
                    .then(|| NodeKey::domain(&t.domain_id)),
                layer: self
                    .layers
                    .contains_key(t.layer_id.as_str())
                    .then(|| NodeKey::layer(&t.layer_id)),
                parent_term: t
                    .parent_term_id
                    .as_deref()
                    .filter(|p| self.terms.contains_key(p))
                    .map(NodeKey::term),
            },
        }
    }

    /// Summary of what this index admitted.
    pub fn report(&self) -> BuildReport {
        BuildReport {
            entities: self.entities.len(),
            relationships: self.relationships.len(),
            warnings: self.warnings.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn layer(id: &str, title: &str, predicate: Option<&str>) -> Layer {
        Layer {
            id: id.into(),
            title: title.into(),
            definition: Some(format!("{title} layer")),
            primary_predicate: predicate.map(str::to_string),
            version: 1,
            created_at: None,
            last_modified: None,
        }
    }

    pub fn domain(id: &str, layer_id: &str, title: &str) -> Domain {
        Domain {
            id: id.into(),
            layer_id: layer_id.into(),
            title: title.into(),
            definition: Some(format!("{title} domain")),
            version: 1,
            created_at: None,
            last_modified: None,
        }
    }

    pub fn term(id: &str, domain_id: &str, layer_id: &str, title: &str, parent: Option<&str>) -> Term {
        Term {
            id: id.into(),
            domain_id: domain_id.into(),
            layer_id: layer_id.into(),
            title: title.into(),
            definition: Some(format!("{title} term")),
            parent_term_id: parent.map(str::to_string),
            version: 1,
            created_at: None,
            last_modified: None,
        }
    }

    pub fn relationship(id: &str, source: &str, target: &str, predicate: &str) -> TermRelationship {
        TermRelationship {
            id: id.into(),
            source_term_id: source.into(),
            target_term_id: target.into(),
            predicate: predicate.into(),
            created_at: None,
        }
    }

    /// L1 <- D1 <- {T1, T2}, T2 child of T1, T1 relates_to T2.
    pub fn scenario() -> Snapshot {
        Snapshot {
            layers: vec![layer("L1", "Layer One", Some("is_a"))],
            domains: vec![domain("D1", "L1", "Domain One")],
            terms: vec![
                term("T1", "D1", "L1", "Root Term", None),
                term("T2", "D1", "L1", "Child Term", Some("T1")),
            ],
            term_relationships: vec![relationship("R1", "T1", "T2", "relates_to")],
        }
    }
}
