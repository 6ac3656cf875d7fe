//! Taxonomy graph: two views of the same entity snapshot.
//!
//! - **Triple model** ([`TripleGraph`]): RDF statements in an `oxigraph` store,
//!   queried with SPARQL and serialized to standard RDF text formats
//! - **Property graph** ([`PropertyGraph`]): a `petgraph` directed graph with
//!   typed nodes and edges, used for paths, neighborhoods, centrality,
//!   communities and closure queries
//!
//! Both are built independently from a [`crate::snapshot::Snapshot`] and never
//! mutated afterwards.

pub mod analytics;
pub mod community;
pub mod index;
pub mod queries;
pub mod sparql;
pub mod traverse;
pub mod vocab;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind};
use crate::error::GraphError;

pub use index::PropertyGraph;
pub use sparql::TripleGraph;

/// Attributes carried by every property-graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub entity_id: String,
    pub title: String,
    pub definition: Option<String>,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Layers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_predicate: Option<String>,
    /// Domains and terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<String>,
    /// Terms only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_term_id: Option<String>,
}

impl NodeAttributes {
    pub fn from_entity(entity: &Entity<'_>) -> Self {
        let mut attrs = NodeAttributes {
            kind: entity.kind(),
            entity_id: entity.id().to_string(),
            title: entity.title().to_string(),
            definition: entity.definition().map(str::to_string),
            version: entity.version(),
            created_at: entity.created_at(),
            last_modified: entity.last_modified(),
            primary_predicate: None,
            layer_id: None,
            domain_id: None,
            parent_term_id: None,
        };
        match entity {
            Entity::Layer(layer) => {
                attrs.primary_predicate = layer.primary_predicate.clone();
            }
            Entity::Domain(domain) => {
                attrs.layer_id = Some(domain.layer_id.clone());
            }
            Entity::Term(term) => {
                attrs.layer_id = Some(term.layer_id.clone());
                attrs.domain_id = Some(term.domain_id.clone());
                attrs.parent_term_id = term.parent_term_id.clone().filter(|p| !p.is_empty());
            }
        }
        attrs
    }
}

/// Structural containment versus user-defined links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Hierarchical,
    Relationship,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Hierarchical => "hierarchical",
            EdgeKind::Relationship => "relationship",
        }
    }
}

/// What an edge means for its source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    /// Domain -> layer, term -> domain.
    BelongsTo,
    /// Term -> parent term.
    ChildOf,
    /// Term -> term, from a term relationship.
    RelatedTo,
}

impl EdgeRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeRelation::BelongsTo => "belongs_to",
            EdgeRelation::ChildOf => "child_of",
            EdgeRelation::RelatedTo => "related_to",
        }
    }
}

/// Attributes carried by every property-graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    pub kind: EdgeKind,
    /// Hierarchy predicate for structural edges, the relationship's own label
    /// otherwise.
    pub predicate: String,
    pub relationship: EdgeRelation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EdgeAttributes {
    pub fn hierarchical(relation: EdgeRelation, predicate: &str) -> Self {
        Self {
            kind: EdgeKind::Hierarchical,
            predicate: predicate.to_string(),
            relationship: relation,
            relationship_id: None,
            created_at: None,
        }
    }
}

/// Which edge directions a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

impl Direction {
    pub const SUPPORTED: &'static [&'static str] = &["incoming", "outgoing", "both"];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
            Direction::Both => "both",
        })
    }
}

impl FromStr for Direction {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incoming" | "in" => Ok(Direction::Incoming),
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "both" => Ok(Direction::Both),
            _ => Err(GraphError::unknown_method("direction", s, Self::SUPPORTED)),
        }
    }
}
