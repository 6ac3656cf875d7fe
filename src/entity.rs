//! Core entity types of the taxonomy.
//!
//! The relational store owns four record types: [`Layer`], [`Domain`], [`Term`]
//! and [`TermRelationship`]. The graph engine only ever reads them. Graph nodes
//! are addressed by a [`NodeKey`], the pair of [`EntityKind`] and entity id,
//! rendered as `"<kind>:<id>"`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// The hierarchy predicate used when a layer does not override it.
pub const DEFAULT_PREDICATE: &str = "is_a";

fn default_version() -> i64 {
    1
}

/// Classification of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Layer,
    Domain,
    Term,
}

impl EntityKind {
    /// The lowercase name used in node keys and entity IRIs.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Layer => "layer",
            EntityKind::Domain => "domain",
            EntityKind::Term => "term",
        }
    }

    /// The RDF class local name (`Layer`, `Domain`, `Term`).
    pub fn class_name(self) -> &'static str {
        match self {
            EntityKind::Layer => "Layer",
            EntityKind::Domain => "Domain",
            EntityKind::Term => "Term",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer" => Ok(EntityKind::Layer),
            "domain" => Ok(EntityKind::Domain),
            "term" => Ok(EntityKind::Term),
            other => Err(SnapshotError::InvalidNodeKey {
                key: other.to_string(),
            }),
        }
    }
}

/// Composite node identity: entity kind plus entity id.
///
/// Two logical entities never share a key because the kind is part of it; a
/// layer and a term with the same raw id are distinct nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub kind: EntityKind,
    pub id: String,
}

impl NodeKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn layer(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Layer, id)
    }

    pub fn domain(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Domain, id)
    }

    pub fn term(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Term, id)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for NodeKey {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SnapshotError::InvalidNodeKey { key: s.to_string() };
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }
        let kind = kind.parse::<EntityKind>().map_err(|_| invalid())?;
        Ok(NodeKey::new(kind, id))
    }
}

impl Serialize for NodeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Top level of the taxonomy; carries the hierarchy predicate override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub primary_predicate: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Layer {
    /// The hierarchy predicate used for everything below this layer;
    /// `fallback` applies when the override is absent or blank.
    pub fn hierarchy_predicate<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.primary_predicate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub layer_id: String,
    pub title: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: String,
    pub domain_id: String,
    pub layer_id: String,
    pub title: String,
    #[serde(default)]
    pub definition: Option<String>,
    /// Same-domain tree parent.
    #[serde(default)]
    pub parent_term_id: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// A user-defined, predicate-labelled link between two terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRelationship {
    pub id: String,
    pub source_term_id: String,
    pub target_term_id: String,
    pub predicate: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A node-bearing entity. Relationships are edges, not nodes, so they are
/// not part of this type.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Layer(&'a Layer),
    Domain(&'a Domain),
    Term(&'a Term),
}

impl<'a> Entity<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Layer(_) => EntityKind::Layer,
            Entity::Domain(_) => EntityKind::Domain,
            Entity::Term(_) => EntityKind::Term,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            Entity::Layer(l) => &l.id,
            Entity::Domain(d) => &d.id,
            Entity::Term(t) => &t.id,
        }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.kind(), self.id())
    }

    pub fn title(&self) -> &'a str {
        match self {
            Entity::Layer(l) => &l.title,
            Entity::Domain(d) => &d.title,
            Entity::Term(t) => &t.title,
        }
    }

    /// The definition, treating an empty string as absent.
    pub fn definition(&self) -> Option<&'a str> {
        let def = match self {
            Entity::Layer(l) => l.definition.as_deref(),
            Entity::Domain(d) => d.definition.as_deref(),
            Entity::Term(t) => t.definition.as_deref(),
        };
        def.filter(|d| !d.is_empty())
    }

    pub fn version(&self) -> i64 {
        match self {
            Entity::Layer(l) => l.version,
            Entity::Domain(d) => d.version,
            Entity::Term(t) => t.version,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Entity::Layer(l) => l.created_at,
            Entity::Domain(d) => d.created_at,
            Entity::Term(t) => t.created_at,
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Entity::Layer(l) => l.last_modified,
            Entity::Domain(d) => d.last_modified,
            Entity::Term(t) => t.last_modified,
        }
    }

    /// The layer this entity lives in (itself, for a layer).
    pub fn layer_id(&self) -> &'a str {
        match self {
            Entity::Layer(l) => &l.id,
            Entity::Domain(d) => &d.layer_id,
            Entity::Term(t) => &t.layer_id,
        }
    }
}
