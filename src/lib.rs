// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # taxonomy-graph
//!
//! A dual-representation graph engine for layered taxonomies (layers, domains,
//! terms and free-form term relationships).
//!
//! ## Architecture
//!
//! - **Snapshot** (`snapshot`, `entity`): the relational rows, validated into a
//!   closed `Entity` variant with composite `NodeKey` identities
//! - **Triple model** (`graph::sparql`): an in-memory oxigraph store queried with SPARQL
//! - **Property graph** (`graph::index`): a petgraph digraph with child → parent
//!   hierarchy edges and source → target relationship edges
//! - **Analytics** (`graph::{traverse, analytics, community}`): paths,
//!   neighborhoods, closures, centrality and community detection
//! - **Orchestrator** (`engine`): owns both models behind an atomically swapped
//!   snapshot and answers combined queries
//!
//! ## Library usage
//!
//! ```no_run
//! use taxonomy_graph::config::GraphConfig;
//! use taxonomy_graph::engine::GraphOrchestrator;
//! use taxonomy_graph::entity::NodeKey;
//! use taxonomy_graph::snapshot::JsonSnapshotSource;
//!
//! let orch = GraphOrchestrator::new(
//!     JsonSnapshotSource::new("taxonomy.json"),
//!     GraphConfig::default(),
//! )
//! .unwrap();
//! let path = orch.shortest_path(&NodeKey::term("T2"), &NodeKey::layer("L1"));
//! let rows = orch.query("SELECT ?t WHERE { ?t a cs:Term }").unwrap();
//! orch.refresh().unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod export;
pub mod graph;
pub mod snapshot;
