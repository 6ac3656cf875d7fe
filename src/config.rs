//! Graph engine configuration, loadable from TOML.
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields the stock configuration.

use std::path::Path;

use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};

use crate::entity::DEFAULT_PREDICATE;
use crate::error::ConfigError;

/// PageRank power-iteration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRankConfig {
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold, scaled by node count like the L1 error it bounds.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Configuration for building and querying both graph models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Namespace for classes and predicates (`cs:`).
    #[serde(default = "default_vocab_namespace")]
    pub vocab_namespace: String,
    /// Namespace for entity IRIs (`entity:`).
    #[serde(default = "default_entity_namespace")]
    pub entity_namespace: String,
    /// Hierarchy predicate for layers without a primary predicate.
    #[serde(default = "default_predicate")]
    pub default_predicate: String,
    #[serde(default)]
    pub pagerank: PageRankConfig,
    #[serde(default = "default_max_iterations")]
    pub label_propagation_max_iterations: usize,
    #[serde(default = "default_resolution")]
    pub louvain_resolution: f64,
    /// Node budget for closure scans; `None` means unbounded.
    #[serde(default)]
    pub max_scan_nodes: Option<usize>,
}

fn default_vocab_namespace() -> String {
    "http://context-studio.local/vocab/".into()
}
fn default_entity_namespace() -> String {
    "http://context-studio.local/entity/".into()
}
fn default_predicate() -> String {
    DEFAULT_PREDICATE.into()
}
fn default_damping() -> f64 {
    0.85
}
fn default_max_iterations() -> usize {
    100
}
fn default_tolerance() -> f64 {
    1.0e-6
}
fn default_resolution() -> f64 {
    1.0
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            vocab_namespace: default_vocab_namespace(),
            entity_namespace: default_entity_namespace(),
            default_predicate: default_predicate(),
            pagerank: PageRankConfig::default(),
            label_propagation_max_iterations: default_max_iterations(),
            louvain_resolution: default_resolution(),
            max_scan_nodes: None,
        }
    }
}

impl GraphConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if !(self.pagerank.damping > 0.0 && self.pagerank.damping < 1.0) {
            return invalid("pagerank.damping must lie strictly between 0 and 1");
        }
        if self.pagerank.max_iterations == 0 {
            return invalid("pagerank.max_iterations must be at least 1");
        }
        if !(self.pagerank.tolerance > 0.0) {
            return invalid("pagerank.tolerance must be positive");
        }
        if self.label_propagation_max_iterations == 0 {
            return invalid("label_propagation_max_iterations must be at least 1");
        }
        if !(self.louvain_resolution > 0.0) {
            return invalid("louvain_resolution must be positive");
        }
        if self.default_predicate.trim().is_empty() {
            return invalid("default_predicate must not be empty");
        }
        for (name, ns) in [
            ("vocab_namespace", &self.vocab_namespace),
            ("entity_namespace", &self.entity_namespace),
        ] {
            if !(ns.ends_with('/') || ns.ends_with('#')) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must end with `/` or `#`"),
                });
            }
            if let Err(e) = NamedNode::new(ns.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} is not a valid IRI: {e}"),
                });
            }
        }
        Ok(())
    }
}
