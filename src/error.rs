//! Rich diagnostic error types for the taxonomy graph engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers (and the HTTP layer in front of
//! this crate) can tell a bad query from a bad method name from a broken snapshot.
//!
//! Soft "not found" outcomes are never errors here: lookups on absent node keys
//! return `None` or an empty collection.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the taxonomy graph engine.
#[derive(Debug, Error, Diagnostic)]
pub enum TaxonomyError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("SPARQL query failed: {message}")]
    #[diagnostic(
        code(taxograph::graph::query),
        help(
            "Check the query syntax. The prefixes cs, entity, rdf, rdfs, skos, \
             dcterms, foaf and xsd are predeclared; any other prefix must be \
             declared with PREFIX. Offending query:\n{query}"
        )
    )]
    Query { query: String, message: String },

    #[error("unknown {kind} method: {method}")]
    #[diagnostic(
        code(taxograph::graph::unknown_method),
        help("Supported {kind} methods are: {supported}.")
    )]
    UnknownMethod {
        kind: &'static str,
        method: String,
        supported: Supported,
    },

    #[error("unsupported format: {format}")]
    #[diagnostic(
        code(taxograph::graph::unsupported_format),
        help("Supported formats are: {supported}.")
    )]
    UnsupportedFormat { format: String, supported: Supported },

    #[error("closure scan visited {visited} nodes, exceeding the budget of {budget}")]
    #[diagnostic(
        code(taxograph::graph::scan_budget),
        help(
            "Ancestor/descendant and subtree scans are bounded by `max_scan_nodes`. \
             Raise the budget in the graph config or query a smaller subtree."
        )
    )]
    ScanBudgetExceeded { budget: usize, visited: usize },

    #[error("triple store error: {message}")]
    #[diagnostic(
        code(taxograph::graph::store),
        help("The in-memory oxigraph store failed. This usually indicates a bug; please report it.")
    )]
    Store { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(taxograph::graph::serialize),
        help("Rendering the graph to text failed. Try another format.")
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {path}")]
    #[diagnostic(
        code(taxograph::snapshot::read),
        help("Ensure the snapshot file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {message}")]
    #[diagnostic(
        code(taxograph::snapshot::parse),
        help(
            "The snapshot must be a JSON object with the arrays `layers`, `domains`, \
             `terms` and `term_relationships`."
        )
    )]
    Parse { path: String, message: String },

    #[error("invalid node key: {key}")]
    #[diagnostic(
        code(taxograph::snapshot::node_key),
        help("Node keys look like `layer:<id>`, `domain:<id>` or `term:<id>`.")
    )]
    InvalidNodeKey { key: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read graph config: {path}")]
    #[diagnostic(
        code(taxograph::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse graph config: {message}")]
    #[diagnostic(
        code(taxograph::config::parse),
        help("Check the TOML syntax in the graph config file.")
    )]
    Parse { message: String },

    #[error("invalid graph config: {message}")]
    #[diagnostic(code(taxograph::config::invalid), help("{message}"))]
    Invalid { message: String },
}

/// The accepted names for a method or format argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supported(pub Vec<&'static str>);

impl std::fmt::Display for Supported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Convenience alias for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Convenience alias for functions returning taxonomy graph results.
pub type TaxonomyResult<T> = std::result::Result<T, TaxonomyError>;

impl GraphError {
    pub(crate) fn query(query: &str, err: impl std::fmt::Display) -> Self {
        Self::Query {
            query: query.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }

    pub(crate) fn unsupported_format(format: &str, supported: &[&'static str]) -> Self {
        Self::UnsupportedFormat {
            format: format.to_string(),
            supported: Supported(supported.to_vec()),
        }
    }

    pub(crate) fn unknown_method(
        kind: &'static str,
        method: &str,
        supported: &[&'static str],
    ) -> Self {
        Self::UnknownMethod {
            kind,
            method: method.to_string(),
            supported: Supported(supported.to_vec()),
        }
    }
}
