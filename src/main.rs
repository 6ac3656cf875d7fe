//! taxograph CLI: build and query the taxonomy graphs from a snapshot export.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use taxonomy_graph::config::GraphConfig;
use taxonomy_graph::engine::GraphOrchestrator;
use taxonomy_graph::entity::NodeKey;
use taxonomy_graph::graph::Direction;
use taxonomy_graph::graph::analytics::ranked;
use taxonomy_graph::graph::queries::{example_queries, example_query};
use taxonomy_graph::snapshot::JsonSnapshotSource;

#[derive(Parser)]
#[command(name = "taxograph", version, about = "Taxonomy graph engine")]
struct Cli {
    /// JSON snapshot export (layers, domains, terms, term_relationships).
    #[arg(long, global = true, default_value = "taxonomy.json")]
    snapshot: PathBuf,

    /// TOML graph configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combined statistics of both graph models.
    Stats,

    /// Run a SPARQL query, or a named example query.
    Query {
        /// Query text; the cs, entity, rdf, rdfs, skos, dcterms, foaf and xsd
        /// prefixes are predeclared.
        sparql: Option<String>,

        /// Run a catalog query by name instead. Without either, list the catalog.
        #[arg(long, conflicts_with = "sparql")]
        example: Option<String>,
    },

    /// Serialize the triple model.
    Serialize {
        /// turtle, ntriples, rdfxml or json.
        #[arg(long, default_value = "turtle")]
        format: String,
    },

    /// Export both models (json), the triples (turtle) or the property graph (graphml).
    Export {
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Shortest directed path between two nodes, e.g. `term:T2 layer:L1`.
    Path { source: NodeKey, target: NodeKey },

    /// Breadth-first neighborhood of a node.
    Neighbors {
        node: NodeKey,

        #[arg(long, default_value = "1")]
        depth: usize,

        /// incoming, outgoing or both.
        #[arg(long, default_value = "both")]
        direction: Direction,
    },

    /// Centrality scores, highest first.
    Centrality {
        /// pagerank, betweenness, closeness or degree.
        #[arg(long, default_value = "pagerank")]
        method: String,

        /// Only print the top N nodes.
        #[arg(long)]
        top: Option<usize>,
    },

    /// Community partition of the undirected projection.
    Communities {
        /// louvain or label_propagation.
        #[arg(long, default_value = "louvain")]
        method: String,
    },

    /// Ancestor and descendant closure of a node.
    Closure { node: NodeKey },

    /// Links, neighborhood, rank and closure of a term.
    Term {
        id: String,

        #[arg(long, default_value = "2")]
        depth: usize,
    },

    /// Metadata and ranked subtree of a domain.
    Domain { id: String },

    /// Label search with an analysis of every hit.
    Search {
        text: String,

        #[arg(long, default_value = "1")]
        depth: usize,
    },

    /// Domain/layer listing, optionally narrowed to one layer.
    Layers {
        #[arg(long)]
        layer: Option<String>,
    },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GraphConfig::load(path)?,
        None => GraphConfig::default(),
    };
    let orch = GraphOrchestrator::new(JsonSnapshotSource::new(&cli.snapshot), config)?;

    match cli.command {
        Commands::Stats => print_json(&orch.comprehensive_stats()?)?,

        Commands::Query { sparql, example } => {
            let text = match (sparql, example) {
                (Some(sparql), _) => sparql,
                (None, Some(name)) => match example_query(&name) {
                    Some(query) => query.sparql.to_string(),
                    None => miette::bail!(
                        "unknown example query `{name}`; run `taxograph query` to list them"
                    ),
                },
                (None, None) => return print_json(&example_queries()),
            };
            print_json(&orch.query(&text)?)?;
        }

        Commands::Serialize { format } => print!("{}", orch.serialize(&format)?),

        Commands::Export { format } => print!("{}", orch.export_graph_data(&format)?),

        Commands::Path { source, target } => match orch.shortest_path(&source, &target) {
            Some(path) => print_json(&path)?,
            None => println!("no path from {source} to {target}"),
        },

        Commands::Neighbors {
            node,
            depth,
            direction,
        } => print_json(&orch.neighbors(&node, depth, direction))?,

        Commands::Centrality { method, top } => {
            let scores = ranked(&orch.centrality(&method)?);
            let shown = top.unwrap_or(scores.len()).min(scores.len());
            print_json(&scores[..shown])?;
        }

        Commands::Communities { method } => print_json(&orch.communities(&method)?)?,

        Commands::Closure { node } => print_json(&orch.ancestors_descendants(&node)?)?,

        Commands::Term { id, depth } => match orch.related_terms(&id, depth)? {
            Some(analysis) => print_json(&analysis)?,
            None => println!("term `{id}` not found"),
        },

        Commands::Domain { id } => match orch.domain_structure(&id)? {
            Some(structure) => print_json(&structure)?,
            None => println!("domain `{id}` not found"),
        },

        Commands::Search { text, depth } => print_json(&orch.search_and_analyze(&text, depth)?)?,

        Commands::Layers { layer } => print_json(&orch.layer_analytics(layer.as_deref())?)?,
    }

    Ok(())
}
