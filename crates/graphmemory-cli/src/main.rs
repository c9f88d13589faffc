//! Graphmemory CLI
//!
//! Thin command-line wiring over `graphmemory_core::Engine` (`add`,
//! `cognify`, `search`, `prune`, `stats`). Demonstrates the façade's public
//! API end to end; it is not itself part of the engine's scope.

mod demo_clients;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphmemory_core::{
    AddMemoryInput, CancellationToken, CognifyOptions, Config, Engine, PruneOptions, SearchMode,
    SearchOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use demo_clients::{HashEmbeddingClient, NaiveExtractionClient};

/// graphmemory - knowledge-graph memory engine CLI
#[derive(Parser)]
#[command(name = "graphmemory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line interface for the graphmemory knowledge-graph memory engine")]
struct Cli {
    /// Path to the SQLite database file. Omit for an ephemeral in-memory engine.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a structured memory (topic + context) and ingest it immediately.
    Add {
        topic: String,
        context: String,
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Buffer raw text and run the three-phase ingestion pipeline over it.
    Cognify {
        text: String,
        #[arg(long, default_value = "cli")]
        source: String,
        #[arg(long)]
        force: bool,
    },

    /// Run a similarity/graph/hybrid search against the stored graph.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long, default_value = "vector")]
        mode: String,
    },

    /// Remove aged-out and superseded memories and their orphaned provenance.
    Prune {
        #[arg(long)]
        max_age_days: Option<f64>,
        #[arg(long)]
        min_decay_score: Option<f64>,
        #[arg(long)]
        dry_run: bool,
    },

    /// Print node/edge/memory counts and buffer state.
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = Config::default();
    config.db_path = cli.db.clone();

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start engine: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&engine, cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(engine: &Engine, command: Commands) -> Result<(), graphmemory_core::EngineError> {
    let cancellation = CancellationToken::new();
    let embedder = HashEmbeddingClient::new(256);
    let llm = NaiveExtractionClient;

    match command {
        Commands::Add {
            topic,
            context,
            source,
        } => {
            let input = AddMemoryInput {
                topic,
                context,
                source,
                ..Default::default()
            };
            let result = engine
                .add_memory(input, &embedder, &llm, &cancellation)
                .await?;
            info!(
                memory_id = ?result.memory_id,
                nodes_created = result.nodes_created,
                edges_created = result.edges_created,
                "memory added"
            );
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
        }
        Commands::Cognify {
            text,
            source,
            force,
        } => {
            engine.add(&text, &source);
            let result = engine
                .cognify(
                    CognifyOptions {
                        skip_processed: true,
                        force,
                    },
                    &embedder,
                    &llm,
                    &cancellation,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
        }
        Commands::Search { query, top_k, mode } => {
            let search_mode = match mode.as_str() {
                "graph" => SearchMode::Graph,
                "hybrid" => SearchMode::Hybrid,
                _ => SearchMode::Vector,
            };
            let options = SearchOptions {
                mode: search_mode,
                top_k,
                ..Default::default()
            };
            let response = engine
                .search(&query, &embedder, &options, &cancellation)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
        }
        Commands::Prune {
            max_age_days,
            min_decay_score,
            dry_run,
        } => {
            let options = PruneOptions {
                max_age_days,
                min_decay_score,
                dry_run,
                ..Default::default()
            };
            let result = engine.prune(&options)?;
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!(
                "nodes={} edges={} memories={} buffered_docs={} last_cognified={:?}",
                stats.node_count,
                stats.edge_count,
                stats.memory_count,
                stats.buffered_docs,
                stats.last_cognified
            );
        }
    }

    engine.close()?;
    Ok(())
}
