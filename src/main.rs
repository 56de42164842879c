//! # Facility RAG CLI (`frag`)
//!
//! ## Usage
//!
//! ```bash
//! frag --config ./config/frag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `frag ingest` | Normalize, deduplicate, embed, and index a log batch |
//! | `frag ask "<question>"` | Ingest the configured batch, then answer one question |
//! | `frag reset` | Discard the index and processed-hash file |
//! | `frag stats` | Index size, embedder, and consistency status |
//! | `frag serve` | Ingest, then serve `POST /ask` over HTTP |
//!
//! Logs go to stderr; set `RUST_LOG` to adjust (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use facility_rag::config;
use facility_rag::pipeline::Pipeline;
use facility_rag::{ask, ingest, server, stats};

/// Facility RAG: ask questions about room occupancy and energy logs.
#[derive(Parser)]
#[command(
    name = "frag",
    about = "Facility RAG: question answering over room occupancy and energy logs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/frag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a room-log batch into the index.
    ///
    /// Re-running on the same or an overlapping batch stores only records
    /// not seen before.
    Ingest {
        /// Input JSON file (defaults to `[ingest].input`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Discard the index and processed-hash file first.
        #[arg(long)]
        force_reset: bool,
    },

    /// Ask one question.
    Ask {
        /// The question.
        query: String,

        /// Print `{answer, sources}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Discard the index and processed-hash file.
    Reset,

    /// Show index statistics.
    Stats,

    /// Ingest the configured batch, then start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { input, force_reset } => {
            ingest::run_ingest(&cfg, input, force_reset).await?;
        }
        Commands::Ask { query, json } => {
            ask::run_ask(&cfg, &query, json).await?;
        }
        Commands::Reset => {
            ingest::run_reset(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            let pipeline = Arc::new(Pipeline::from_config(&cfg).await?);
            // Serve even if this fails: /health reports the state, /ask answers 503.
            if let Err(e) = pipeline.ingest_file(&cfg.ingest.input, false).await {
                tracing::warn!(error = %e, "startup ingestion failed");
            }
            server::run_server(&cfg, pipeline).await?;
        }
    }

    Ok(())
}
