//! # LocalMind CLI (`localmind`)
//!
//! Index a folder of documents and ask questions about them.
//!
//! ## Usage
//!
//! ```bash
//! localmind --config ./config/localmind.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `localmind init` | Create the vector store schema and the data directory |
//! | `localmind ingest` | Chunk, embed and store every document in the data directory |
//! | `localmind cli` | Interactive question loop |
//! | `localmind api` | Serve `POST /ask` over HTTP |
//! | `localmind stats` | Show what is indexed |
//! | `localmind clear` | Delete every indexed chunk |
//!
//! Logs go to stderr (`RUST_LOG` controls the level, default `info`);
//! command output goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use localmind::config::{self, Config};
use localmind::context::AppContext;
use localmind::{ingest, repl, server, stats, store};

/// LocalMind — question answering over your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/localmind.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "localmind",
    about = "LocalMind — question answering over your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/localmind.toml`. A missing file means built-in
    /// defaults plus environment overrides.
    #[arg(long, global = true, default_value = "./config/localmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector store schema and the data directory.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Index every document in the data directory.
    ///
    /// Re-running replaces each document's chunks, so the store always
    /// holds the current version. Exits non-zero if any document failed.
    Ingest {
        /// Show document and estimated chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask questions interactively. Type `exit`, `quit` or an empty line to stop.
    Cli,

    /// Serve the HTTP API (`POST /ask`, `GET /health`).
    Api {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show chunk and document counts and the bound embedding model.
    Stats,

    /// Delete every indexed chunk and forget the embedding model.
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Ingest { dry_run: true } => ingest::run_dry_run(&cfg).await?,
        Commands::Ingest { dry_run: false } => {
            let ctx = AppContext::init(cfg).await?;
            let result = ingest::run_ingest(&ctx).await;
            ctx.shutdown().await;
            result?;
        }
        Commands::Cli => {
            let ctx = AppContext::init(cfg).await?;
            let service = ctx.answer_service();
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            let result = repl::run_loop(&service, stdin.lock(), &mut stdout).await;
            ctx.shutdown().await;
            result?;
        }
        Commands::Api { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let ctx = AppContext::init(cfg).await?;
            let result = server::run_server(ctx.answer_service(), &bind).await;
            ctx.shutdown().await;
            result?;
        }
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Clear => {
            let store = store::open(&cfg).await?;
            store::with_store(store, |s| async move { s.clear().await }).await?;
            println!("Cleared vector store at {}", cfg.db.url);
        }
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> Result<()> {
    let store = store::open(cfg)
        .await
        .with_context(|| format!("Failed to initialize vector store at {}", cfg.db.url))?;
    store.close().await;

    std::fs::create_dir_all(&cfg.ingest.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            cfg.ingest.data_dir.display()
        )
    })?;

    println!("Vector store initialized at {}", cfg.db.url);
    println!("Put documents in {}", cfg.ingest.data_dir.display());
    Ok(())
}
