//! # adaptive-rag CLI (`arag`)
//!
//! Starts the HTTP API and provides offline helpers for sizing documents
//! against the mode threshold and chunking settings.
//!
//! ## Usage
//!
//! ```bash
//! arag [--config ./config/arag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `arag serve` | Start the HTTP server |
//! | `arag count <file>` | Token count and the mode the file alone selects |
//! | `arag chunk <file>` | Window offsets and sizes for a file |
//! | `arag index-info <base>` | Summarize a saved index snapshot |
//! | `arag completions <shell>` | Print a shell completion script |
//!
//! Logging goes to stderr and is filtered by `ARAG_LOG` (default `info`).
//! A `.env` file in the working directory is loaded before anything else.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use adaptive_rag::{config, inspect, server};
use adaptive_rag_core::tokens::ChunkingParams;

/// adaptive-rag: answer questions over uploaded documents, switching
/// between full-document context and retrieval as the corpus grows.
#[derive(Parser)]
#[command(
    name = "arag",
    about = "adaptive-rag: full-context or retrieval-augmented answers over your documents",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Optional; without it every setting takes its default. See
    /// `config/arag.example.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print a file's token count and the mode it would select on its own.
    Count {
        /// A `.pdf`, `.docx`, `.doc`, `.txt`, or `.md` file.
        file: PathBuf,
    },

    /// Print the token windows a file is split into.
    Chunk {
        file: PathBuf,
        /// Window size; defaults to `[chunking].max_tokens`.
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Overlap between windows; defaults to `[chunking].overlap_tokens`.
        #[arg(long)]
        overlap_tokens: Option<usize>,
    },

    /// Summarize an index snapshot (`<base>.vectors` + `<base>.meta.json`).
    IndexInfo {
        base: PathBuf,
    },

    /// Generate a shell completion script.
    Completions {
        shell: Shell,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("ARAG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "arag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Count { file } => {
            inspect::run_count(&cfg, &file)?;
        }
        Commands::Chunk {
            file,
            max_tokens,
            overlap_tokens,
        } => {
            let params = ChunkingParams::new(
                max_tokens.unwrap_or(cfg.chunking.max_tokens),
                overlap_tokens.unwrap_or(cfg.chunking.overlap_tokens),
            );
            params.validate()?;
            inspect::run_chunk(&cfg, &file, params)?;
        }
        Commands::IndexInfo { base } => {
            inspect::run_index_info(&cfg, &base)?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
