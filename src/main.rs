//! # kb-ingest CLI
//!
//! The `kb-ingest` binary retrieves content, chunks it, embeds each chunk,
//! and appends the results to the configured vector store.
//!
//! ## Usage
//!
//! ```bash
//! kb-ingest --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb-ingest ingest --source brave --query "<q>"` | Ingest Brave search results |
//! | `kb-ingest ingest --source url --url <url>` | Ingest a single web page |
//! | `kb-ingest ingest --source file --path <path>` | Ingest a local text file |
//! | `kb-ingest chunk <path>` | Print the chunks of a local file |
//! | `kb-ingest init` | Create the SQLite table (sqlite backend) |
//!
//! Secrets are read from the environment (a `.env` file is honored):
//! `BRAVE_API_KEY`, `GOOGLE_API_KEY`, `OPENAI_API_KEY`, `SUPABASE_URL`,
//! `SUPABASE_KEY`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kb_ingest::chunk_cmd;
use kb_ingest::config;
use kb_ingest::ingest;
use kb_ingest::migrate;
use kb_ingest::progress::ProgressMode;
use kb_ingest::sources::SourceRequest;

/// kb-ingest: chunk, embed, and store content for retrieval.
#[derive(Parser)]
#[command(
    name = "kb-ingest",
    about = "Ingest web search results, web pages, and local files into a vector knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kb.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Source {
    Brave,
    Url,
    File,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite knowledge table.
    ///
    /// Only valid for the sqlite backend. Idempotent.
    Init,

    /// Retrieve content from a source and ingest it.
    Ingest {
        /// Where to retrieve content from.
        #[arg(long, value_enum)]
        source: Source,

        /// Search query (required for `--source brave`).
        #[arg(long, required_if_eq("source", "brave"))]
        query: Option<String>,

        /// Page URL (required for `--source url`).
        #[arg(long, required_if_eq("source", "url"))]
        url: Option<String>,

        /// File path (required for `--source file`).
        #[arg(long, required_if_eq("source", "file"))]
        path: Option<PathBuf>,

        /// Tag stored in each row's metadata. Defaults per source.
        #[arg(long)]
        tag: Option<String>,

        /// Maximum characters per chunk body.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters carried over from the previous chunk.
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Retrieve and chunk only; print counts without embedding or storing.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `off`, `human`, or `json`. Defaults to human
        /// on a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print how a local file would be chunked.
    Chunk {
        /// File to chunk.
        path: PathBuf,

        /// Maximum characters per chunk body.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters carried over from the previous chunk.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg.store).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            source,
            query,
            url,
            path,
            tag,
            chunk_size,
            chunk_overlap,
            dry_run,
            progress,
        } => {
            let progress = ProgressMode::parse(progress.as_deref())?;
            // clap enforces the option matching `--source`
            let request = match (source, query, url, path) {
                (Source::Brave, Some(query), _, _) => SourceRequest::Brave { query },
                (Source::Url, _, Some(url), _) => SourceRequest::Url { url },
                (Source::File, _, _, Some(path)) => SourceRequest::File { path },
                (source, ..) => anyhow::bail!("missing argument for --source {:?}", source),
            };
            ingest::run_ingest(
                &cfg,
                &request,
                tag,
                chunk_size,
                chunk_overlap,
                dry_run,
                progress,
            )
            .await?;
        }
        Commands::Chunk {
            path,
            chunk_size,
            chunk_overlap,
        } => {
            chunk_cmd::run_chunk_preview(&cfg, &path, chunk_size, chunk_overlap)?;
        }
    }

    Ok(())
}
