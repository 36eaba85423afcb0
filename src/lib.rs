//! # kb-ingest
//!
//! Knowledge-base ingestion for retrieval-augmented generation.
//!
//! `kb-ingest` pulls text from a source (Brave web search, a single web
//! page, or a local file), splits it into bounded overlapping chunks,
//! embeds each chunk under a rolling-window rate limit, and appends the
//! results to a vector store (Supabase or a local SQLite table).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │   Sources   │──▶│ Chunker  │──▶│  Embedding  │──▶│  Store   │
//! │ Brave/URL/FS│   │ ¶ → . → w│   │ rate-limited│   │ Supabase │
//! └─────────────┘   └──────────┘   └─────────────┘   │ / SQLite │
//!                                                    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb-ingest ingest --source brave --query "window installation guide"
//! kb-ingest ingest --source url --url https://example.com/guide --tag guides
//! kb-ingest ingest --source file --path ./docs/faq.md --dry-run
//! kb-ingest chunk ./docs/faq.md --chunk-size 500 --chunk-overlap 50
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Paragraph → sentence → word chunking with overlap |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, chunks, and stored rows |
//! | [`sources`] | Source dispatch |
//! | [`connector_brave`] | Brave Search connector |
//! | [`connector_url`] | Single web page connector |
//! | [`connector_fs`] | Local file connector |
//! | [`rate_limit`] | Rolling-window request limiter |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`ingest`] | Pipeline orchestration |
//! | [`progress`] | Batch progress reporting |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | SQLite schema |

pub mod chunk;
pub mod chunk_cmd;
pub mod config;
pub mod connector_brave;
pub mod connector_fs;
pub mod connector_url;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod rate_limit;
pub mod sources;
pub mod store;
