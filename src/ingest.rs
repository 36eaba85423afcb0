//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: source → chunking → embedding → storage.
//! Chunks are processed in fixed-size batches. Within a batch each chunk
//! is embedded sequentially under the rate limiter; a failed embedding is
//! non-fatal and leaves an empty placeholder. A failed store write is
//! fatal and aborts the run.

use anyhow::{bail, Context, Result};

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::embedding::{self, embed_batch, EmbeddingProvider};
use crate::models::{Chunk, Document, KnowledgeRow};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::rate_limit::RateLimiter;
use crate::sources::{self, SourceRequest};
use crate::store::{self, VectorStore};

/// Per-run knobs, resolved from config plus CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub skip_failed_embeddings: bool,
}

impl IngestOptions {
    pub fn from_config(
        config: &Config,
        chunk_size: Option<usize>,
        chunk_overlap: Option<usize>,
    ) -> Result<Self> {
        let opts = Self {
            chunk_size: chunk_size.unwrap_or(config.chunking.chunk_size),
            chunk_overlap: chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
            batch_size: config.embedding.batch_size,
            skip_failed_embeddings: config.store.skip_failed_embeddings(),
        };
        if opts.chunk_size == 0 {
            bail!("--chunk-size must be > 0");
        }
        if opts.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        Ok(opts)
    }
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks: u64,
    pub batches: u64,
    pub rows_stored: u64,
    pub failed_embeddings: u64,
    pub skipped_rows: u64,
}

/// Chunk, embed, and store a single document.
pub async fn ingest_document(
    doc: &Document,
    opts: &IngestOptions,
    provider: &dyn EmbeddingProvider,
    limiter: &RateLimiter,
    store: &dyn VectorStore,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let chunks: Vec<Chunk> = chunk_document(doc, opts.chunk_size, opts.chunk_overlap)?.collect();
    let total_chunks = chunks.len();
    let total_batches = total_chunks.div_ceil(opts.batch_size) as u64;

    tracing::info!(chunks = total_chunks, batches = total_batches, "created chunks");
    progress.report(IngestProgressEvent::Chunked {
        chunks: total_chunks as u64,
    });

    let mut report = IngestReport {
        chunks: total_chunks as u64,
        ..IngestReport::default()
    };

    for (i, batch) in chunks.chunks(opts.batch_size).enumerate() {
        let n = i as u64 + 1;
        let texts: Vec<String> = batch.iter().map(Chunk::text).collect();
        let embeddings = embed_batch(provider, limiter, &texts).await;

        let mut rows = Vec::with_capacity(batch.len());
        for (chunk, embedding) in batch.iter().zip(embeddings) {
            let row = KnowledgeRow::from_chunk(chunk, embedding, total_chunks);
            if row.is_placeholder() {
                if provider.is_enabled() {
                    report.failed_embeddings += 1;
                }
                if opts.skip_failed_embeddings {
                    report.skipped_rows += 1;
                    continue;
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            tracing::warn!(batch = n, "no rows with embeddings to store in batch");
        }

        let written = store
            .insert(&rows)
            .await
            .with_context(|| format!("Failed to store batch {}/{} in {}", n, total_batches, store.name()))?;

        report.batches += 1;
        report.rows_stored += written as u64;
        tracing::info!(batch = n, total = total_batches, rows = written, "processed batch");
        progress.report(IngestProgressEvent::BatchStored {
            n,
            total: total_batches,
            rows: written as u64,
        });
    }

    Ok(report)
}

/// `kb-ingest ingest`: retrieve, chunk, embed, and store.
#[allow(clippy::too_many_arguments)]
pub async fn run_ingest(
    config: &Config,
    request: &SourceRequest,
    tag: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let opts = IngestOptions::from_config(config, chunk_size, chunk_overlap)?;
    let label = request.kind().label();

    tracing::info!(source = label, "retrieving content");
    let doc = sources::retrieve(config, request, tag).await?;
    let content_chars = doc.content.chars().count();

    if dry_run {
        let chunks = chunk_document(&doc, opts.chunk_size, opts.chunk_overlap)?.len();
        println!("ingest {} (dry-run)", label);
        println!("  content: {} chars", content_chars);
        println!("  chunks: {}", chunks);
        println!("  batches: {}", chunks.div_ceil(opts.batch_size));
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let limiter = RateLimiter::from_config(&config.rate_limit)?;
    let store = store::open_store(config).await?;
    let reporter = progress.reporter();

    let report = ingest_document(
        &doc,
        &opts,
        provider.as_ref(),
        &limiter,
        store.as_ref(),
        reporter.as_ref(),
    )
    .await?;

    println!("ingest {}", label);
    println!("  content: {} chars", content_chars);
    println!("  chunks: {}", report.chunks);
    println!("  batches: {}", report.batches);
    println!("  rows stored: {}", report.rows_stored);
    if provider.is_enabled() {
        println!("  failed embeddings: {}", report.failed_embeddings);
    }
    if report.skipped_rows > 0 {
        println!("  skipped rows: {}", report.skipped_rows);
    }
    println!("ok");

    Ok(())
}
