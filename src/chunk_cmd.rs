use anyhow::{bail, Result};
use std::path::Path;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::connector_fs;

/// `kb-ingest chunk`: print how a local file would be chunked.
///
/// Nothing is embedded or stored.
pub fn run_chunk_preview(
    config: &Config,
    path: &Path,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    let size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = chunk_overlap.unwrap_or(config.chunking.chunk_overlap);
    if size == 0 {
        bail!("--chunk-size must be > 0");
    }

    let doc = connector_fs::read_file(path, None)?;
    let chunks = chunk_document(&doc, size, overlap)?;
    let total = chunks.len();

    for chunk in chunks {
        let text = chunk.text();
        println!(
            "--- chunk {}/{} ({} chars, overlap {}) ---",
            chunk.index + 1,
            total,
            text.chars().count(),
            chunk.overlap_prefix.chars().count()
        );
        println!("{}", text);
    }

    println!("chunk {}", path.display());
    println!("  content: {} chars", doc.content.chars().count());
    println!("  chunks: {}", total);
    Ok(())
}
