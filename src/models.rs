//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the documents, chunks, and stored rows that flow
//! from a content source through chunking and embedding into the vector
//! store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Where a document's content was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Brave,
    Url,
    File,
}

impl SourceKind {
    /// Label written into row metadata under `source`.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Brave => "brave_search",
            SourceKind::Url => "url",
            SourceKind::File => "file",
        }
    }

    /// Tag applied when the caller does not pass `--tag`.
    pub fn default_tag(&self) -> &'static str {
        match self {
            SourceKind::Brave => "brave_search",
            SourceKind::Url => "web_content",
            SourceKind::File => "local_file",
        }
    }
}

/// Origin-specific details recorded alongside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Brave {
        query: String,
    },
    Url {
        url: String,
    },
    File {
        file_path: String,
        file_name: String,
        file_ext: String,
    },
}

impl Origin {
    pub fn kind(&self) -> SourceKind {
        match self {
            Origin::Brave { .. } => SourceKind::Brave,
            Origin::Url { .. } => SourceKind::Url,
            Origin::File { .. } => SourceKind::File,
        }
    }
}

/// Provenance of a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub origin: Origin,
    pub retrieved_at: DateTime<Utc>,
    pub tag: String,
}

impl DocumentMetadata {
    /// Build metadata stamped with the current time. `tag` falls back to
    /// the origin's default tag.
    pub fn new(origin: Origin, tag: Option<String>) -> Self {
        let tag = tag.unwrap_or_else(|| origin.kind().default_tag().to_string());
        Self {
            origin,
            retrieved_at: Utc::now(),
            tag,
        }
    }

    /// Render as the JSON object stored in the `metadata` column.
    ///
    /// Keys are camelCase to stay compatible with rows already written to
    /// the `knowledge_base` table by other tooling.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "source".to_string(),
            Value::from(self.origin.kind().label()),
        );
        match &self.origin {
            Origin::Brave { query } => {
                map.insert("query".to_string(), Value::from(query.as_str()));
            }
            Origin::Url { url } => {
                map.insert("url".to_string(), Value::from(url.as_str()));
            }
            Origin::File {
                file_path,
                file_name,
                file_ext,
            } => {
                map.insert("filePath".to_string(), Value::from(file_path.as_str()));
                map.insert("fileName".to_string(), Value::from(file_name.as_str()));
                map.insert("fileExt".to_string(), Value::from(file_ext.as_str()));
            }
        }
        map.insert(
            "retrievalDate".to_string(),
            Value::from(
                self.retrieved_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        map.insert("tag".to_string(), Value::from(self.tag.as_str()));
        map
    }
}

/// A unit of ingestion: raw text plus where it came from.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A bounded piece of a document's content, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    /// Chunk text before overlap was added.
    pub body: String,
    /// Trailing fragment of the previous chunk's body. Empty for the first
    /// chunk or when no word-aligned fragment fits.
    pub overlap_prefix: String,
    pub metadata: DocumentMetadata,
}

impl Chunk {
    /// The text that gets embedded and stored: overlap prefix, a space,
    /// then the body.
    pub fn text(&self) -> String {
        if self.overlap_prefix.is_empty() {
            self.body.clone()
        } else {
            format!("{} {}", self.overlap_prefix, self.body)
        }
    }
}

/// A row appended to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeRow {
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

impl KnowledgeRow {
    /// Pair a chunk with its embedding, stamping `chunkIndex` and
    /// `totalChunks` into the metadata.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>, total_chunks: usize) -> Self {
        let mut metadata = chunk.metadata.to_json();
        metadata.insert("chunkIndex".to_string(), Value::from(chunk.index));
        metadata.insert("totalChunks".to_string(), Value::from(total_chunks));
        Self {
            content: chunk.text(),
            embedding,
            metadata: Value::Object(metadata),
        }
    }

    /// `true` when the embedding call for this row failed.
    pub fn is_placeholder(&self) -> bool {
        self.embedding.is_empty()
    }
}
