use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub brave: BraveConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override for the provider's API.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> Option<String> {
    Some("embedding-001".to_string())
}
fn default_dims() -> Option<usize> {
    Some(768)
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            period_secs: default_period_secs(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}
fn default_period_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// SQLite database file (sqlite backend only).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Supabase project URL; falls back to `SUPABASE_URL`.
    #[serde(default)]
    pub url: Option<String>,
    /// Drop rows whose embedding call failed instead of storing them with
    /// an empty placeholder. Unset means: skip for supabase (a pgvector
    /// column rejects empty vectors), keep for sqlite.
    #[serde(default)]
    pub skip_failed_embeddings: Option<bool>,
}

impl StoreConfig {
    pub fn skip_failed_embeddings(&self) -> bool {
        self.skip_failed_embeddings
            .unwrap_or(self.backend == "supabase")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            table: default_table(),
            path: default_db_path(),
            url: None,
            skip_failed_embeddings: None,
        }
    }
}

fn default_backend() -> String {
    "supabase".to_string()
}
fn default_table() -> String {
    "knowledge_base".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/kb.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct BraveConfig {
    #[serde(default = "default_brave_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_brave_count")]
    pub count: u32,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_brave_endpoint(),
            count: default_brave_count(),
        }
    }
}

fn default_brave_endpoint() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}
fn default_brave_count() -> u32 {
    10
}

/// HTTP settings for retrieving source content (Brave and URL sources).
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Load and validate the config at `path`.
///
/// A missing file is not an error: every section has defaults, so the
/// tool runs with built-in settings plus environment secrets.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.rate_limit.max_requests == 0 {
        anyhow::bail!("rate_limit.max_requests must be > 0");
    }
    if config.rate_limit.period_secs == 0 {
        anyhow::bail!("rate_limit.period_secs must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "gemini" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    match config.store.backend.as_str() {
        "supabase" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be supabase or sqlite.",
            other
        ),
    }

    let table = &config.store.table;
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!(
            "store.table must be a non-empty identifier of letters, digits, and '_': '{}'",
            table
        );
    }

    Ok(())
}
