//! Vector store backends.
//!
//! Rows are append-only: each ingestion run inserts new
//! `(content, embedding, metadata)` rows and never updates old ones.
//!
//! - [`SupabaseStore`] posts rows to a Supabase (PostgREST) table.
//! - [`SqliteStore`] writes rows into a local SQLite table created by
//!   `kb-ingest init`, with embeddings encoded as little-endian `f32` BLOBs.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Config, StoreConfig};
use crate::db;
use crate::embedding::vec_to_blob;
use crate::models::KnowledgeRow;

/// Destination for embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for log output.
    fn name(&self) -> &str;

    /// Append `rows`, returning how many were written. Either all rows are
    /// written or an error is returned.
    async fn insert(&self, rows: &[KnowledgeRow]) -> Result<usize>;
}

/// Open the backend named by `config.store.backend`.
pub async fn open_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "supabase" => Ok(Box::new(SupabaseStore::from_env(
            &config.store,
            Duration::from_secs(config.fetch.timeout_secs),
        )?)),
        "sqlite" => Ok(Box::new(SqliteStore::open(&config.store).await?)),
        other => bail!("Unknown store backend: {}", other),
    }
}

// ============ Supabase ============

pub struct SupabaseStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: String, table: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("Supabase API key is empty");
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key,
        })
    }

    /// Build from config, reading `SUPABASE_URL` (unless `store.url` is set)
    /// and `SUPABASE_KEY` from the environment.
    pub fn from_env(config: &StoreConfig, timeout: Duration) -> Result<Self> {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => std::env::var("SUPABASE_URL")
                .map_err(|_| anyhow!("SUPABASE_URL environment variable not set"))?,
        };
        let key = std::env::var("SUPABASE_KEY")
            .map_err(|_| anyhow!("SUPABASE_KEY environment variable not set"))?;
        Self::new(&url, key, &config.table, timeout)
    }
}

#[async_trait]
impl VectorStore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn insert(&self, rows: &[KnowledgeRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .context("Supabase insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Supabase insert failed {}: {}", status, body);
        }

        Ok(rows.len())
    }
}

// ============ SQLite ============

pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::new(pool, &config.table))
    }

    pub fn new(pool: SqlitePool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, rows: &[KnowledgeRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO {} (id, content, embedding, dims, metadata_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.table
        );
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(&sql)
                .bind(Uuid::new_v4().to_string())
                .bind(&row.content)
                .bind(vec_to_blob(&row.embedding))
                .bind(row.embedding.len() as i64)
                .bind(row.metadata.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert into {}", self.table))?;
        }
        tx.commit().await?;

        Ok(rows.len())
    }
}
