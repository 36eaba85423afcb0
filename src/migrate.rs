use anyhow::{bail, Result};

use crate::config::StoreConfig;
use crate::db;

/// Create the knowledge table and its index in the SQLite store.
///
/// Idempotent. The table name has already been validated as a plain
/// identifier by config loading.
pub async fn run_migrations(config: &StoreConfig) -> Result<()> {
    if config.backend != "sqlite" {
        bail!(
            "init only applies to the sqlite backend (configured: '{}'); \
             the supabase table is managed in the Supabase project",
            config.backend
        );
    }

    let pool = db::connect(config).await?;
    let table = &config.table;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{{}}',
            created_at INTEGER NOT NULL
        )
        "#
    ))
    .execute(&pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at DESC)"
    ))
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
