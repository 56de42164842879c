use anyhow::Result;
use sqlx::SqlitePool;

/// Create the index schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            occupancy_count INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedder identity the stored vectors were produced with
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries(timestamp)")
        .execute(pool)
        .await?;

    Ok(())
}
