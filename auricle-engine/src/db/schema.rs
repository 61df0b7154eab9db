//! Catalog schema (C7 data model): the "Track record" table definition.

use auricle_common::Result;
use sqlx::SqlitePool;

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            artist              TEXT,
            album               TEXT,
            duration_seconds    REAL NOT NULL,
            sample_rate         INTEGER,
            channels            INTEGER,
            bitrate             INTEGER,
            source_format       TEXT,
            sha256              TEXT NOT NULL UNIQUE,
            file_size_bytes     INTEGER NOT NULL,
            storage_path        TEXT NOT NULL,
            chroma_fingerprint  TEXT,
            chroma_duration     REAL,
            olaf_indexed        INTEGER NOT NULL DEFAULT 0,
            embedding_model     TEXT,
            embedding_dim       INTEGER,
            ingested_at         TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_sha256 ON tracks (sha256)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tracks_duration ON tracks (duration_seconds)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }
}
