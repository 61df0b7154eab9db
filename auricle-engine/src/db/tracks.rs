//! Track catalog (C7): relational CRUD against the `tracks` table.

use auricle_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// The authoritative metadata record for one ingested audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bitrate: Option<u32>,
    pub source_format: Option<String>,
    pub sha256: String,
    pub file_size_bytes: i64,
    pub storage_path: String,
    pub chroma_fingerprint: Option<String>,
    pub chroma_duration: Option<f64>,
    pub olaf_indexed: bool,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<u32>,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flags mutable only by administrative re-indexing.
#[derive(Debug, Clone, Default)]
pub struct FlagUpdate {
    pub olaf_indexed: Option<bool>,
    pub embedding_model: Option<Option<String>>,
    pub embedding_dim: Option<Option<u32>>,
}

fn row_to_track(row: sqlx::sqlite::SqliteRow) -> Result<Track> {
    let id_str: String = row.get("id");
    let ingested_at_str: String = row.get("ingested_at");
    let updated_at_str: String = row.get("updated_at");

    Ok(Track {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| Error::Internal(format!("corrupt track id: {e}")))?,
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        duration_seconds: row.get("duration_seconds"),
        sample_rate: row.get::<Option<i64>, _>("sample_rate").map(|v| v as u32),
        channels: row.get::<Option<i64>, _>("channels").map(|v| v as u32),
        bitrate: row.get::<Option<i64>, _>("bitrate").map(|v| v as u32),
        source_format: row.get("source_format"),
        sha256: row.get("sha256"),
        file_size_bytes: row.get("file_size_bytes"),
        storage_path: row.get("storage_path"),
        chroma_fingerprint: row.get("chroma_fingerprint"),
        chroma_duration: row.get("chroma_duration"),
        olaf_indexed: row.get::<i64, _>("olaf_indexed") != 0,
        embedding_model: row.get("embedding_model"),
        embedding_dim: row.get::<Option<i64>, _>("embedding_dim").map(|v| v as u32),
        ingested_at: DateTime::parse_from_rfc3339(&ingested_at_str)
            .map_err(|e| Error::Internal(format!("corrupt ingested_at: {e}")))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|e| Error::Internal(format!("corrupt updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

/// Insert a new track. Fails if `sha256` already exists (unique index).
pub async fn insert(pool: &SqlitePool, track: &Track) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, title, artist, album, duration_seconds, sample_rate, channels,
            bitrate, source_format, sha256, file_size_bytes, storage_path,
            chroma_fingerprint, chroma_duration, olaf_indexed, embedding_model,
            embedding_dim, ingested_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id.to_string())
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.album)
    .bind(track.duration_seconds)
    .bind(track.sample_rate.map(|v| v as i64))
    .bind(track.channels.map(|v| v as i64))
    .bind(track.bitrate.map(|v| v as i64))
    .bind(&track.source_format)
    .bind(&track.sha256)
    .bind(track.file_size_bytes)
    .bind(&track.storage_path)
    .bind(&track.chroma_fingerprint)
    .bind(track.chroma_duration)
    .bind(track.olaf_indexed as i64)
    .bind(&track.embedding_model)
    .bind(track.embedding_dim.map(|v| v as i64))
    .bind(track.ingested_at.to_rfc3339())
    .bind(track.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::InvalidInput(format!("duplicate sha256: {}", track.sha256))
        }
        _ => Error::Database(e),
    })?;

    Ok(())
}

pub async fn find_by_hash(pool: &SqlitePool, sha256: &str) -> Result<Option<Track>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE sha256 = ?")
        .bind(sha256)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_track).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(row_to_track).transpose()
}

/// Fetch several tracks by id in one round trip, keyed for lane
/// enrichment.
pub async fn get_many_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<HashMap<Uuid, Track>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM tracks WHERE id IN ({placeholders})");

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.to_string());
    }

    let rows = query.fetch_all(pool).await?;
    let mut out = HashMap::with_capacity(rows.len());
    for row in rows {
        let track = row_to_track(row)?;
        out.insert(track.id, track);
    }
    Ok(out)
}

/// Administrative re-indexing: update only the index-flag fields, never
/// the descriptive/technical ones.
pub async fn update_flags(pool: &SqlitePool, id: Uuid, update: FlagUpdate) -> Result<()> {
    if update.olaf_indexed.is_none() && update.embedding_model.is_none() && update.embedding_dim.is_none() {
        return Ok(());
    }

    let current = find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("track {id}")))?;

    let olaf_indexed = update.olaf_indexed.unwrap_or(current.olaf_indexed);
    let embedding_model = update.embedding_model.unwrap_or(current.embedding_model);
    let embedding_dim = update.embedding_dim.unwrap_or(current.embedding_dim);

    sqlx::query(
        "UPDATE tracks SET olaf_indexed = ?, embedding_model = ?, embedding_dim = ?, updated_at = ? WHERE id = ?",
    )
    .bind(olaf_indexed as i64)
    .bind(embedding_model)
    .bind(embedding_dim.map(|v| v as i64))
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a track from the catalog. Callers are responsible for also
/// deleting the track's fingerprint-index entries and vector points
/// — this function only touches the relational row.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Escape `%`, `_`, and the escape character itself for a `LIKE` pattern,
/// then wrap it for a case-insensitive contains match.
fn escape_like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        match ch {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            other => escaped.push(other),
        }
    }
    format!("%{escaped}%")
}

pub struct Page {
    pub tracks: Vec<Track>,
    pub total_items: u64,
}

/// Paginated, optionally-filtered listing.
///
/// `page` < 1 is treated as 1; `page_size` is clamped to `[1,100]`.
pub async fn list_paginated(
    pool: &SqlitePool,
    page: i64,
    page_size: i64,
    search: Option<&str>,
) -> Result<Page> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 100);
    let offset = (page - 1) * page_size;

    let (rows, total_items) = match search {
        Some(term) if !term.is_empty() => {
            let pattern = escape_like_pattern(term);
            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM tracks WHERE title LIKE ? ESCAPE '\\' OR artist LIKE ? ESCAPE '\\'",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(pool)
            .await?;

            let rows = sqlx::query(
                "SELECT * FROM tracks WHERE title LIKE ? ESCAPE '\\' OR artist LIKE ? ESCAPE '\\' \
                 ORDER BY ingested_at ASC LIMIT ? OFFSET ?",
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(page_size)
            .bind(offset)
            .fetch_all(pool)
            .await?;

            (rows, total as u64)
        }
        _ => {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
                .fetch_one(pool)
                .await?;

            let rows = sqlx::query("SELECT * FROM tracks ORDER BY ingested_at ASC LIMIT ? OFFSET ?")
                .bind(page_size)
                .bind(offset)
                .fetch_all(pool)
                .await?;

            (rows, total as u64)
        }
    };

    let tracks = rows.into_iter().map(row_to_track).collect::<Result<Vec<_>>>()?;
    Ok(Page { tracks, total_items })
}

/// Duration-filtered candidate scan for perceptual dedup (C8): only
/// tracks whose duration lies in `[duration*0.9, duration*1.1]`.
pub async fn candidates_by_duration(
    pool: &SqlitePool,
    duration_seconds: f64,
) -> Result<Vec<Track>> {
    let low = duration_seconds * 0.9;
    let high = duration_seconds * 1.1;

    let rows = sqlx::query(
        "SELECT * FROM tracks WHERE duration_seconds BETWEEN ? AND ? AND chroma_fingerprint IS NOT NULL",
    )
    .bind(low)
    .bind(high)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_track).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::ensure_schema;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        pool
    }

    fn sample_track(sha256: &str, title: &str, duration: f64) -> Track {
        let now = Utc::now();
        Track {
            id: Uuid::new_v4(),
            title: title.to_string(),
            artist: Some("Some Artist".to_string()),
            album: None,
            duration_seconds: duration,
            sample_rate: Some(44100),
            channels: Some(2),
            bitrate: Some(192_000),
            source_format: Some("mp3".to_string()),
            sha256: sha256.to_string(),
            file_size_bytes: 12345,
            storage_path: format!("raw/{}/{}.mp3", &sha256[..2], sha256),
            chroma_fingerprint: Some("AQAA...".to_string()),
            chroma_duration: Some(duration),
            olaf_indexed: true,
            embedding_model: Some("auricle-embed-v1".to_string()),
            embedding_dim: Some(512),
            ingested_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_hash_round_trips() {
        let pool = test_pool().await;
        let track = sample_track("aa".repeat(32).as_str(), "Song A", 180.0);
        insert(&pool, &track).await.unwrap();

        let found = find_by_hash(&pool, &track.sha256).await.unwrap().unwrap();
        assert_eq!(found.id, track.id);
        assert_eq!(found.title, "Song A");
    }

    #[tokio::test]
    async fn duplicate_sha256_insert_fails() {
        let pool = test_pool().await;
        let hash = "bb".repeat(32);
        let t1 = sample_track(&hash, "First", 120.0);
        let t2 = sample_track(&hash, "Second", 130.0);

        insert(&pool, &t1).await.unwrap();
        let err = insert(&pool, &t2).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn pagination_clamps_page_and_size() {
        let pool = test_pool().await;
        for i in 0..7 {
            let hash = format!("{:064x}", i);
            insert(&pool, &sample_track(&hash, &format!("Track {i}"), 100.0 + i as f64))
                .await
                .unwrap();
        }

        let page = list_paginated(&pool, 2, 3, None).await.unwrap();
        assert_eq!(page.tracks.len(), 3);
        assert_eq!(page.total_items, 7);

        let clamped = list_paginated(&pool, 0, 500, None).await.unwrap();
        assert_eq!(clamped.tracks.len(), 7);
    }

    #[tokio::test]
    async fn search_matches_title_or_artist_case_insensitively() {
        let pool = test_pool().await;
        insert(&pool, &sample_track(&"cc".repeat(32), "Midnight Drive", 100.0))
            .await
            .unwrap();
        insert(&pool, &sample_track(&"dd".repeat(32), "Unrelated", 100.0))
            .await
            .unwrap();

        let page = list_paginated(&pool, 1, 10, Some("midnight")).await.unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.tracks[0].title, "Midnight Drive");
    }

    #[tokio::test]
    async fn search_escapes_percent_and_underscore() {
        let pool = test_pool().await;
        insert(&pool, &sample_track(&"ee".repeat(32), "100% Pure", 100.0))
            .await
            .unwrap();

        // A literal '%' in the search term must not act as a wildcard.
        let page = list_paginated(&pool, 1, 10, Some("100%")).await.unwrap();
        assert_eq!(page.total_items, 1);

        let page = list_paginated(&pool, 1, 10, Some("100X")).await.unwrap();
        assert_eq!(page.total_items, 0);
    }

    #[tokio::test]
    async fn candidates_by_duration_filters_to_plus_minus_10_percent() {
        let pool = test_pool().await;
        insert(&pool, &sample_track(&"f1".repeat(32), "In range", 100.0))
            .await
            .unwrap();
        insert(&pool, &sample_track(&"f2".repeat(32), "Too short", 50.0))
            .await
            .unwrap();

        let candidates = candidates_by_duration(&pool, 100.0).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "In range");
    }

    #[tokio::test]
    async fn update_flags_only_touches_index_fields() {
        let pool = test_pool().await;
        let mut track = sample_track(&"a1".repeat(32), "Flagged", 90.0);
        track.olaf_indexed = false;
        track.embedding_model = None;
        insert(&pool, &track).await.unwrap();

        update_flags(
            &pool,
            track.id,
            FlagUpdate {
                olaf_indexed: Some(true),
                embedding_model: Some(Some("auricle-embed-v1".to_string())),
                embedding_dim: Some(Some(512)),
            },
        )
        .await
        .unwrap();

        let updated = find_by_id(&pool, track.id).await.unwrap().unwrap();
        assert!(updated.olaf_indexed);
        assert_eq!(updated.embedding_model.as_deref(), Some("auricle-embed-v1"));
        assert_eq!(updated.title, "Flagged");
    }
}
