//! Relational catalog access (C7).
//!
//! The `tracks` table is the authoritative metadata store. Schema
//! migrations proper (a versioned migration runner) are an explicit
//! non-goal of this system — at startup we simply ensure the table exists.

pub mod schema;
pub mod tracks;

use auricle_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if necessary) the catalog database and ensure its
/// schema is present.
pub async fn init_database_pool(database_url: &str) -> Result<SqlitePool> {
    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::debug!(
        url = %auricle_common::error::sanitize_connection_string(database_url),
        "connecting to catalog database"
    );

    let pool = SqlitePool::connect(database_url).await?;
    schema::ensure_schema(&pool).await?;

    Ok(pool)
}

/// Best-effort extraction of a filesystem path from a `sqlite://...` URL,
/// used only to pre-create the parent directory.
fn sqlite_file_path(database_url: &str) -> Option<std::path::PathBuf> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path).to_path_buf())
}
