//! `GET /tracks`, `GET /tracks/{id}`, `GET /tracks/{id}/audio`.

use crate::api::error::ApiError;
use crate::db::tracks;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", get(list_tracks))
        .route("/tracks/:id", get(get_track))
        .route("/tracks/:id/audio", get(serve_audio))
}

#[derive(Debug, Serialize)]
struct TrackDto {
    id: Uuid,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    #[serde(rename = "durationSeconds")]
    duration_seconds: f64,
    #[serde(rename = "sourceFormat")]
    source_format: Option<String>,
    #[serde(rename = "fileSizeBytes")]
    file_size_bytes: i64,
    #[serde(rename = "olafIndexed")]
    olaf_indexed: bool,
    #[serde(rename = "embeddingModel")]
    embedding_model: Option<String>,
    #[serde(rename = "ingestedAt")]
    ingested_at: String,
}

impl From<&tracks::Track> for TrackDto {
    fn from(t: &tracks::Track) -> Self {
        Self {
            id: t.id,
            title: t.title.clone(),
            artist: t.artist.clone(),
            album: t.album.clone(),
            duration_seconds: t.duration_seconds,
            source_format: t.source_format.clone(),
            file_size_bytes: t.file_size_bytes,
            olaf_indexed: t.olaf_indexed,
            embedding_model: t.embedding_model.clone(),
            ingested_at: t.ingested_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    #[serde(rename = "pageSize")]
    page_size: Option<i64>,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
struct Pagination {
    page: i64,
    #[serde(rename = "pageSize")]
    page_size: i64,
    #[serde(rename = "totalItems")]
    total_items: u64,
    #[serde(rename = "totalPages")]
    total_pages: u64,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    data: Vec<TrackDto>,
    pagination: Pagination,
}

async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let result = tracks::list_paginated(&state.pool, page, page_size, query.search.as_deref()).await?;
    let total_pages = if result.total_items == 0 {
        0
    } else {
        result.total_items.div_ceil(page_size as u64)
    };

    Ok(Json(ListResponse {
        data: result.tracks.iter().map(TrackDto::from).collect(),
        pagination: Pagination { page, page_size, total_items: result.total_items, total_pages },
    }))
}

async fn get_track(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TrackDto>, ApiError> {
    let track = tracks::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no track with id {id}")))?;
    Ok(Json(TrackDto::from(&track)))
}

fn content_type_for(source_format: Option<&str>) -> &'static str {
    match source_format.unwrap_or("") {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "mp4" | "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

/// `bytes=a-b`, suffix `bytes=-n`, and open `bytes=a-`.
fn parse_range(header_value: &str, total_len: u64) -> Option<(u64, u64)> {
    let spec = header_value.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;

    if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        let start = total_len.saturating_sub(suffix_len);
        Some((start, total_len.saturating_sub(1)))
    } else {
        let start: u64 = start_str.parse().ok()?;
        let end = if end_str.is_empty() {
            total_len.saturating_sub(1)
        } else {
            end_str.parse().ok()?
        };
        Some((start, end))
    }
}

async fn serve_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let track = tracks::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no track with id {id}")))?;

    let path = state.raw_store.root().join(&track.storage_path);
    let file_metadata = tokio::fs::metadata(&path).await.map_err(|_| ApiError::file_not_found())?;
    let total_len = file_metadata.len();

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let (status, start, end) = match range_header {
        Some(raw_range) => {
            let Some((start, end)) = parse_range(raw_range, total_len) else {
                return Ok(range_not_satisfiable(total_len));
            };
            let end = end.min(total_len.saturating_sub(1));
            if start > end || start >= total_len {
                return Ok(range_not_satisfiable(total_len));
            }
            (StatusCode::PARTIAL_CONTENT, start, end)
        }
        None => (StatusCode::OK, 0, total_len.saturating_sub(1)),
    };

    let mut file = tokio::fs::File::open(&path).await.map_err(|_| ApiError::file_not_found())?;
    file.seek(std::io::SeekFrom::Start(start))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let length = end - start + 1;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf).await.map_err(|e| ApiError::internal(e.to_string()))?;

    let content_type = content_type_for(track.source_format.as_deref());
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, "inline");

    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total_len}"));
    }

    builder
        .body(axum::body::Body::from(buf))
        .map_err(|e| ApiError::internal(e.to_string()))
}

fn range_not_satisfiable(total_len: u64) -> Response {
    let body = Json(json!({
        "error": {
            "code": "RANGE_NOT_SATISFIABLE",
            "message": "requested range is outside the file",
            "details": { "totalLength": total_len },
        }
    }));

    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{total_len}")), (header::ACCEPT_RANGES, "bytes".to_string())],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_range() {
        assert_eq!(parse_range("bytes=1000-1999", 10_000), Some((1000, 1999)));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range("bytes=-500", 10_000), Some((9500, 9999)));
    }

    #[test]
    fn parses_open_range() {
        assert_eq!(parse_range("bytes=9000-", 10_000), Some((9000, 9999)));
    }

    #[test]
    fn rejects_malformed_range() {
        assert_eq!(parse_range("not-a-range", 10_000), None);
    }

    #[test]
    fn single_byte_range_is_accepted() {
        assert_eq!(parse_range("bytes=0-0", 10_000), Some((0, 0)));
    }
}
