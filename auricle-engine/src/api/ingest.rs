//! `POST /ingest`.

use crate::api::admin_auth::verify_admin_key;
use crate::api::error::ApiError;
use crate::ingest::pipeline::{ingest_file, PipelineDeps};
use crate::ingest::types::IngestOutcome;
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ingest", post(handle_ingest))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    #[serde(rename = "trackId", skip_serializing_if = "Option::is_none")]
    track_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    status: &'static str,
}

async fn handle_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let provided_key = headers.get("X-Admin-Key").and_then(|v| v.to_str().ok());
    verify_admin_key(state.settings.admin_key.as_deref(), provided_key)?;

    let guard = state.ingestion_lock.try_acquire().ok_or_else(ApiError::rate_limited)?;

    let mut filename = "upload".to_string();
    let mut audio_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::validation(e.to_string()))? {
        if field.name() == Some("audio") {
            filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(|e| ApiError::validation(e.to_string()))?;
            audio_bytes = Some(bytes.to_vec());
        }
    }

    let bytes = audio_bytes.ok_or_else(|| ApiError::validation("missing required 'audio' field"))?;
    if bytes.is_empty() {
        return Err(ApiError::empty_file());
    }
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(ApiError::file_too_large(MAX_UPLOAD_BYTES));
    }
    if infer::get(&bytes).is_none() {
        return Err(ApiError::unsupported_format());
    }

    let settings = &state.settings;
    let deps = PipelineDeps {
        pool: &state.pool,
        raw_store: &state.raw_store,
        decoder: &state.decoder,
        fingerprint_index: &state.fingerprint_index,
        embedding_engine: &state.embedding_engine,
        vector_client: &state.vector_client,
        vector_collection: &settings.vector_collection_name,
        dedup_threshold: settings.perceptual_dedup_threshold,
    };

    let outcome = ingest_file(&deps, &filename, &bytes).await;
    drop(guard);

    match outcome {
        IngestOutcome::Ingested { track_id, title, artist } => Ok((
            StatusCode::CREATED,
            Json(IngestResponse { track_id: Some(track_id), title, artist, status: "ingested" }),
        )),
        IngestOutcome::Duplicate { track_id, title, artist } => Ok((
            StatusCode::CREATED,
            Json(IngestResponse { track_id: Some(track_id), title, artist, status: "duplicate" }),
        )),
        IngestOutcome::Skipped { reason } => {
            if reason.contains("shorter") {
                Err(ApiError::audio_too_short())
            } else if reason.contains("longer") {
                Err(ApiError::audio_too_long())
            } else {
                Err(ApiError::decode_failed(reason))
            }
        }
        IngestOutcome::Errored { message } => Err(ApiError::internal(message)),
    }
}
