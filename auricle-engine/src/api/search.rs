//! `POST /search`.

use crate::api::error::ApiError;
use crate::search::orchestrator::{self, OrchestratorError, SearchDeps, SearchMode};
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};

const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_RESULTS: u32 = 10;
const MIN_MAX_RESULTS: u32 = 1;
const MAX_MAX_RESULTS: u32 = 50;
const MIN_QUERY_DURATION_SECONDS: f64 = 3.0;

pub fn routes() -> Router<AppState> {
    Router::new().route("/search", post(handle_search))
}

async fn handle_search(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<crate::search::types::SearchResponse>, ApiError> {
    let mut audio_bytes: Option<Vec<u8>> = None;
    let mut mode_str = "both".to_string();
    let mut max_results = DEFAULT_MAX_RESULTS;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::validation(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "audio" => {
                let bytes = field.bytes().await.map_err(|e| ApiError::validation(e.to_string()))?;
                audio_bytes = Some(bytes.to_vec());
            }
            "mode" => {
                mode_str = field.text().await.map_err(|e| ApiError::validation(e.to_string()))?;
            }
            "max_results" => {
                let text = field.text().await.map_err(|e| ApiError::validation(e.to_string()))?;
                max_results = text.parse().map_err(|_| ApiError::validation("max_results must be an integer"))?;
            }
            _ => {}
        }
    }

    let bytes = audio_bytes.ok_or_else(|| ApiError::validation("missing required 'audio' field"))?;
    if bytes.is_empty() {
        return Err(ApiError::empty_file());
    }
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(ApiError::file_too_large(MAX_UPLOAD_BYTES));
    }

    if !(MIN_MAX_RESULTS..=MAX_MAX_RESULTS).contains(&max_results) {
        return Err(ApiError::validation(format!("max_results must be in [{MIN_MAX_RESULTS},{MAX_MAX_RESULTS}]")));
    }

    let mode = match mode_str.as_str() {
        "exact" => SearchMode::Exact,
        "vibe" => SearchMode::Vibe,
        "both" => SearchMode::Both,
        other => return Err(ApiError::validation(format!("invalid mode '{other}'"))),
    };

    if infer::get(&bytes).is_none() {
        return Err(ApiError::unsupported_format());
    }

    let pcm = state
        .decoder
        .decode_dual_rate(&bytes, None)
        .await
        .map_err(|e| ApiError::decode_failed(e.to_string()))?;

    if pcm.duration_seconds < MIN_QUERY_DURATION_SECONDS {
        return Err(ApiError::audio_too_short());
    }

    let settings = &state.settings;
    let deps = SearchDeps {
        pool: &state.pool,
        fingerprint_index: &state.fingerprint_index,
        embedding_engine: &state.embedding_engine,
        vector_client: &state.vector_client,
        vector_collection: &settings.vector_collection_name,
        exact_lane_timeout: settings.exact_lane_timeout,
        vibe_lane_timeout: settings.vibe_lane_timeout,
        total_request_timeout: settings.total_request_timeout,
    };

    let response = orchestrator::search(&deps, &pcm.pcm16k, &pcm.pcm48k, mode, max_results as usize)
        .await
        .map_err(|e| match e {
            OrchestratorError::Timeout => ApiError::search_timeout(),
            OrchestratorError::Unavailable => ApiError::service_unavailable("both search lanes are unavailable"),
        })?;

    Ok(Json(response))
}
