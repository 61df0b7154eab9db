//! Search orchestrator (C12): fans a query out to the exact and vibe
//! lanes under per-lane and total time budgets, and reconciles their
//! results into one response. Lane failures are read as a discriminated
//! result rather than caught as exceptions.

use crate::fingerprint::index::FingerprintIndex;
use crate::embedding::engine::EmbeddingEngine;
use crate::search::types::{LaneOutcome, ModeUsed, SearchResponse};
use crate::search::{exact_lane, vibe_lane};
use crate::vector::client::VectorStoreClient;
use auricle_common::time::Stopwatch;
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const EXACT_TRUST_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Exact,
    Vibe,
    Both,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("search timed out")]
    Timeout,
    #[error("search service unavailable")]
    Unavailable,
}

pub struct SearchDeps<'a> {
    pub pool: &'a SqlitePool,
    pub fingerprint_index: &'a FingerprintIndex,
    pub embedding_engine: &'a EmbeddingEngine,
    pub vector_client: &'a VectorStoreClient,
    pub vector_collection: &'a str,
    pub exact_lane_timeout: Duration,
    pub vibe_lane_timeout: Duration,
    pub total_request_timeout: Duration,
}

pub async fn search(
    deps: &SearchDeps<'_>,
    pcm16k: &[f32],
    pcm48k: &[f32],
    mode: SearchMode,
    max_results: usize,
) -> Result<SearchResponse, OrchestratorError> {
    let request_id = Uuid::new_v4();
    let stopwatch = Stopwatch::start();

    let response = match mode {
        SearchMode::Exact => search_exact_only(deps, pcm16k, max_results).await?,
        SearchMode::Vibe => search_vibe_only(deps, pcm48k, max_results).await?,
        SearchMode::Both => search_both(deps, pcm16k, pcm48k, max_results).await?,
    };

    Ok(SearchResponse {
        request_id,
        mode_used: response.0,
        exact_matches: response.1,
        vibe_matches: response.2,
        total_elapsed_ms: stopwatch.elapsed_ms(),
    })
}

type PartialResponse = (ModeUsed, Vec<crate::search::types::ExactMatch>, Vec<crate::search::types::VibeMatch>);

async fn search_exact_only(
    deps: &SearchDeps<'_>,
    pcm16k: &[f32],
    max_results: usize,
) -> Result<PartialResponse, OrchestratorError> {
    let outcome = run_exact(deps, pcm16k, max_results).await;
    match outcome {
        LaneOutcome::Ok(matches) => Ok((ModeUsed::Exact, matches, Vec::new())),
        LaneOutcome::TimedOut => Err(OrchestratorError::Timeout),
        LaneOutcome::Unavailable => Err(OrchestratorError::Unavailable),
    }
}

async fn search_vibe_only(
    deps: &SearchDeps<'_>,
    pcm48k: &[f32],
    max_results: usize,
) -> Result<PartialResponse, OrchestratorError> {
    let outcome = run_vibe(deps, pcm48k, max_results, None).await;
    match outcome {
        LaneOutcome::Ok(matches) => Ok((ModeUsed::Vibe, Vec::new(), matches)),
        LaneOutcome::TimedOut => Err(OrchestratorError::Timeout),
        LaneOutcome::Unavailable => Err(OrchestratorError::Unavailable),
    }
}

async fn search_both(
    deps: &SearchDeps<'_>,
    pcm16k: &[f32],
    pcm48k: &[f32],
    max_results: usize,
) -> Result<PartialResponse, OrchestratorError> {
    let exact_fut = run_exact(deps, pcm16k, max_results);
    let vibe_fut = run_vibe(deps, pcm48k, max_results, None);

    let combined = tokio::time::timeout(deps.total_request_timeout, futures::future::join(exact_fut, vibe_fut)).await;

    let (exact_outcome, vibe_outcome) = match combined {
        Ok(pair) => pair,
        Err(_) => {
            tracing::warn!("total search budget exceeded; cancelling any still-running lane");
            (LaneOutcome::TimedOut, LaneOutcome::TimedOut)
        }
    };

    let exact_timed_out = matches!(exact_outcome, LaneOutcome::TimedOut);
    let vibe_timed_out = matches!(vibe_outcome, LaneOutcome::TimedOut);

    let exact_matches = match exact_outcome {
        LaneOutcome::Ok(matches) => Some(matches),
        _ => None,
    };
    let vibe_matches = match vibe_outcome {
        LaneOutcome::Ok(matches) => Some(matches),
        _ => None,
    };

    match (exact_matches, vibe_matches) {
        (None, None) => {
            if exact_timed_out || vibe_timed_out {
                Err(OrchestratorError::Timeout)
            } else {
                Err(OrchestratorError::Unavailable)
            }
        }
        (Some(exact), None) => Ok((ModeUsed::Both, exact, Vec::new())),
        (None, Some(vibe)) => Ok((ModeUsed::Both, Vec::new(), vibe)),
        (Some(exact), Some(mut vibe)) => {
            // Step 9: a strong exact hit isn't interesting as a vibe
            // match for the same track.
            if let Some(top) = exact.first() {
                if top.confidence >= EXACT_TRUST_THRESHOLD {
                    let trusted_id = top.track.id;
                    vibe.retain(|v| v.track.id != trusted_id);
                }
            }
            Ok((ModeUsed::Both, exact, vibe))
        }
    }
}

async fn run_exact(
    deps: &SearchDeps<'_>,
    pcm16k: &[f32],
    max_results: usize,
) -> LaneOutcome<crate::search::types::ExactMatch> {
    match tokio::time::timeout(
        deps.exact_lane_timeout,
        exact_lane::search(deps.pool, deps.fingerprint_index, pcm16k, max_results),
    )
    .await
    {
        Err(_) => LaneOutcome::TimedOut,
        Ok(Err(_)) => LaneOutcome::Unavailable,
        Ok(Ok(matches)) => LaneOutcome::Ok(matches),
    }
}

async fn run_vibe(
    deps: &SearchDeps<'_>,
    pcm48k: &[f32],
    max_results: usize,
    exclude_track_id: Option<Uuid>,
) -> LaneOutcome<crate::search::types::VibeMatch> {
    match tokio::time::timeout(
        deps.vibe_lane_timeout,
        vibe_lane::search(
            deps.pool,
            deps.embedding_engine,
            deps.vector_client,
            deps.vector_collection,
            pcm48k,
            max_results,
            exclude_track_id,
        ),
    )
    .await
    {
        Err(_) => LaneOutcome::TimedOut,
        Ok(Err(_)) => LaneOutcome::Unavailable,
        Ok(Ok(matches)) => LaneOutcome::Ok(matches),
    }
}
