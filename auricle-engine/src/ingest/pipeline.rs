//! Ingestion pipeline (C9): turns one raw upload into a catalog row plus
//! entries in the fingerprint index and vector store, or rejects it as a
//! duplicate/invalid clip, per spec.md §4.9. The caller is responsible
//! for holding the process-wide ingestion lock around this call (see
//! `crate::ingest::lock`).

use crate::audio::{dedup, decoder::PcmDecoder, metadata};
use crate::db::tracks::{self, Track};
use crate::fingerprint::index::FingerprintIndex;
use crate::ingest::types::IngestOutcome;
use crate::embedding::engine::EmbeddingEngine;
use crate::storage::raw_store::RawFileStore;
use crate::vector::client::{EmbeddingChunk, VectorStoreClient};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

pub const MIN_DURATION_SECONDS: f64 = 3.0;
pub const MAX_DURATION_SECONDS: f64 = 30.0 * 60.0;
const EMBEDDING_MODEL_DIM: u32 = 512;

pub struct PipelineDeps<'a> {
    pub pool: &'a SqlitePool,
    pub raw_store: &'a RawFileStore,
    pub decoder: &'a PcmDecoder,
    pub fingerprint_index: &'a FingerprintIndex,
    pub embedding_engine: &'a EmbeddingEngine,
    pub vector_client: &'a VectorStoreClient,
    pub vector_collection: &'a str,
    pub dedup_threshold: f64,
}

pub async fn ingest_file(deps: &PipelineDeps<'_>, filename: &str, bytes: &[u8]) -> IngestOutcome {
    // Step 1: hash, lookup.
    let meta = metadata::extract(filename, bytes);
    match tracks::find_by_hash(deps.pool, &meta.sha256).await {
        Ok(Some(existing)) => {
            return IngestOutcome::Duplicate {
                track_id: existing.id,
                title: Some(existing.title),
                artist: existing.artist,
            }
        }
        Ok(None) => {}
        Err(e) => return IngestOutcome::Errored { message: e.to_string() },
    }

    // Step 3: decode, enforce duration bounds.
    let format_hint = guess_format_hint(filename, bytes);
    let pcm = match deps.decoder.decode_dual_rate(bytes, format_hint.as_deref()).await {
        Ok(pcm) => pcm,
        Err(e) => return IngestOutcome::Errored { message: format!("decode failed: {e}") },
    };

    if pcm.duration_seconds < MIN_DURATION_SECONDS {
        return IngestOutcome::Skipped { reason: "audio shorter than 3 seconds".to_string() };
    }
    if pcm.duration_seconds > MAX_DURATION_SECONDS {
        return IngestOutcome::Skipped { reason: "audio longer than 30 minutes".to_string() };
    }

    // Step 4: perceptual dedup.
    let pcm16_i16 = crate::audio::decoder::f32_to_i16(&pcm.pcm16k);
    let chroma = dedup::fingerprint(&pcm16_i16, 16_000);

    let candidates = match tracks::candidates_by_duration(deps.pool, chroma.duration_seconds).await {
        Ok(rows) => rows,
        Err(e) => return IngestOutcome::Errored { message: e.to_string() },
    };

    if let Some(hit_id) = dedup::is_duplicate(&chroma.text, &candidates, deps.dedup_threshold) {
        return match tracks::find_by_id(deps.pool, hit_id).await {
            Ok(Some(existing)) => IngestOutcome::Duplicate {
                track_id: existing.id,
                title: Some(existing.title),
                artist: existing.artist,
            },
            Ok(None) => IngestOutcome::Duplicate { track_id: hit_id, title: None, artist: None },
            Err(e) => IngestOutcome::Errored { message: e.to_string() },
        };
    }

    // Step 5: persist raw file.
    let ext = format_hint.unwrap_or_else(|| "bin".to_string());
    let storage_path = match deps.raw_store.write_once(bytes, &meta.sha256, &ext) {
        Ok(path) => path,
        Err(e) => return IngestOutcome::Errored { message: e.to_string() },
    };
    let relative_storage_path = storage_path
        .strip_prefix(deps.raw_store.root())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| storage_path.to_string_lossy().to_string());

    // Step 6: fresh identifier.
    let track_id = Uuid::new_v4();
    let track_identifier = track_id.to_string();

    // Step 7: parallel index + embed-and-upsert.
    let index_fut = deps.fingerprint_index.index(&pcm.pcm16k, &track_identifier);
    let embed_and_upsert = async {
        let chunks = deps.embedding_engine.embed(&pcm.pcm48k).await?;
        let embedding_chunks: Vec<EmbeddingChunk> = chunks
            .iter()
            .map(|c| EmbeddingChunk {
                embedding: c.embedding.clone(),
                offset_sec: c.offset_sec,
                chunk_index: c.chunk_index,
                duration_sec: c.duration_sec,
            })
            .collect();

        let mut payload_extras = HashMap::new();
        payload_extras.insert("genre".to_string(), json!(null));

        deps.vector_client
            .upsert_chunks(deps.vector_collection, &track_identifier, &embedding_chunks, &payload_extras)
            .await?;

        Ok::<_, auricle_common::Error>(chunks.len())
    };

    let (index_result, embed_result) = tokio::join!(index_fut, embed_and_upsert);

    if let Err(e) = &index_result {
        tracing::warn!(track_id = %track_identifier, error = %e, "fingerprint index write failed");
    }
    if let Err(e) = &embed_result {
        tracing::warn!(track_id = %track_identifier, error = %e, "embedding/vector upsert failed");
    }

    if index_result.is_err() || embed_result.is_err() {
        rollback_partial_ingest(deps, &track_identifier).await;
        return IngestOutcome::Errored {
            message: "failed to index fingerprint or embeddings for this track".to_string(),
        };
    }

    // Step 8: catalog insert.
    let now = Utc::now();
    let track = Track {
        id: track_id,
        title: meta.title.clone().unwrap_or_else(|| track_identifier.clone()),
        artist: meta.artist.clone(),
        album: meta.album.clone(),
        duration_seconds: pcm.duration_seconds,
        sample_rate: meta.sample_rate,
        channels: meta.channels,
        bitrate: meta.bitrate,
        source_format: Some(ext),
        sha256: meta.sha256,
        file_size_bytes: meta.size_bytes as i64,
        storage_path: relative_storage_path,
        chroma_fingerprint: Some(chroma.text),
        chroma_duration: Some(chroma.duration_seconds),
        olaf_indexed: true,
        embedding_model: Some(deps.embedding_engine.model_id().to_string()),
        embedding_dim: Some(EMBEDDING_MODEL_DIM),
        ingested_at: now,
        updated_at: now,
    };

    if let Err(e) = tracks::insert(deps.pool, &track).await {
        rollback_partial_ingest(deps, &track_identifier).await;
        return IngestOutcome::Errored { message: e.to_string() };
    }

    IngestOutcome::Ingested {
        track_id,
        title: Some(track.title),
        artist: track.artist,
    }
}

async fn rollback_partial_ingest(deps: &PipelineDeps<'_>, track_identifier: &str) {
    if let Err(e) = deps.fingerprint_index.delete(track_identifier).await {
        tracing::error!(track_id = %track_identifier, error = %e, "rollback: fingerprint delete failed");
    }
    if let Err(e) = deps.vector_client.delete_track(deps.vector_collection, track_identifier).await {
        tracing::error!(track_id = %track_identifier, error = %e, "rollback: vector delete failed");
    }
}

fn guess_format_hint(filename: &str, bytes: &[u8]) -> Option<String> {
    if let Some(kind) = infer::get(bytes) {
        return Some(kind.extension().to_string());
    }
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
}

/// Administrative deletion: removes the catalog row plus the fingerprint
/// and vector entries.
pub async fn delete_track(deps: &PipelineDeps<'_>, track: &Track) -> Result<(), auricle_common::Error> {
    let identifier = track.id.to_string();
    deps.fingerprint_index.delete(&identifier).await?;
    deps.vector_client.delete_track(deps.vector_collection, &identifier).await?;
    tracks::delete(deps.pool, track.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_format_hint_falls_back_to_filename_extension() {
        let hint = guess_format_hint("track.flac", b"not a real flac");
        assert_eq!(hint, Some("flac".to_string()));
    }
}
