//! Vibe (embedding-based) search lane (C11).

use crate::db::tracks;
use crate::embedding::engine::EmbeddingEngine;
use crate::search::types::{TrackInfo, VibeMatch};
use crate::vector::client::VectorStoreClient;
use auricle_common::Error;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

pub const QDRANT_SEARCH_LIMIT: u32 = 50;
pub const TOP_K_CHUNKS: usize = 3;
pub const VIBE_MATCH_THRESHOLD: f64 = 0.60;
pub const SEARCH_EF: u32 = 128;
const DIVERSITY_BONUS_PER_CHUNK: f64 = 0.01;
const DIVERSITY_BONUS_CAP: f64 = 0.05;

struct TrackScore {
    chunk_scores: Vec<f32>,
    distinct_chunk_indices: std::collections::HashSet<i64>,
}

pub async fn search(
    pool: &SqlitePool,
    embedding_engine: &EmbeddingEngine,
    vector_client: &VectorStoreClient,
    collection: &str,
    pcm48k: &[f32],
    max_results: usize,
    exclude_track_id: Option<Uuid>,
) -> Result<Vec<VibeMatch>, Error> {
    let query_vector = embedding_engine.embed_single(pcm48k).await?;

    let hits = vector_client
        .query(collection, &query_vector, QDRANT_SEARCH_LIMIT, SEARCH_EF)
        .await;

    let mut by_track: HashMap<Uuid, TrackScore> = HashMap::new();
    for hit in hits {
        let Some(track_id) = hit
            .payload
            .get("track_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            continue;
        };
        let chunk_index = hit.payload.get("chunk_index").and_then(|v| v.as_i64()).unwrap_or(0);

        let entry = by_track.entry(track_id).or_insert_with(|| TrackScore {
            chunk_scores: Vec::new(),
            distinct_chunk_indices: std::collections::HashSet::new(),
        });
        entry.chunk_scores.push(hit.score);
        entry.distinct_chunk_indices.insert(chunk_index);
    }

    let mut scored: Vec<(Uuid, f64)> = by_track
        .into_iter()
        .map(|(track_id, mut score)| {
            score.chunk_scores.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let top_k: Vec<f32> = score.chunk_scores.iter().take(TOP_K_CHUNKS).copied().collect();
            let base_score = top_k.iter().sum::<f32>() as f64 / top_k.len().max(1) as f64;
            let diversity_bonus =
                (DIVERSITY_BONUS_PER_CHUNK * score.distinct_chunk_indices.len() as f64).min(DIVERSITY_BONUS_CAP);
            let final_score = (base_score + diversity_bonus).min(1.0);
            (track_id, final_score)
        })
        .filter(|(_, score)| *score >= VIBE_MATCH_THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));

    let ids: Vec<Uuid> = scored.iter().map(|(id, _)| *id).collect();
    let catalog = tracks::get_many_by_ids(pool, &ids).await?;

    let mut matches: Vec<VibeMatch> = scored
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude_track_id)
        .filter_map(|(id, score)| {
            let track = catalog.get(&id)?;
            Some(VibeMatch {
                track: TrackInfo {
                    id: track.id,
                    title: track.title.clone(),
                    artist: track.artist.clone(),
                    album: track.album.clone(),
                    duration_seconds: track.duration_seconds,
                },
                similarity: score,
                embedding_model: track.embedding_model.clone(),
            })
        })
        .collect();

    matches.truncate(max_results);
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diversity_bonus_is_capped() {
        let many_chunks: std::collections::HashSet<i64> = (0..20).collect();
        let bonus = (DIVERSITY_BONUS_PER_CHUNK * many_chunks.len() as f64).min(DIVERSITY_BONUS_CAP);
        assert_eq!(bonus, DIVERSITY_BONUS_CAP);
    }
}
