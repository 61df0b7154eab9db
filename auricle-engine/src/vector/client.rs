//! Vector-store client (C6): a thin `reqwest`-based REST wrapper around a
//! Qdrant-shaped HTTP API — JSON bodies over `reqwest::Client`, batched
//! upserts, and graceful degradation on query failure, targeting Qdrant's
//! collection/point endpoints rather than a namespace-based store.

use auricle_common::Error;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use std::collections::HashMap;

const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct VectorStoreClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct EmbeddingChunk {
    pub embedding: Vec<f32>,
    pub offset_sec: f64,
    pub chunk_index: u32,
    pub duration_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: HashMap<String, Json>,
}

impl VectorStoreClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Create the collection if it does not already exist, with cosine
    /// distance, HNSW `m=16, ef_construct=200`, in-RAM int8 scalar
    /// quantization at `quantile=0.99`, and keyword payload indexes on
    /// `track_id` and `genre` for filtered deletes. Idempotent.
    pub async fn ensure_collection(&self, name: &str, dim: u32) -> Result<(), Error> {
        let exists = self
            .request(reqwest::Method::GET, &format!("/collections/{name}"))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false);

        if !exists {
            let body = json!({
                "vectors": { "size": dim, "distance": "Cosine" },
                "hnsw_config": { "m": 16, "ef_construct": 200 },
                "quantization_config": {
                    "scalar": { "type": "int8", "quantile": 0.99, "always_ram": true }
                },
            });

            let response = self
                .request(reqwest::Method::PUT, &format!("/collections/{name}"))
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::IndexWriteFailed(e.to_string()))?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::IndexWriteFailed(text));
            }
        }

        for field in ["track_id", "genre"] {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            let _ = self
                .request(reqwest::Method::PUT, &format!("/collections/{name}/index"))
                .json(&body)
                .send()
                .await;
        }

        Ok(())
    }

    /// One point per chunk, fresh point UUID, submitted in batches of at
    /// most 100.
    pub async fn upsert_chunks(
        &self,
        collection: &str,
        track_identifier: &str,
        chunks: &[EmbeddingChunk],
        payload_extras: &HashMap<String, Json>,
    ) -> Result<(), Error> {
        let points: Vec<Json> = chunks
            .iter()
            .map(|chunk| {
                let mut payload = payload_extras.clone();
                payload.insert("track_id".to_string(), json!(track_identifier));
                payload.insert("offset_sec".to_string(), json!(chunk.offset_sec));
                payload.insert("chunk_index".to_string(), json!(chunk.chunk_index));
                payload.insert("duration_sec".to_string(), json!(chunk.duration_sec));

                json!({
                    "id": uuid::Uuid::new_v4().to_string(),
                    "vector": chunk.embedding,
                    "payload": payload,
                })
            })
            .collect();

        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let body = json!({ "points": batch });
            let response = self
                .request(reqwest::Method::PUT, &format!("/collections/{collection}/points"))
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::IndexWriteFailed(e.to_string()))?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::IndexWriteFailed(text));
            }
        }

        Ok(())
    }

    /// Filter-delete every point whose payload `track_id` matches.
    pub async fn delete_track(&self, collection: &str, track_identifier: &str) -> Result<(), Error> {
        let body = json!({
            "filter": {
                "must": [{ "key": "track_id", "match": { "value": track_identifier } }]
            }
        });

        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/delete"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::IndexWriteFailed(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::IndexWriteFailed(text));
        }

        Ok(())
    }

    /// Nearest-neighbour search. Errors degrade to an empty result rather
    /// than propagating, so the vibe lane can fall back gracefully.
    pub async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u32,
        search_ef: u32,
    ) -> Vec<ScoredPoint> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "params": { "hnsw_ef": search_ef },
            "with_payload": true,
        });

        let response = match self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/search"))
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            _ => return Vec::new(),
        };

        #[derive(Deserialize)]
        struct SearchResponse {
            result: Vec<ScoredPoint>,
        }

        response
            .json::<SearchResponse>()
            .await
            .map(|parsed| parsed.result)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_without_api_key() {
        let client = VectorStoreClient::new("http://localhost:6333", None);
        assert_eq!(client.base_url, "http://localhost:6333");
    }

    #[test]
    fn upsert_batches_never_exceed_hundred_points() {
        let chunks: Vec<EmbeddingChunk> = (0..250)
            .map(|i| EmbeddingChunk {
                embedding: vec![0.0; 4],
                offset_sec: i as f64 * 5.0,
                chunk_index: i,
                duration_sec: 10.0,
            })
            .collect();

        let batches: Vec<_> = chunks.chunks(UPSERT_BATCH_SIZE).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }
}
