//! Auricle audio identification engine — library crate shared by the
//! `auricle-engine` binary and its tests.

pub mod api;
pub mod audio;
pub mod db;
pub mod embedding;
pub mod fingerprint;
pub mod ingest;
pub mod search;
pub mod startup;
pub mod storage;
pub mod vector;

use audio::decoder::PcmDecoder;
use auricle_common::Settings;
use embedding::engine::EmbeddingEngine;
use fingerprint::index::FingerprintIndex;
use ingest::lock::IngestionLock;
use sqlx::SqlitePool;
use std::sync::Arc;
use storage::raw_store::RawFileStore;
use vector::client::VectorStoreClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub raw_store: RawFileStore,
    pub decoder: PcmDecoder,
    pub fingerprint_index: Arc<FingerprintIndex>,
    pub embedding_engine: Arc<EmbeddingEngine>,
    pub vector_client: VectorStoreClient,
    pub ingestion_lock: Arc<IngestionLock>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        raw_store: RawFileStore,
        decoder: PcmDecoder,
        fingerprint_index: FingerprintIndex,
        embedding_engine: EmbeddingEngine,
        vector_client: VectorStoreClient,
        settings: Settings,
    ) -> Self {
        Self {
            pool,
            raw_store,
            decoder,
            fingerprint_index: Arc::new(fingerprint_index),
            embedding_engine: Arc::new(embedding_engine),
            vector_client,
            ingestion_lock: Arc::new(IngestionLock::new()),
            settings: Arc::new(settings),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::permissive().expose_headers([
        axum::http::header::CONTENT_RANGE,
        axum::http::header::ACCEPT_RANGES,
        axum::http::header::CONTENT_LENGTH,
    ]);

    axum::Router::new()
        .merge(api::search::routes())
        .merge(api::ingest::routes())
        .merge(api::tracks::routes())
        .merge(api::health::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
