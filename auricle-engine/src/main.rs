//! Process entry point: load configuration, run the C13 startup checks in
//! order, build the shared application state, and serve the HTTP surface
//! with graceful shutdown on `SIGINT`/`SIGTERM`.

use auricle_common::Settings;
use auricle_engine::audio::decoder::PcmDecoder;
use auricle_engine::embedding::engine::EmbeddingEngine;
use auricle_engine::fingerprint::index::FingerprintIndex;
use auricle_engine::storage::raw_store::RawFileStore;
use auricle_engine::vector::client::VectorStoreClient;
use auricle_engine::{build_router, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(host = %settings.listen_host, port = settings.listen_port, "starting auricle-engine");

    let pool = db::init_database_pool(&settings.database_url).await?;
    let decoder = PcmDecoder::new(settings.decoder_tool_path.clone());
    let raw_store = RawFileStore::new(settings.storage_root.clone());
    let fingerprint_index =
        FingerprintIndex::new(settings.fingerprint_tool_path.clone(), settings.fingerprint_index_dir.clone());
    let vector_client = VectorStoreClient::new(settings.vector_store_url.clone(), settings.vector_store_api_key.clone());

    let load_start = std::time::Instant::now();
    let embedding_engine = match &settings.embedding_model_path {
        Some(path) => match EmbeddingEngine::load(path, settings.embedding_model_id.clone(), settings.embedding_concurrency) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::error!(error = %e, "failed to load embedding model, vibe lane will be unavailable");
                EmbeddingEngine::unavailable(settings.embedding_model_id.clone())
            }
        },
        None => {
            tracing::warn!("AURICLE_EMBEDDING_MODEL_PATH unset, vibe lane will be unavailable");
            EmbeddingEngine::unavailable(settings.embedding_model_id.clone())
        }
    };
    let embedding_load_elapsed = load_start.elapsed();

    // Order per spec.md §4.13: decoder, relational store, fingerprint
    // tool, vector store, then model warm-up.
    startup::check_decoder(&decoder).await?;
    startup::check_database(&pool).await?;
    startup::check_fingerprint_index(&fingerprint_index).await?;
    startup::check_vector_store(&vector_client, &settings.vector_collection_name).await?;
    startup::warm_up_embedding_model(&embedding_engine, embedding_load_elapsed).await?;

    let listen_addr = format!("{}:{}", settings.listen_host, settings.listen_port);
    let state = AppState::new(pool, raw_store, decoder, fingerprint_index, embedding_engine, vector_client, settings);
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shutting down, closing database pool");
    state.pool.close().await;

    Ok(())
}

/// Waits for `SIGINT` (Ctrl-C) or, on Unix, `SIGTERM` — whichever comes
/// first triggers a graceful drain of in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
