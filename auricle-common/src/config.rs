//! Environment-driven configuration
//!
//! Resolution is ENV → default, the same shape as `wkmp-ai::config`'s
//! tiered lookup minus the database/TOML tiers (there is no per-deployment
//! settings UI in this system).

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// All tunables recognized by the engine, per spec.md §6.
#[derive(Debug, Clone)]
pub struct Settings {
    // Service
    pub listen_host: String,
    pub listen_port: u16,

    // Relational store
    pub database_url: String,

    // Vector store
    pub vector_store_url: String,
    pub vector_store_api_key: Option<String>,
    pub vector_collection_name: String,

    // Fingerprint tool
    pub fingerprint_tool_path: PathBuf,
    pub fingerprint_index_dir: PathBuf,

    // Embedding
    pub embedding_model_id: String,
    pub embedding_model_path: Option<PathBuf>,
    pub embedding_dim: u32,
    pub embedding_concurrency: usize,

    // Decoder
    pub decoder_tool_path: PathBuf,

    // Storage
    pub storage_root: PathBuf,

    // Admin
    pub admin_key: Option<String>,

    // Perceptual dedup (C8)
    pub perceptual_dedup_threshold: f64,

    // Search tunables
    pub exact_trust_threshold: f64,
    pub vibe_match_threshold: f64,
    pub exact_lane_timeout: Duration,
    pub vibe_lane_timeout: Duration,
    pub total_request_timeout: Duration,
}

impl Settings {
    /// Load settings from the environment, falling back to the documented
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_host: env_or("AURICLE_LISTEN_HOST", "0.0.0.0"),
            listen_port: env_parse_or("AURICLE_LISTEN_PORT", 17010)?,

            database_url: env_or("AURICLE_DATABASE_URL", "sqlite://./data/auricle.db?mode=rwc"),

            vector_store_url: env_or("AURICLE_VECTOR_STORE_URL", "http://localhost:6333"),
            vector_store_api_key: std::env::var("AURICLE_VECTOR_STORE_API_KEY").ok(),
            vector_collection_name: env_or("AURICLE_VECTOR_COLLECTION", "audio_embeddings"),

            fingerprint_tool_path: PathBuf::from(env_or("AURICLE_OLAF_BIN", "olaf_c")),
            fingerprint_index_dir: PathBuf::from(env_or("AURICLE_OLAF_DB_DIR", "./data/olaf_db")),

            embedding_model_id: env_or("AURICLE_EMBEDDING_MODEL", "auricle-embed-v1"),
            embedding_model_path: std::env::var("AURICLE_EMBEDDING_MODEL_PATH").ok().map(PathBuf::from),
            embedding_dim: env_parse_or("AURICLE_EMBEDDING_DIM", 512)?,
            embedding_concurrency: env_parse_or("AURICLE_EMBEDDING_CONCURRENCY", 1)?,

            decoder_tool_path: PathBuf::from(env_or("AURICLE_DECODER_BIN", "ffmpeg")),

            storage_root: PathBuf::from(env_or("AURICLE_STORAGE_ROOT", "./data")),

            admin_key: std::env::var("AURICLE_ADMIN_KEY").ok().filter(|s| !s.is_empty()),

            perceptual_dedup_threshold: env_parse_or("AURICLE_PERCEPTUAL_DEDUP_THRESHOLD", 0.85)?,

            exact_trust_threshold: env_parse_or("AURICLE_EXACT_TRUST_THRESHOLD", 0.85)?,
            vibe_match_threshold: env_parse_or("AURICLE_VIBE_MATCH_THRESHOLD", 0.60)?,
            exact_lane_timeout: Duration::from_secs_f64(env_parse_or(
                "AURICLE_EXACT_LANE_TIMEOUT_SECS",
                3.0,
            )?),
            vibe_lane_timeout: Duration::from_secs_f64(env_parse_or(
                "AURICLE_VIBE_LANE_TIMEOUT_SECS",
                4.0,
            )?),
            total_request_timeout: Duration::from_secs_f64(env_parse_or(
                "AURICLE_TOTAL_REQUEST_TIMEOUT_SECS",
                5.0,
            )?),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| Error::Config(format!("invalid value for {key}: {val}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        // Use a unique, never-set key to sidestep global env test interference.
        let v: u16 = env_parse_or("AURICLE_TEST_DOES_NOT_EXIST_PORT", 17010).unwrap();
        assert_eq!(v, 17010);
    }

    #[test]
    fn admin_key_empty_string_is_treated_as_unconfigured() {
        std::env::set_var("AURICLE_ADMIN_KEY", "");
        let settings = Settings::from_env().unwrap();
        assert!(settings.admin_key.is_none());
        std::env::remove_var("AURICLE_ADMIN_KEY");
    }
}
