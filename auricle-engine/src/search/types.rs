//! Search response shapes shared between the lanes, the orchestrator,
//! and the HTTP layer.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TrackInfo {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExactMatch {
    pub track: TrackInfo,
    pub confidence: f64,
    #[serde(rename = "alignedHashes")]
    pub aligned_hashes: u32,
    #[serde(rename = "offsetSeconds")]
    pub offset_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VibeMatch {
    pub track: TrackInfo,
    pub similarity: f64,
    #[serde(rename = "embeddingModel")]
    pub embedding_model: Option<String>,
}

/// The outcome of running one lane, independent of exceptions.
pub enum LaneOutcome<T> {
    Ok(Vec<T>),
    TimedOut,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModeUsed {
    Exact,
    Vibe,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "requestId")]
    pub request_id: Uuid,
    #[serde(rename = "modeUsed")]
    pub mode_used: ModeUsed,
    #[serde(rename = "exactMatches")]
    pub exact_matches: Vec<ExactMatch>,
    #[serde(rename = "vibeMatches")]
    pub vibe_matches: Vec<VibeMatch>,
    #[serde(rename = "totalElapsedMs")]
    pub total_elapsed_ms: u64,
}
