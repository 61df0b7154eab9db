//! Neural embedding engine (C5): a locally loaded ONNX model turning
//! 48 kHz PCM into fixed-size chunk embeddings. Session setup follows the
//! `ort` usage in the genre-classifier reference file in the example
//! pack (`Session::builder()...with_optimization_level(...).commit_from_file(...)`,
//! `ort::inputs!` + `try_extract_tensor`), adapted to one shared session
//! guarded by a process-wide concurrency gate instead of one session per
//! thread.

use auricle_common::Error;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const EMBEDDING_DIM: usize = 512;
const WINDOW_SECONDS: f64 = 10.0;
const HOP_SECONDS: f64 = 5.0;
const MIN_TAIL_SECONDS: f64 = 1.0;
const MODEL_SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub embedding: Vec<f32>,
    pub offset_sec: f64,
    pub chunk_index: u32,
    pub duration_sec: f64,
}

pub struct EmbeddingEngine {
    session: Option<Arc<Mutex<Session>>>,
    concurrency_gate: Semaphore,
    model_id: String,
}

impl EmbeddingEngine {
    /// Load the model once at startup. `concurrency` is
    /// the process-wide inference gate, defaulting to 1 to protect tail
    /// latency under CPU contention.
    pub fn load(model_path: &Path, model_id: impl Into<String>, concurrency: usize) -> Result<Self, Error> {
        let session = Session::builder()
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            session: Some(Arc::new(Mutex::new(session))),
            concurrency_gate: Semaphore::new(concurrency.max(1)),
            model_id: model_id.into(),
        })
    }

    /// Construct an engine with no model loaded, for environments that
    /// run only the exact-match lane. Every call fails with
    /// `EmbeddingUnavailable` until replaced.
    pub fn unavailable(model_id: impl Into<String>) -> Self {
        Self {
            session: None,
            concurrency_gate: Semaphore::new(1),
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Embed a short query clip as a single window, without chunking —
    /// padded or truncated to the model's window length.
    pub async fn embed_single(&self, pcm48k_f32le: &[f32]) -> Result<Vec<f32>, Error> {
        let Some(session) = self.session.clone() else {
            return Err(Error::EmbeddingUnavailable(self.model_id.clone()));
        };

        let window_len = (WINDOW_SECONDS * MODEL_SAMPLE_RATE as f64).round() as usize;
        let mut samples = pcm48k_f32le.to_vec();
        samples.resize(window_len, 0.0);

        let _permit = self
            .concurrency_gate
            .acquire()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        tokio::task::spawn_blocking(move || run_inference(&session, &samples))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }

    /// Chunk and embed 48 kHz mono PCM. Fails the whole call on any
    /// chunk's inference error — no partial output.
    pub async fn embed(&self, pcm48k_f32le: &[f32]) -> Result<Vec<AudioChunk>, Error> {
        let Some(session) = self.session.clone() else {
            return Err(Error::EmbeddingUnavailable(self.model_id.clone()));
        };

        let windows = chunk_windows(pcm48k_f32le, MODEL_SAMPLE_RATE);
        let mut chunks = Vec::with_capacity(windows.len());

        for window in windows {
            let _permit = self
                .concurrency_gate
                .acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;

            let session = session.clone();
            let samples = window.samples;
            let embedding = tokio::task::spawn_blocking(move || run_inference(&session, &samples))
                .await
                .map_err(|e| Error::Internal(e.to_string()))??;

            chunks.push(AudioChunk {
                embedding,
                offset_sec: window.offset_sec,
                chunk_index: window.chunk_index,
                duration_sec: window.duration_sec,
            });
        }

        Ok(chunks)
    }
}

struct Window {
    samples: Vec<f32>,
    offset_sec: f64,
    chunk_index: u32,
    duration_sec: f64,
}

/// Split PCM into overlapping 10 s / 5 s-hop windows. The
/// final window is zero-padded if the real tail is ≥1.0 s; shorter tails
/// are dropped.
fn chunk_windows(pcm: &[f32], sample_rate: u32) -> Vec<Window> {
    let window_len = (WINDOW_SECONDS * sample_rate as f64).round() as usize;
    let hop_len = (HOP_SECONDS * sample_rate as f64).round() as usize;
    let min_tail_len = (MIN_TAIL_SECONDS * sample_rate as f64).round() as usize;

    if pcm.is_empty() || window_len == 0 || hop_len == 0 {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start = 0usize;
    let mut chunk_index = 0u32;

    while start < pcm.len() {
        let end = (start + window_len).min(pcm.len());
        let real_len = end - start;

        if real_len < window_len && real_len < min_tail_len {
            break;
        }

        let mut samples = pcm[start..end].to_vec();
        samples.resize(window_len, 0.0);

        windows.push(Window {
            samples,
            offset_sec: start as f64 / sample_rate as f64,
            chunk_index,
            duration_sec: real_len as f64 / sample_rate as f64,
        });

        chunk_index += 1;
        start += hop_len;
    }

    windows
}

fn run_inference(session: &Mutex<Session>, samples: &[f32]) -> Result<Vec<f32>, Error> {
    let mut session = session
        .lock()
        .map_err(|_| Error::EmbeddingUnavailable("model session lock poisoned".to_string()))?;

    let shape = vec![1usize, samples.len()];
    let input_value = Value::from_array((shape, samples.to_vec()))
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
    let inputs = ort::inputs!["pcm" => &input_value];

    let outputs = session
        .run(inputs)
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

    let (_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_exact_multiple_of_window() {
        let pcm = vec![0.1f32; (WINDOW_SECONDS * MODEL_SAMPLE_RATE as f64) as usize * 2];
        let windows = chunk_windows(&pcm, MODEL_SAMPLE_RATE);
        // 10s window / 5s hop over 20s: starts at 0/5/10/15, each with
        // >=1s of real audio remaining (the 15s start has exactly 5s left).
        assert_eq!(windows.len(), 4, "10s window / 5s hop over 20s gives 4 overlapping chunks");
        assert_eq!(windows[0].chunk_index, 0);
        assert_eq!(windows[0].offset_sec, 0.0);
        assert_eq!(windows[1].offset_sec, 5.0);
        assert_eq!(windows[2].offset_sec, 10.0);
        assert_eq!(windows[3].offset_sec, 15.0);
    }

    #[test]
    fn drops_tail_shorter_than_one_second() {
        let window_samples = (WINDOW_SECONDS * MODEL_SAMPLE_RATE as f64) as usize;
        let tail_samples = (0.5 * MODEL_SAMPLE_RATE as f64) as usize;

        let pcm = vec![0.1f32; window_samples + tail_samples];
        let windows = chunk_windows(&pcm, MODEL_SAMPLE_RATE);
        // Starts at 0 (10s, full) and 5 (5.5s real audio, kept); the next
        // hop at 10s would leave only the 0.5s tail and is dropped.
        assert_eq!(windows.len(), 2, "sub-1s tail after the last hop must be dropped");
        assert_eq!(windows[1].offset_sec, 5.0);
        assert!((windows[1].duration_sec - 5.5).abs() < 0.01);
    }

    #[test]
    fn zero_pads_tail_of_at_least_one_second() {
        let window_samples = (WINDOW_SECONDS * MODEL_SAMPLE_RATE as f64) as usize;
        let tail_samples = (1.5 * MODEL_SAMPLE_RATE as f64) as usize;

        let pcm = vec![0.1f32; window_samples + tail_samples];
        let windows = chunk_windows(&pcm, MODEL_SAMPLE_RATE);
        // Starts at 0 (10s, full), 5 (6.5s real audio), 10 (1.5s real
        // audio, zero-padded to the full window length).
        assert_eq!(windows.len(), 3);
        assert!((windows[1].duration_sec - 6.5).abs() < 0.01);
        assert_eq!(windows[2].samples.len(), window_samples);
        assert!((windows[2].duration_sec - 1.5).abs() < 0.01);
    }

    #[test]
    fn unavailable_engine_rejects_embed_calls() {
        let engine = EmbeddingEngine::unavailable("auricle-embed-v1");
        assert!(!engine.is_loaded());
    }
}
