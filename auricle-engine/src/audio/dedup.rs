//! Perceptual dedup (C8).
//!
//! Computes a Chromaprint-style fingerprint over the 16 kHz PCM already
//! produced by the decoder wrapper and compares it against the duration-
//! filtered candidate set from the catalog. Grounded on the compare
//! primitive in `rusty-chromaprint` (pure Rust, no libchromaprint system
//! dependency), the same crate the sqlite3-chromaprint reference
//! extension in the example pack uses for its own `compare_fingerprints`.

use crate::db::tracks::Track;
use rusty_chromaprint::{match_fingerprints, Configuration, Fingerprinter};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ChromaFingerprint {
    pub text: String,
    pub duration_seconds: f64,
}

/// Compute a Chromaprint fingerprint from 16 kHz mono signed-16-bit PCM.
pub fn fingerprint(pcm16k_s16le: &[i16], sample_rate: u32) -> ChromaFingerprint {
    let config = Configuration::preset_test1();
    let mut printer = Fingerprinter::new(&config);
    printer
        .start(sample_rate, 1)
        .expect("chromaprint start with valid sample rate/channel count");
    printer.consume(pcm16k_s16le);
    printer.finish();

    let raw = printer.fingerprint();
    let text = encode_fingerprint(raw);
    let duration_seconds = pcm16k_s16le.len() as f64 / sample_rate as f64;

    ChromaFingerprint { text, duration_seconds }
}

fn encode_fingerprint(raw: &[u32]) -> String {
    raw.iter().map(|v| format!("{v:08x}")).collect()
}

fn decode_fingerprint(text: &str) -> Option<Vec<u32>> {
    text.as_bytes()
        .chunks(8)
        .map(|chunk| {
            let s = std::str::from_utf8(chunk).ok()?;
            u32::from_str_radix(s, 16).ok()
        })
        .collect()
}

/// Similarity between two encoded fingerprints, in `[0.0, 1.0]`
/// (1.0 = identical). `match_fingerprints` returns matched segments with a
/// per-segment Hamming-derived score in `[0, 32]` (lower is more similar);
/// we fold that into a single normalized similarity weighted by segment
/// duration, mirroring the reference sqlite3-chromaprint extension's
/// duration-weighted aggregation.
pub fn similarity(fingerprint_a: &str, fingerprint_b: &str) -> f64 {
    let (Some(a), Some(b)) = (decode_fingerprint(fingerprint_a), decode_fingerprint(fingerprint_b))
    else {
        return 0.0;
    };

    let config = Configuration::preset_test1();
    let segments = match match_fingerprints(&a, &b, &config) {
        Ok(segments) => segments,
        Err(_) => return 0.0,
    };

    if segments.is_empty() {
        return 0.0;
    }

    let total_duration: f64 = segments.iter().map(|s| s.duration(&config) as f64).sum();
    if total_duration <= 0.0 {
        return 0.0;
    }

    let weighted_score: f64 = segments
        .iter()
        .map(|s| s.duration(&config) as f64 * (1.0 - s.score as f64 / 32.0))
        .sum();

    (weighted_score / total_duration).clamp(0.0, 1.0)
}

/// Scan duration-filtered `candidates` for a perceptual match.
pub fn is_duplicate(text: &str, candidates: &[Track], threshold: f64) -> Option<Uuid> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let candidate_fp = candidate.chroma_fingerprint.as_deref()?;
            let score = similarity(text, candidate_fp);
            (score >= threshold).then_some((candidate.id, score))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn track_with_fingerprint(fp: &str, duration: f64) -> Track {
        let now = Utc::now();
        Track {
            id: Uuid::new_v4(),
            title: "t".into(),
            artist: None,
            album: None,
            duration_seconds: duration,
            sample_rate: None,
            channels: None,
            bitrate: None,
            source_format: None,
            sha256: "0".repeat(64),
            file_size_bytes: 0,
            storage_path: String::new(),
            chroma_fingerprint: Some(fp.to_string()),
            chroma_duration: Some(duration),
            olaf_indexed: false,
            embedding_model: None,
            embedding_dim: None,
            ingested_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn identical_fingerprints_are_fully_similar() {
        let samples: Vec<i16> = (0..16_000 * 12)
            .map(|i| ((i as f64 * 0.01).sin() * 8000.0) as i16)
            .collect();
        let fp = fingerprint(&samples, 16_000);

        let score = similarity(&fp.text, &fp.text);
        assert!(score > 0.99, "expected near-1.0 self-similarity, got {score}");
    }

    #[test]
    fn is_duplicate_requires_threshold() {
        let samples: Vec<i16> = (0..16_000 * 12)
            .map(|i| ((i as f64 * 0.01).sin() * 8000.0) as i16)
            .collect();
        let fp = fingerprint(&samples, 16_000);

        let candidate = track_with_fingerprint(&fp.text, fp.duration_seconds);
        let hit = is_duplicate(&fp.text, &[candidate.clone()], 0.85);
        assert_eq!(hit, Some(candidate.id));

        let unreachable_threshold = is_duplicate(&fp.text, &[candidate], 1.01);
        assert_eq!(unreachable_threshold, None);
    }

    #[test]
    fn unrelated_fingerprints_score_low() {
        let silence: Vec<i16> = vec![0; 16_000 * 12];
        let noise: Vec<i16> = (0..16_000 * 12)
            .map(|i| if i % 2 == 0 { 12_000 } else { -12_000 })
            .collect();

        let fp_a = fingerprint(&silence, 16_000);
        let fp_b = fingerprint(&noise, 16_000);

        let score = similarity(&fp_a.text, &fp_b.text);
        assert!(score < 0.85, "expected dissimilar fingerprints, got {score}");
    }
}
