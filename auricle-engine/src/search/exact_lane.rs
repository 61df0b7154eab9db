//! Exact-match search lane (C10): fingerprint-based identification, with
//! a full-clip query for longer clips and a sub-window consensus scheme
//! for short ones. Implements the §9 correctness fix: `OFFSET_TOLERANCE`
//! is actually applied when judging agreeing windows (the spec calls out
//! that the reference implementation defined but never used it).

use crate::db::tracks;
use crate::fingerprint::index::{FingerprintIndex, OlafMatch};
use crate::search::types::{ExactMatch, TrackInfo};
use auricle_common::Error;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

pub const FULL_CLIP_THRESHOLD_SECONDS: f64 = 6.0;
pub const SUB_WINDOW_DURATION_SECONDS: f64 = 3.5;
pub const SUB_WINDOW_HOP_SECONDS: f64 = 0.75;
pub const STRONG_MATCH_HASHES: f64 = 20.0;
pub const MIN_ALIGNED_HASHES: u32 = 8;
pub const OFFSET_TOLERANCE_SECONDS: f64 = 1.0;
const SAMPLE_RATE: f64 = 16_000.0;

struct WindowResult {
    start_offset: f64,
    matches: Vec<OlafMatch>,
}

struct Aggregate {
    reference_identifier: String,
    aligned_hashes: u32,
    offset_seconds: f64,
}

pub async fn search(
    pool: &SqlitePool,
    fingerprint_index: &FingerprintIndex,
    pcm16k: &[f32],
    max_results: usize,
) -> Result<Vec<ExactMatch>, Error> {
    let duration = pcm16k.len() as f64 / SAMPLE_RATE;

    let window_results = if duration >= FULL_CLIP_THRESHOLD_SECONDS {
        let matches = fingerprint_index.query(pcm16k).await?;
        vec![WindowResult { start_offset: 0.0, matches }]
    } else {
        let windows = sub_windows(duration);
        let mut results = Vec::with_capacity(windows.len());
        for (start, end) in windows {
            let start_sample = (start * SAMPLE_RATE).round() as usize;
            let end_sample = ((end * SAMPLE_RATE).round() as usize).min(pcm16k.len());
            let slice = &pcm16k[start_sample.min(pcm16k.len())..end_sample];
            let matches = fingerprint_index.query(slice).await?;
            results.push(WindowResult { start_offset: start, matches });
        }
        results
    };

    let mut aggregates = aggregate(window_results);
    aggregates.retain(|agg| agg.aligned_hashes >= MIN_ALIGNED_HASHES);

    let ids: Vec<Uuid> = aggregates
        .iter()
        .filter_map(|a| Uuid::parse_str(&a.reference_identifier).ok())
        .collect();
    let catalog = tracks::get_many_by_ids(pool, &ids).await?;

    let mut enriched: Vec<ExactMatch> = aggregates
        .into_iter()
        .filter_map(|agg| {
            let id = Uuid::parse_str(&agg.reference_identifier).ok()?;
            let track = catalog.get(&id)?;
            let confidence = (agg.aligned_hashes as f64 / STRONG_MATCH_HASHES).min(1.0);
            Some(ExactMatch {
                track: TrackInfo {
                    id: track.id,
                    title: track.title.clone(),
                    artist: track.artist.clone(),
                    album: track.album.clone(),
                    duration_seconds: track.duration_seconds,
                },
                confidence,
                aligned_hashes: agg.aligned_hashes,
                offset_seconds: agg.offset_seconds,
            })
        })
        .collect();

    enriched.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap()
            .then(b.aligned_hashes.cmp(&a.aligned_hashes))
            .then(a.track.id.cmp(&b.track.id))
    });
    enriched.truncate(max_results);

    Ok(enriched)
}

fn sub_windows(duration: f64) -> Vec<(f64, f64)> {
    if duration <= SUB_WINDOW_DURATION_SECONDS {
        return vec![(0.0, duration)];
    }

    let mut windows = Vec::new();
    let mut start = 0.0;
    while start + SUB_WINDOW_DURATION_SECONDS <= duration + 1e-9 {
        windows.push((start, start + SUB_WINDOW_DURATION_SECONDS));
        start += SUB_WINDOW_HOP_SECONDS;
    }
    windows
}

fn aggregate(window_results: Vec<WindowResult>) -> Vec<Aggregate> {
    // Per reference, per window: the best (highest match_count) reconciled offset.
    let mut per_reference: HashMap<String, Vec<(f64, u32)>> = HashMap::new();

    for window in &window_results {
        let mut best_per_reference: HashMap<&str, (f64, u32)> = HashMap::new();
        for m in &window.matches {
            let reconciled_offset = m.reference_start - window.start_offset;
            let entry = best_per_reference
                .entry(m.reference_identifier.as_str())
                .or_insert((reconciled_offset, m.match_count));
            if m.match_count > entry.1 {
                *entry = (reconciled_offset, m.match_count);
            }
        }
        for (reference, (offset, count)) in best_per_reference {
            per_reference.entry(reference.to_string()).or_default().push((offset, count));
        }
    }

    per_reference
        .into_iter()
        .map(|(reference_identifier, offsets)| {
            let median = median_of(&offsets.iter().map(|(o, _)| *o).collect::<Vec<_>>());
            let aligned_hashes: u32 = offsets
                .iter()
                .filter(|(offset, _)| (offset - median).abs() <= OFFSET_TOLERANCE_SECONDS)
                .map(|(_, count)| count)
                .sum();

            Aggregate { reference_identifier, aligned_hashes, offset_seconds: median }
        })
        .collect()
}

fn median_of(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_windows_match_spec_example_for_five_second_clip() {
        let windows = sub_windows(5.0);
        let starts: Vec<f64> = windows.iter().map(|(s, _)| *s).collect();
        assert_eq!(starts, vec![0.0, 0.75, 1.5]);
    }

    #[test]
    fn median_of_handles_even_and_odd_counts() {
        assert_eq!(median_of(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median_of(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn aggregate_applies_offset_tolerance() {
        let window_results = vec![
            WindowResult {
                start_offset: 0.0,
                matches: vec![OlafMatch {
                    match_count: 10,
                    query_start: 0.0,
                    query_stop: 3.5,
                    reference_identifier: "track-a".to_string(),
                    internal_reference_id: 1,
                    reference_start: 3.5,
                    reference_stop: 7.0,
                }],
            },
            WindowResult {
                start_offset: 0.75,
                matches: vec![OlafMatch {
                    match_count: 10,
                    query_start: 0.0,
                    query_stop: 3.5,
                    reference_identifier: "track-a".to_string(),
                    internal_reference_id: 1,
                    reference_start: 4.25,
                    reference_stop: 7.75,
                }],
            },
            WindowResult {
                start_offset: 1.5,
                matches: vec![OlafMatch {
                    match_count: 3,
                    query_start: 0.0,
                    query_stop: 3.5,
                    reference_identifier: "track-a".to_string(),
                    internal_reference_id: 1,
                    reference_start: 100.0,
                    reference_stop: 103.5,
                }],
            },
        ];

        let aggregates = aggregate(window_results);
        assert_eq!(aggregates.len(), 1);
        // reconciled offsets: 3.5, 3.5, 98.5 -> median 3.5, the 98.5 outlier excluded.
        assert_eq!(aggregates[0].aligned_hashes, 20);
        assert!((aggregates[0].offset_seconds - 3.5).abs() < 0.001);
    }

    #[test]
    fn discards_matches_below_min_aligned_hashes() {
        let window_results = vec![WindowResult {
            start_offset: 0.0,
            matches: vec![OlafMatch {
                match_count: 5,
                query_start: 0.0,
                query_stop: 3.5,
                reference_identifier: "track-weak".to_string(),
                internal_reference_id: 2,
                reference_start: 0.0,
                reference_stop: 3.5,
            }],
        }];

        let aggregates = aggregate(window_results);
        assert_eq!(aggregates[0].aligned_hashes, 5);
        assert!(aggregates[0].aligned_hashes < MIN_ALIGNED_HASHES);
    }
}
