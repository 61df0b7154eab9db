//! Metadata reader (C2): container tag extraction via `lofty`, which reads
//! ID3, Vorbis comments, and MP4 atoms behind one API — the same crate
//! `wkmp-ai` uses for tag extraction (`Cargo.toml`: `lofty = "0.19"`).

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bitrate: Option<u32>,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Extract tags from raw file bytes. Fails silently on an unreadable
/// container — the caller still gets `sha256`/`size_bytes`, matching the
/// "Missing fields are left absent" contract in spec.md §4.2.
pub fn extract(filename_hint: &str, bytes: &[u8]) -> ExtractedMetadata {
    let sha256 = hex::encode(Sha256::digest(bytes));
    let size_bytes = bytes.len() as u64;

    let mut out = ExtractedMetadata {
        sha256,
        size_bytes,
        ..Default::default()
    };

    let cursor = std::io::Cursor::new(bytes);
    let probe = match lofty::Probe::new(cursor).guess_file_type() {
        Ok(probe) => probe,
        Err(e) => {
            tracing::debug!(error = %e, "metadata probe failed, continuing with hash/size only");
            return out;
        }
    };

    let tagged_file = match probe.read() {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(error = %e, "metadata read failed, continuing with hash/size only");
            return out;
        }
    };

    use lofty::{Accessor, AudioFile, TaggedFileExt};

    let properties = tagged_file.properties();
    out.duration_seconds = Some(properties.duration().as_secs_f64());
    out.sample_rate = properties.sample_rate();
    out.channels = properties.channels().map(|c| c as u32);
    out.bitrate = properties.audio_bitrate();

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        out.title = tag.title().map(|s| s.to_string());
        out.artist = tag.artist().map(|s| s.to_string());
        out.album = tag.album().map(|s| s.to_string());
    }

    if out.title.is_none() {
        out.title = filename_stem(filename_hint);
    }

    out
}

/// Filename-stem fallback for title.
fn filename_stem(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_falls_back_to_hash_and_size_on_garbage_input() {
        let bytes = b"not a real audio container";
        let meta = extract("weird-file.bin", bytes);
        assert_eq!(meta.size_bytes, bytes.len() as u64);
        assert_eq!(meta.sha256.len(), 64);
        assert!(meta.title.is_none() || meta.title.as_deref() == Some("weird-file"));
    }

    #[test]
    fn filename_stem_extracts_title_fallback() {
        assert_eq!(filename_stem("song_A.mp3"), Some("song_A".to_string()));
        assert_eq!(filename_stem("/a/b/c.flac"), Some("c".to_string()));
    }
}
