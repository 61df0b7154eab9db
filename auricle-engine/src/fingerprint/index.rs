//! Acoustic fingerprint index (C4): a thin subprocess wrapper around an
//! external landmark-hashing tool (`olaf_c` by default) that owns its own
//! on-disk inverted index. Follows the same external-tool shape as
//! `wkmp-ai`'s `EssentiaClient` — PCM handed off via a temp file,
//! `spawn_blocking` around a synchronous `Command`, temp file always
//! cleaned up, stdout parsed as the tool's own text format.

use auricle_common::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
pub struct OlafMatch {
    pub match_count: u32,
    pub query_start: f64,
    pub query_stop: f64,
    pub reference_identifier: String,
    pub internal_reference_id: i64,
    pub reference_start: f64,
    pub reference_stop: f64,
}

#[derive(Clone)]
pub struct FingerprintIndex {
    tool_path: PathBuf,
    index_dir: PathBuf,
}

impl FingerprintIndex {
    pub fn new(tool_path: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
            index_dir: index_dir.into(),
        }
    }

    fn pid_file(&self) -> PathBuf {
        self.index_dir.join("olaf_db.owner.pid")
    }

    /// Startup check (C13 / spec.md §9): the index directory is
    /// single-writer by convention only, so refuse to start if another
    /// live process already claims ownership.
    pub fn acquire_ownership(&self) -> Result<(), Error> {
        std::fs::create_dir_all(&self.index_dir).map_err(Error::Io)?;

        let pid_file = self.pid_file();
        if let Ok(existing) = std::fs::read_to_string(&pid_file) {
            if let Ok(owner_pid) = existing.trim().parse::<u32>() {
                if process_is_alive(owner_pid) && owner_pid != std::process::id() {
                    return Err(Error::Config(format!(
                        "fingerprint index at {} is already owned by process {owner_pid}",
                        self.index_dir.display()
                    )));
                }
            }
        }

        std::fs::write(&pid_file, std::process::id().to_string()).map_err(Error::Io)?;
        Ok(())
    }

    /// Startup check (C13): the tool binary must exist and run.
    pub async fn check_available(&self) -> Result<String, Error> {
        let tool_path = self.tool_path.clone();
        let output = tokio::task::spawn_blocking(move || {
            Command::new(&tool_path).arg("--version").output()
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(|_| Error::FingerprintToolMissing(self.tool_path.display().to_string()))?;

        Ok(String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("unknown").to_string())
    }

    /// Add every landmark hash of `pcm16k_f32le` to the index, keyed by
    /// `track_identifier`. Caller must hold the ingestion lock — see
    /// spec.md §5 single-writer discipline.
    pub async fn index(&self, pcm16k_f32le: &[f32], track_identifier: &str) -> Result<(), Error> {
        let pcm_file = write_pcm_temp_file(pcm16k_f32le)?;
        let tool_path = self.tool_path.clone();
        let index_dir = self.index_dir.clone();
        let identifier = track_identifier.to_string();
        let pcm_path = pcm_file.path().to_path_buf();

        let output = tokio::task::spawn_blocking(move || {
            Command::new(&tool_path)
                .arg("index")
                .arg("--db")
                .arg(&index_dir)
                .arg("--id")
                .arg(&identifier)
                .arg("--pcm")
                .arg(&pcm_path)
                .output()
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(|e| Error::IndexWriteFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::IndexWriteFailed(stderr.chars().take(2000).collect()));
        }

        Ok(())
    }

    /// Query the index with a clip's 16 kHz PCM. A non-zero exit is not
    /// fatal — it degrades to an empty result.
    pub async fn query(&self, pcm16k_f32le: &[f32]) -> Result<Vec<OlafMatch>, Error> {
        let pcm_file = match write_pcm_temp_file(pcm16k_f32le) {
            Ok(f) => f,
            Err(_) => return Ok(Vec::new()),
        };
        let tool_path = self.tool_path.clone();
        let index_dir = self.index_dir.clone();
        let pcm_path = pcm_file.path().to_path_buf();

        let output = tokio::task::spawn_blocking(move || {
            Command::new(&tool_path)
                .arg("query")
                .arg("--db")
                .arg(&index_dir)
                .arg("--pcm")
                .arg(&pcm_path)
                .output()
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

        let output = match output {
            Ok(output) if output.status.success() => output,
            _ => return Ok(Vec::new()),
        };

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_matches(&text))
    }

    /// Remove every entry associated with `track_identifier`.
    pub async fn delete(&self, track_identifier: &str) -> Result<(), Error> {
        let tool_path = self.tool_path.clone();
        let index_dir = self.index_dir.clone();
        let identifier = track_identifier.to_string();

        let output = tokio::task::spawn_blocking(move || {
            Command::new(&tool_path)
                .arg("delete")
                .arg("--db")
                .arg(&index_dir)
                .arg("--id")
                .arg(&identifier)
                .output()
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(|e| Error::IndexWriteFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::IndexWriteFailed(stderr.chars().take(2000).collect()));
        }

        Ok(())
    }
}

fn write_pcm_temp_file(pcm16k_f32le: &[f32]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new().map_err(Error::Io)?;
    for sample in pcm16k_f32le {
        file.write_all(&sample.to_le_bytes()).map_err(Error::Io)?;
    }
    file.flush().map_err(Error::Io)?;
    Ok(file)
}

/// Parse `olaf_c`'s one-match-per-line output. Comma-separated, with
/// semicolon accepted as a fallback delimiter.
fn parse_matches(text: &str) -> Vec<OlafMatch> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_match_line)
        .collect()
}

fn parse_match_line(line: &str) -> Option<OlafMatch> {
    let delimiter = if line.contains(',') { ',' } else { ';' };
    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if fields.len() < 7 {
        return None;
    }

    Some(OlafMatch {
        match_count: fields[0].parse().ok()?,
        query_start: fields[1].parse().ok()?,
        query_stop: fields[2].parse().ok()?,
        reference_identifier: fields[3].to_string(),
        internal_reference_id: fields[4].parse().ok()?,
        reference_start: fields[5].parse().ok()?,
        reference_stop: fields[6].parse().ok()?,
    })
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_match_line() {
        let text = "12,0.5,4.0,track-abc,42,10.0,13.5\n";
        let matches = parse_matches(text);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.match_count, 12);
        assert_eq!(m.query_start, 0.5);
        assert_eq!(m.query_stop, 4.0);
        assert_eq!(m.reference_identifier, "track-abc");
        assert_eq!(m.internal_reference_id, 42);
        assert_eq!(m.reference_start, 10.0);
        assert_eq!(m.reference_stop, 13.5);
    }

    #[test]
    fn falls_back_to_semicolon_delimiter() {
        let text = "5;1.0;3.0;track-xyz;7;0.0;2.0\n";
        let matches = parse_matches(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].reference_identifier, "track-xyz");
    }

    #[test]
    fn skips_malformed_lines() {
        let text = "not,enough,fields\n12,0.5,4.0,track-abc,42,10.0,13.5\n";
        let matches = parse_matches(text);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn empty_output_yields_no_matches() {
        assert!(parse_matches("").is_empty());
    }

    #[test]
    fn acquire_ownership_succeeds_on_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let index = FingerprintIndex::new("olaf_c", dir.path().join("olaf_db"));
        assert!(index.acquire_ownership().is_ok());
        assert!(index.acquire_ownership().is_ok(), "re-acquiring from the same process must succeed");
    }
}
