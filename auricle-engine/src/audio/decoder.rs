//! PCM decoder wrapper (C1).
//!
//! Invokes the external decoder subprocess (`ffmpeg` by default — see
//! `AURICLE_DECODER_BIN`), feeding the input on stdin and consuming raw
//! PCM on stdout, the same subprocess-I/O shape `wkmp-ai`'s
//! `EssentiaClient` uses for its own external tool (`Command` +
//! `spawn_blocking`/async `tokio::process::Command`, captured stderr on
//! failure).

use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const BYTES_PER_SAMPLE_F32: usize = 4;

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("decoder tool not found at {0}")]
    ToolMissing(PathBuf),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("io error talking to decoder: {0}")]
    Io(#[from] std::io::Error),
}

/// Canonical decode targets the rest of the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Hz16k,
    Hz48k,
}

impl SampleRate {
    fn as_u32(self) -> u32 {
        match self {
            SampleRate::Hz16k => 16_000,
            SampleRate::Hz48k => 48_000,
        }
    }
}

/// Dual-rate PCM produced by one decode pass over the same input bytes.
pub struct DualRatePcm {
    /// 16 kHz mono f32 little-endian — fingerprint tool + perceptual dedup.
    pub pcm16k: Vec<f32>,
    /// 48 kHz mono f32 little-endian — embedding model.
    pub pcm48k: Vec<f32>,
    pub duration_seconds: f64,
}

#[derive(Clone)]
pub struct PcmDecoder {
    tool_path: PathBuf,
}

impl PcmDecoder {
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
        }
    }

    /// Startup check (C13): the tool must exist and report a version.
    pub async fn check_available(&self) -> Result<String, DecoderError> {
        let output = Command::new(&self.tool_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|_| DecoderError::ToolMissing(self.tool_path.clone()))?;

        let text = String::from_utf8_lossy(&output.stdout);
        let version_line = text.lines().next().unwrap_or("unknown version").to_string();
        Ok(version_line)
    }

    /// Decode to a single target rate, mono 32-bit float PCM, returning
    /// the raw little-endian bytes as the external tool wrote them.
    pub async fn decode(
        &self,
        bytes: &[u8],
        format_hint: Option<&str>,
        target_rate: SampleRate,
    ) -> Result<Vec<u8>, DecoderError> {
        let mut cmd = Command::new(&self.tool_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin");

        if let Some(hint) = format_hint {
            cmd.arg("-f").arg(hint);
        }

        cmd.arg("-i")
            .arg("pipe:0")
            .arg("-f")
            .arg("f32le")
            .arg("-ar")
            .arg(target_rate.as_u32().to_string())
            .arg("-ac")
            .arg("1")
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let input = bytes.to_vec();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
            drop(stdin);
        });

        let output = child.wait_with_output().await?;
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let truncated: String = stderr.chars().take(2000).collect();
            return Err(DecoderError::DecodeFailed(truncated));
        }

        Ok(output.stdout)
    }

    /// Decode to both canonical rates concurrently.
    pub async fn decode_dual_rate(
        &self,
        bytes: &[u8],
        format_hint: Option<&str>,
    ) -> Result<DualRatePcm, DecoderError> {
        let (r16, r48) = tokio::join!(
            self.decode(bytes, format_hint, SampleRate::Hz16k),
            self.decode(bytes, format_hint, SampleRate::Hz48k),
        );

        let bytes16 = r16?;
        let bytes48 = r48?;

        let duration_seconds = bytes16.len() as f64 / (BYTES_PER_SAMPLE_F32 as f64 * 16_000.0);

        Ok(DualRatePcm {
            pcm16k: bytes_to_f32(&bytes16),
            pcm48k: bytes_to_f32(&bytes48),
            duration_seconds,
        })
    }
}

/// Interpret little-endian f32 bytes as samples.
pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE_F32)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Reinterpret 16 kHz float samples as 16-bit signed integers without a
/// third decode pass, for the perceptual-dedup path.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_f32_round_trips_known_values() {
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.5, -0.5, 1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let samples = bytes_to_f32(&bytes);
        assert_eq!(samples, vec![0.0, 0.5, -0.5, 1.0]);
    }

    #[test]
    fn f32_to_i16_clamps_to_range() {
        let samples = vec![2.0f32, -2.0, 0.0];
        let out = f32_to_i16(&samples);
        assert_eq!(out, vec![i16::MAX, i16::MIN, 0]);
    }

    #[tokio::test]
    async fn check_available_reports_missing_tool() {
        let decoder = PcmDecoder::new("/nonexistent/decoder-tool-binary");
        let result = decoder.check_available().await;
        assert!(matches!(result, Err(DecoderError::ToolMissing(_))));
    }
}
