//! Raw-file store (C3): content-addressed on-disk storage with
//! hash-prefix fan-out, so no directory exceeds ~100 files at 20k tracks.
//!
//! Never read during search — only by the ingestion pipeline and by
//! administrative re-indexing / audio byte-serving.

use auricle_common::Result;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct RawFileStore {
    root: PathBuf,
}

impl RawFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/raw/{sha256[:2]}/{sha256}.{ext}`
    pub fn path_for(&self, sha256: &str, ext: &str) -> PathBuf {
        let prefix = &sha256[..sha256.len().min(2)];
        self.root.join("raw").join(prefix).join(format!("{sha256}.{ext}"))
    }

    /// Write the archival copy once. Idempotent: if the file already
    /// exists, it is left untouched and the existing path is returned.
    pub fn write_once(&self, bytes: &[u8], sha256: &str, ext: &str) -> Result<PathBuf> {
        let path = self.path_for(sha256, ext);

        if path.exists() {
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn path_for_uses_two_char_fan_out() {
        let store = RawFileStore::new("/data");
        let path = store.path_for("aabbcc", "mp3");
        assert_eq!(path, Path::new("/data/raw/aa/aabbcc.mp3"));
    }

    #[test]
    fn write_once_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RawFileStore::new(dir.path());

        let path1 = store.write_once(b"hello", "deadbeef", "wav").unwrap();
        assert_eq!(std::fs::read(&path1).unwrap(), b"hello");

        // Second write with different bytes must not overwrite.
        let path2 = store.write_once(b"goodbye", "deadbeef", "wav").unwrap();
        assert_eq!(path1, path2);
        assert_eq!(std::fs::read(&path2).unwrap(), b"hello");
    }

    #[test]
    fn write_once_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = RawFileStore::new(dir.path().join("nested"));
        let path = store.write_once(b"data", "ff00ff00", "flac").unwrap();
        assert!(path.exists());
    }
}
