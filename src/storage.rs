//! Content-addressed blob storage and the extracted-text cache.
//!
//! Documents live under `docs/<xx>/<sha256>.bin` below the configured base
//! path; the two-byte shard keeps directories small. Writes are idempotent:
//! the same bytes land at the same path.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Relative blob path for a content hash: `docs/<xx>/<sha256>.bin`.
pub fn document_relative_path(sha256: &str) -> String {
    format!("docs/{}/{}.bin", &sha256[..2], sha256)
}

/// Store document bytes under the base path, returning the relative path.
pub fn save_document(base: &Path, content: &[u8]) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let sha = hex::encode(hasher.finalize());
    let rel = document_relative_path(&sha);
    save_bytes(base, &rel, content)?;
    Ok(rel)
}

/// Write bytes at a relative path below `base`, creating parents.
pub fn save_bytes(base: &Path, relative_path: &str, content: &[u8]) -> std::io::Result<PathBuf> {
    let target = base.join(relative_path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, content)?;
    Ok(target)
}

/// Read bytes at a relative path below `base`, if present.
pub fn read_bytes(base: &Path, relative_path: &str) -> Option<Vec<u8>> {
    std::fs::read(base.join(relative_path)).ok()
}

/// Cache of extracted document text, keyed by sha256(url ‖ content length)
/// and sharded by the first hash byte like the other trees.
#[derive(Debug, Clone)]
pub struct TextCache {
    base: PathBuf,
}

impl TextCache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn key(url: &str, content_length: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(content_length.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(&key[..2]).join(format!("{key}.txt"))
    }

    pub fn get(&self, url: &str, content_length: usize) -> Option<String> {
        let key = Self::key(url, content_length);
        std::fs::read_to_string(self.path_for(&key)).ok()
    }

    pub fn set(&self, url: &str, content_length: usize, text: &str) {
        let key = Self::key(url, content_length);
        let path = self.path_for(&key);
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "failed to create text cache directory");
                return;
            }
        }
        match std::fs::write(&path, text) {
            Ok(()) => debug!(url, "stored extracted text"),
            Err(e) => warn!(url, error = %e, "failed to write text cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn document_path_is_sharded() {
        let sha = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        assert_eq!(
            document_relative_path(sha),
            format!("docs/ab/{sha}.bin")
        );
    }

    #[test]
    fn save_document_round_trips() {
        let dir = tempdir().unwrap();
        let rel = save_document(dir.path(), b"pdf bytes").unwrap();
        let read = read_bytes(dir.path(), &rel).unwrap();
        assert_eq!(read, b"pdf bytes");

        // Stored bytes hash to the path component.
        let mut hasher = Sha256::new();
        hasher.update(b"pdf bytes");
        let sha = hex::encode(hasher.finalize());
        assert!(rel.contains(&sha));
    }

    #[test]
    fn save_document_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = save_document(dir.path(), b"same").unwrap();
        let second = save_document(dir.path(), b"same").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn text_cache_keyed_by_url_and_length() {
        let dir = tempdir().unwrap();
        let cache = TextCache::new(dir.path());
        cache.set("https://example.org/a.pdf", 100, "extracted");
        assert_eq!(
            cache.get("https://example.org/a.pdf", 100).as_deref(),
            Some("extracted")
        );
        // Different length means a different document revision.
        assert!(cache.get("https://example.org/a.pdf", 101).is_none());
        assert!(cache.get("https://example.org/b.pdf", 100).is_none());
    }
}
