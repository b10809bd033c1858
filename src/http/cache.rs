//! URL/body cache with conditional-request support.
//!
//! Entries are keyed by the SHA-256 of the URL and sharded by the first hash
//! byte. Each entry is a body file plus a `.meta.json` sidecar holding the
//! validators. Writes are last-writer-wins, which is safe because the bytes
//! for one URL are deterministic over a short horizon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Sidecar metadata stored next to each cached body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    pub cached_at: DateTime<Utc>,
    pub content_length: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// A cache hit: body plus validators.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub body: Vec<u8>,
    pub metadata: CacheMetadata,
}

/// Filesystem cache of response bodies.
#[derive(Debug, Clone)]
pub struct UrlCache {
    base: PathBuf,
}

impl UrlCache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn url_hash(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let hash = Self::url_hash(url);
        let dir = self.base.join(&hash[..2]);
        (
            dir.join(format!("{hash}.bin")),
            dir.join(format!("{hash}.meta.json")),
        )
    }

    /// Look up a cached entry. With `max_age` set, entries older than the
    /// window are treated as absent.
    pub fn get(&self, url: &str, max_age: Option<Duration>) -> Option<CachedEntry> {
        let (body_path, meta_path) = self.entry_paths(url);
        let metadata: CacheMetadata =
            serde_json::from_slice(&std::fs::read(meta_path).ok()?).ok()?;

        if let Some(max_age) = max_age {
            let age = Utc::now() - metadata.cached_at;
            if age > chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX) {
                return None;
            }
        }

        let body = std::fs::read(body_path).ok()?;
        Some(CachedEntry { body, metadata })
    }

    /// Conditional request validators for a URL, when cached.
    pub fn validators(&self, url: &str) -> (Option<String>, Option<String>) {
        match self.get(url, None) {
            Some(entry) => (entry.metadata.etag, entry.metadata.last_modified),
            None => (None, None),
        }
    }

    /// Store a response body and its validators.
    pub fn set(
        &self,
        url: &str,
        body: &[u8],
        etag: Option<String>,
        last_modified: Option<String>,
        content_type: Option<String>,
    ) {
        let (body_path, meta_path) = self.entry_paths(url);
        if let Some(parent) = body_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(url, error = %e, "failed to create cache directory");
                return;
            }
        }
        let metadata = CacheMetadata {
            url: url.to_string(),
            cached_at: Utc::now(),
            content_length: body.len() as u64,
            etag,
            last_modified,
            content_type,
        };
        if let Err(e) = std::fs::write(&body_path, body) {
            warn!(url, error = %e, "failed to write cache body");
            return;
        }
        match serde_json::to_vec_pretty(&metadata) {
            Ok(meta_bytes) => {
                if let Err(e) = std::fs::write(&meta_path, meta_bytes) {
                    warn!(url, error = %e, "failed to write cache metadata");
                }
            }
            Err(e) => warn!(url, error = %e, "failed to serialize cache metadata"),
        }
        debug!(url, bytes = body.len(), "cached response body");
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn miss_then_hit() {
        let dir = tempdir().unwrap();
        let cache = UrlCache::new(dir.path());
        let url = "https://example.org/amtsblatt/2024-03.pdf";

        assert!(cache.get(url, None).is_none());

        cache.set(
            url,
            b"%PDF-1.4 body",
            Some("\"etag-1\"".to_string()),
            Some("Wed, 21 Feb 2024 07:28:00 GMT".to_string()),
            Some("application/pdf".to_string()),
        );

        let entry = cache.get(url, None).expect("cached");
        assert_eq!(entry.body, b"%PDF-1.4 body");
        assert_eq!(entry.metadata.content_length, 13);
        assert_eq!(entry.metadata.etag.as_deref(), Some("\"etag-1\""));
        assert_eq!(
            entry.metadata.content_type.as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn validators_from_sidecar() {
        let dir = tempdir().unwrap();
        let cache = UrlCache::new(dir.path());
        let url = "https://example.org/page";
        cache.set(url, b"<html/>", Some("\"e\"".to_string()), None, None);

        let (etag, last_modified) = cache.validators(url);
        assert_eq!(etag.as_deref(), Some("\"e\""));
        assert!(last_modified.is_none());
    }

    #[test]
    fn max_age_invalidates() {
        let dir = tempdir().unwrap();
        let cache = UrlCache::new(dir.path());
        let url = "https://example.org/old";
        cache.set(url, b"x", None, None, None);
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get(url, Some(Duration::from_secs(3600))).is_some());
        assert!(cache.get(url, Some(Duration::ZERO)).is_none());
    }

    #[test]
    fn sharded_layout() {
        let dir = tempdir().unwrap();
        let cache = UrlCache::new(dir.path());
        cache.set("https://example.org/x", b"x", None, None, None);

        let shard_dirs: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(shard_dirs.len(), 1);
        let shard = shard_dirs[0].as_ref().unwrap();
        assert_eq!(shard.file_name().to_string_lossy().len(), 2);
    }
}
