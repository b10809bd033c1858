//! Application settings.
//!
//! Settings are loaded from an optional TOML file, then overridden by
//! environment variables (a `.env` file is honoured when present). Every
//! option has a default suitable for a polite research crawl.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed User-Agent identifying the crawler with a contact URL.
pub const USER_AGENT: &str =
    "bessaquire/0.1 (grid-storage planning research; +https://github.com/bessaquire/bessaquire)";

/// Crawl mode controlling thresholds and extraction depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Jittered requests, shallow PDF extraction, strict thresholds.
    #[default]
    Fast,
    /// No jitter, deeper PDF extraction, relaxed thresholds.
    Deep,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Deep => "deep",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fast" => Some(Self::Fast),
            "deep" => Some(Self::Deep),
            _ => None,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Crawl mode (fast/deep).
    pub mode: CrawlMode,
    /// Global in-flight request cap.
    pub global_concurrency: usize,
    /// Per-origin in-flight request cap.
    pub per_domain_concurrency: usize,
    /// Per-request absolute timeout in seconds.
    pub crawl_timeout_s: u64,
    /// Retry count for transient network errors.
    pub crawl_retries: u32,
    /// Fast-mode skip threshold for binary downloads (MB).
    pub crawl_pdf_max_size_mb: u64,
    /// Base directory for the URL/body cache.
    pub crawl_cache_base: PathBuf,
    /// Base directory for the extracted-text cache.
    pub crawl_text_cache_base: PathBuf,
    /// Base directory for the document blob store.
    pub storage_base_path: PathBuf,
    /// Hosts allowed to retry with certificate verification disabled
    /// after an SSL failure.
    pub ssl_insecure_allowlist: Vec<String>,
    /// Enable the plain-HTTP retry for RIS URLs after an SSL failure.
    pub allow_http_fallback: bool,
    /// Re-crawl municipalities after this many days.
    pub rescan_interval_days: i64,
    /// Municipalities enqueued per orchestrator cycle.
    pub batch_size: usize,
    /// Orchestrator sleep between cycles in seconds.
    pub check_interval_seconds: u64,
    /// Region code stamped on jobs and procedures.
    pub region: String,
}

/// Default allow-list entry: a RIS hoster with a chronically broken chain.
const DEFAULT_SSL_INSECURE_ALLOWLIST: &[&str] = &["ssl.ratsinfo-online.net"];

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: CrawlMode::Fast,
            global_concurrency: 100,
            per_domain_concurrency: 2,
            crawl_timeout_s: 30,
            crawl_retries: 3,
            crawl_pdf_max_size_mb: 25,
            crawl_cache_base: PathBuf::from("data/cache"),
            crawl_text_cache_base: PathBuf::from("data/text_cache"),
            storage_base_path: PathBuf::from("data/documents"),
            ssl_insecure_allowlist: DEFAULT_SSL_INSECURE_ALLOWLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allow_http_fallback: false,
            rescan_interval_days: 7,
            batch_size: 10,
            check_interval_seconds: 60,
            region: "BB".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, then apply environment overrides.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Load settings from the environment only (`.env` honoured).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// Apply `CRAWL_*` environment overrides in place.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CRAWL_MODE") {
            if let Some(mode) = CrawlMode::from_str(&v) {
                self.mode = mode;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_GLOBAL_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.global_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_PER_DOMAIN_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.per_domain_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_TIMEOUT_S") {
            if let Ok(n) = v.parse() {
                self.crawl_timeout_s = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_RETRIES") {
            if let Ok(n) = v.parse() {
                self.crawl_retries = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_PDF_MAX_SIZE_MB") {
            if let Ok(n) = v.parse() {
                self.crawl_pdf_max_size_mb = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_CACHE_BASE") {
            self.crawl_cache_base = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CRAWL_TEXT_CACHE_BASE") {
            self.crawl_text_cache_base = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("STORAGE_BASE_PATH") {
            self.storage_base_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CRAWL_SSL_INSECURE_ALLOWLIST") {
            for host in v.split(',') {
                let host = host.trim().to_lowercase();
                if !host.is_empty() && !self.ssl_insecure_allowlist.contains(&host) {
                    self.ssl_insecure_allowlist.push(host);
                }
            }
        }
        if let Ok(v) = std::env::var("CRAWL_ALLOW_HTTP_FALLBACK") {
            self.allow_http_fallback = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }
        if let Ok(v) = std::env::var("RESCAN_INTERVAL_DAYS") {
            if let Ok(n) = v.parse() {
                self.rescan_interval_days = n;
            }
        }
        if let Ok(v) = std::env::var("BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("CHECK_INTERVAL_SECONDS") {
            if let Ok(n) = v.parse() {
                self.check_interval_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("CRAWL_REGION") {
            self.region = v;
        }
    }

    /// Per-request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl_timeout_s)
    }

    /// Fast-mode skip threshold in bytes.
    pub fn pdf_max_size_bytes(&self) -> u64 {
        self.crawl_pdf_max_size_mb * 1024 * 1024
    }

    /// Ensure cache and storage directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.crawl_cache_base)?;
        std::fs::create_dir_all(&self.crawl_text_cache_base)?;
        std::fs::create_dir_all(&self.storage_base_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.global_concurrency, 100);
        assert_eq!(s.per_domain_concurrency, 2);
        assert_eq!(s.crawl_timeout_s, 30);
        assert_eq!(s.crawl_retries, 3);
        assert_eq!(s.crawl_pdf_max_size_mb, 25);
        assert_eq!(s.rescan_interval_days, 7);
        assert_eq!(s.batch_size, 10);
        assert_eq!(s.check_interval_seconds, 60);
        assert!(!s.allow_http_fallback);
        assert!(s
            .ssl_insecure_allowlist
            .contains(&"ssl.ratsinfo-online.net".to_string()));
    }

    #[test]
    fn mode_round_trip() {
        assert_eq!(CrawlMode::from_str("fast"), Some(CrawlMode::Fast));
        assert_eq!(CrawlMode::from_str("deep"), Some(CrawlMode::Deep));
        assert_eq!(CrawlMode::from_str("bogus"), None);
        assert_eq!(CrawlMode::Deep.as_str(), "deep");
    }

    #[test]
    fn toml_overrides_defaults() {
        let parsed: Settings = toml::from_str(
            r#"
            mode = "deep"
            global_concurrency = 4
            ssl_insecure_allowlist = ["bad.example.org"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.mode, CrawlMode::Deep);
        assert_eq!(parsed.global_concurrency, 4);
        assert_eq!(parsed.ssl_insecure_allowlist, vec!["bad.example.org"]);
        // Unspecified fields keep defaults.
        assert_eq!(parsed.batch_size, 10);
    }
}
