//! HTTP substrate.
//!
//! Every outbound request of the pipeline goes through [`HttpContext`]:
//! robots gating, global and per-origin concurrency, per-origin spacing,
//! the URL/body cache with conditional revalidation, transient-error
//! retries, and the SSL policy (allow-listed verify-off retry plus the
//! RIS-only plain-HTTP fallback). All process-wide mutable state lives in
//! the context value, passed explicitly to its users.

mod cache;
mod rate_limit;
mod robots;
mod ssl_policy;

pub use cache::{CacheMetadata, CachedEntry, UrlCache};
pub use rate_limit::{RateLimiter, RequestPermit};
pub use robots::{RobotsCache, RobotsRules};
pub use ssl_policy::{SslMetricsSnapshot, SslPolicy};

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CrawlMode, Settings, USER_AGENT};
use crate::models::SourceStatus;

/// Markers that identify a council-information-system page.
pub const RIS_MARKERS: &[&str] = &[
    "sitzung",
    "gremium",
    "tagesordnung",
    "beschluss",
    "sessionnet",
    "ratsinformationssystem",
    "ris",
    "vorlage",
    "antrag",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),
    #[error("SSL error for {url}: {message}")]
    Ssl { url: String, message: String },
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Map to the stats tag recorded at the job boundary.
    pub fn source_status(&self) -> SourceStatus {
        match self {
            Self::Ssl { .. } => SourceStatus::ErrorSsl,
            Self::Network { .. } => SourceStatus::ErrorNetwork,
            _ => SourceStatus::ErrorOther,
        }
    }
}

/// A completed GET: terminal status plus body and validators.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Whether the body was served from the cache (fresh hit or 304).
    pub from_cache: bool,
}

impl FetchResponse {
    /// Body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// A completed HEAD: status plus lower-cased response headers.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl HeadResponse {
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get("content-length")?.parse().ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

/// Per-call fetch options.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Gate the request on robots.txt (default true).
    pub check_robots: bool,
    /// Serve cached entries younger than this without a network round
    /// trip. With `None`, cached entries are revalidated conditionally.
    pub max_age: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            check_robots: true,
            max_age: None,
        }
    }
}

/// Shared HTTP state for one worker process.
pub struct HttpContext {
    client: Client,
    insecure_client: Client,
    limiter: RateLimiter,
    robots: RobotsCache,
    ssl: SslPolicy,
    cache: UrlCache,
    retries: u32,
    allow_http_fallback: bool,
}

impl HttpContext {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = settings.request_timeout();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()?;
        let insecure_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            insecure_client,
            limiter: RateLimiter::new(
                settings.global_concurrency,
                settings.per_domain_concurrency,
                settings.mode == CrawlMode::Fast,
            ),
            robots: RobotsCache::new(),
            ssl: SslPolicy::new(&settings.ssl_insecure_allowlist),
            cache: UrlCache::new(&settings.crawl_cache_base),
            retries: settings.crawl_retries.max(1),
            allow_http_fallback: settings.allow_http_fallback,
        })
    }

    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }

    pub fn ssl_metrics(&self) -> SslMetricsSnapshot {
        self.ssl.metrics()
    }

    /// GET with default options.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.fetch_with(url, FetchOptions::default()).await
    }

    /// GET returning the body as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.fetch(url).await?.text())
    }

    /// GET through robots gate, cache, politeness and retries.
    pub async fn fetch_with(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        if options.check_robots && !self.robots.allowed(&self.client, USER_AGENT, url).await {
            return Err(FetchError::RobotsDisallowed(url.to_string()));
        }

        // A fresh cache hit costs no politeness budget.
        if let Some(max_age) = options.max_age {
            if let Some(entry) = self.cache.get(url, Some(max_age)) {
                debug!(url, "cache hit (fresh)");
                return Ok(Self::response_from_cache(entry));
            }
        }

        let (etag, last_modified) = self.cache.validators(url);
        let _permit = self.limiter.acquire(url).await;

        let mut last_error: Option<FetchError> = None;
        for attempt in 0..self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }

            let result = self
                .send_get(&self.client, url, etag.as_deref(), last_modified.as_deref())
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if is_ssl_error(&e) => {
                    self.ssl.record_ssl_error();
                    if !self.ssl.should_disable_verify(url) {
                        return Err(FetchError::Ssl {
                            url: url.to_string(),
                            message: e.to_string(),
                        });
                    }
                    // Allow-listed host: retry exactly once without
                    // verification.
                    let host = RateLimiter::extract_origin(url).unwrap_or_default();
                    match self
                        .send_get(
                            &self.insecure_client,
                            url,
                            etag.as_deref(),
                            last_modified.as_deref(),
                        )
                        .await
                    {
                        Ok(response) => {
                            self.ssl.record_ssl_fallback(&host, url);
                            response
                        }
                        Err(fallback_err) => {
                            return Err(FetchError::Ssl {
                                url: url.to_string(),
                                message: fallback_err.to_string(),
                            });
                        }
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(url, attempt, error = %e, "transient network error");
                    last_error = Some(FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            };

            let status = response.status().as_u16();
            match status {
                304 => {
                    debug!(url, "304 Not Modified, serving cached body");
                    return match self.cache.get(url, None) {
                        Some(entry) => Ok(Self::response_from_cache(entry)),
                        None => Err(FetchError::Network {
                            url: url.to_string(),
                            message: "304 received but cache entry is gone".to_string(),
                        }),
                    };
                }
                200 => {
                    let headers = response.headers().clone();
                    let body = response.bytes().await.map_err(|e| FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;
                    let etag = header_value(&headers, "etag");
                    let last_modified = header_value(&headers, "last-modified");
                    let content_type = header_value(&headers, "content-type");
                    self.cache.set(
                        url,
                        &body,
                        etag.clone(),
                        last_modified.clone(),
                        content_type.clone(),
                    );
                    return Ok(FetchResponse {
                        status,
                        body: body.to_vec(),
                        content_type,
                        etag,
                        last_modified,
                        from_cache: false,
                    });
                }
                404 => {
                    debug!(url, "404 Not Found");
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        status,
                    });
                }
                s if s >= 500 => {
                    warn!(url, status = s, attempt, "server error");
                    last_error = Some(FetchError::Http {
                        url: url.to_string(),
                        status: s,
                    });
                    continue;
                }
                s => {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        status: s,
                    });
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::Network {
            url: url.to_string(),
            message: "retries exhausted".to_string(),
        }))
    }

    /// HEAD through robots gate and politeness; no body transfer.
    pub async fn head(&self, url: &str) -> Result<HeadResponse, FetchError> {
        url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !self.robots.allowed(&self.client, USER_AGENT, url).await {
            return Err(FetchError::RobotsDisallowed(url.to_string()));
        }

        let (etag, last_modified) = self.cache.validators(url);
        let _permit = self.limiter.acquire(url).await;

        let mut request = self.client.head(url);
        if let Some(etag) = etag.as_deref() {
            request = request.header("If-None-Match", etag);
        }
        if let Some(lm) = last_modified.as_deref() {
            request = request.header("If-Modified-Since", lm);
        }

        let response = request.send().await.map_err(|e| {
            if is_ssl_error(&e) {
                self.ssl.record_ssl_error();
                FetchError::Ssl {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        if status == 304 {
            // Synthesize headers from the cached entry's metadata.
            let mut headers = HashMap::new();
            if let Some(entry) = self.cache.get(url, None) {
                headers.insert(
                    "content-length".to_string(),
                    entry.metadata.content_length.to_string(),
                );
                if let Some(ct) = entry.metadata.content_type {
                    headers.insert("content-type".to_string(), ct);
                }
                if let Some(etag) = entry.metadata.etag {
                    headers.insert("etag".to_string(), etag);
                }
            }
            return Ok(HeadResponse {
                status: 200,
                headers,
            });
        }

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }
        Ok(HeadResponse { status, headers })
    }

    /// GET for RIS URLs: on an SSL failure and with the fallback switch on,
    /// the same URL is retried once over plain HTTP and accepted only when
    /// it returns 200 and carries a RIS marker.
    pub async fn fetch_ris(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let err = match self.fetch(url).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if matches!(err, FetchError::Ssl { .. }) && self.allow_http_fallback {
            if let Some(rest) = url.strip_prefix("https://") {
                let http_url = format!("http://{rest}");
                info!(url, fallback = %http_url, "attempting HTTP fallback for RIS URL");
                match self.fetch(&http_url).await {
                    Ok(response) if response.status == 200 && is_ris_page(&response.text()) => {
                        self.ssl.record_http_fallback(url, &http_url);
                        return Ok(response);
                    }
                    Ok(_) => {
                        warn!(url = %http_url, "HTTP fallback response carries no RIS markers");
                    }
                    Err(e) => {
                        debug!(url = %http_url, error = %e, "HTTP fallback failed");
                    }
                }
            }
        }

        Err(err)
    }

    async fn send_get(
        &self,
        client: &Client,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = client.get(url);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(lm) = last_modified {
            request = request.header("If-Modified-Since", lm);
        }
        request.send().await
    }

    fn response_from_cache(entry: CachedEntry) -> FetchResponse {
        FetchResponse {
            status: 200,
            body: entry.body,
            content_type: entry.metadata.content_type,
            etag: entry.metadata.etag,
            last_modified: entry.metadata.last_modified,
            from_cache: true,
        }
    }
}

/// Whether HTML content looks like a RIS page.
pub fn is_ris_page(content: &str) -> bool {
    let lowered = content.to_lowercase();
    RIS_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn header_value(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Whether a reqwest error (or anything in its chain) is a TLS failure.
fn is_ssl_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let message = e.to_string().to_lowercase();
        if message.contains("certificate")
            || message.contains("ssl")
            || message.contains("tls")
            || message.contains("handshake")
        {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ris_page_detection() {
        assert!(is_ris_page("<html>Tagesordnung der Sitzung</html>"));
        assert!(is_ris_page("SessionNet Portal"));
        assert!(!is_ris_page("<html>Willkommen in unserer Stadt</html>"));
    }

    #[test]
    fn fetch_error_maps_to_source_status() {
        let ssl = FetchError::Ssl {
            url: "https://x/".into(),
            message: "bad chain".into(),
        };
        assert_eq!(ssl.source_status(), SourceStatus::ErrorSsl);

        let net = FetchError::Network {
            url: "https://x/".into(),
            message: "timeout".into(),
        };
        assert_eq!(net.source_status(), SourceStatus::ErrorNetwork);

        let http = FetchError::Http {
            url: "https://x/".into(),
            status: 404,
        };
        assert_eq!(http.source_status(), SourceStatus::ErrorOther);
    }

    #[test]
    fn head_content_length() {
        let mut headers = HashMap::new();
        headers.insert("content-length".to_string(), "26214400".to_string());
        let head = HeadResponse {
            status: 200,
            headers,
        };
        assert_eq!(head.content_length(), Some(26_214_400));
    }
}
