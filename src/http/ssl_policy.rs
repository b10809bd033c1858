//! SSL/TLS policy: allow-listed verification bypass and fallback metrics.
//!
//! Verification is only ever disabled for a host on the allow-list, and only
//! after a verification failure has actually occurred. Every bypass is
//! counted and logged.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use url::Url;

/// Process-wide SSL metric counters.
#[derive(Debug, Default)]
pub struct SslMetrics {
    ssl_errors_total: AtomicU64,
    ssl_fallback_used_total: AtomicU64,
    http_fallback_used_total: AtomicU64,
}

/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslMetricsSnapshot {
    pub ssl_errors_total: u64,
    pub ssl_fallback_used_total: u64,
    pub http_fallback_used_total: u64,
}

/// SSL policy: the insecure-retry allow-list plus fallback accounting.
#[derive(Debug)]
pub struct SslPolicy {
    allowlist: HashSet<String>,
    metrics: SslMetrics,
}

impl SslPolicy {
    /// Build a policy from configured hosts (lower-cased, ports stripped).
    pub fn new(allowlist: &[String]) -> Self {
        let allowlist = allowlist
            .iter()
            .map(|h| {
                h.trim()
                    .to_lowercase()
                    .split(':')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            allowlist,
            metrics: SslMetrics::default(),
        }
    }

    /// Whether verification may be disabled for this URL. Only meaningful
    /// after an SSL failure has been observed for it.
    pub fn should_disable_verify(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        else {
            return false;
        };
        let allowed = self.allowlist.contains(&host);
        if allowed {
            debug!(host, "host is on the SSL insecure allow-list");
        }
        allowed
    }

    pub fn record_ssl_error(&self) {
        self.metrics.ssl_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ssl_fallback(&self, host: &str, url: &str) {
        self.metrics
            .ssl_fallback_used_total
            .fetch_add(1, Ordering::Relaxed);
        warn!(
            host,
            url, "SSL_FALLBACK_VERIFY_FALSE: verification disabled for allow-listed host"
        );
    }

    pub fn record_http_fallback(&self, original_url: &str, http_url: &str) {
        self.metrics
            .http_fallback_used_total
            .fetch_add(1, Ordering::Relaxed);
        warn!(
            original = original_url,
            fallback = http_url,
            "RIS_HTTP_FALLBACK_USED: HTTPS failed, plain HTTP accepted"
        );
    }

    pub fn metrics(&self) -> SslMetricsSnapshot {
        SslMetricsSnapshot {
            ssl_errors_total: self.metrics.ssl_errors_total.load(Ordering::Relaxed),
            ssl_fallback_used_total: self
                .metrics
                .ssl_fallback_used_total
                .load(Ordering::Relaxed),
            http_fallback_used_total: self
                .metrics
                .http_fallback_used_total
                .load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_matches_host_only() {
        let policy = SslPolicy::new(&["ssl.ratsinfo-online.net".to_string()]);
        assert!(policy.should_disable_verify("https://ssl.ratsinfo-online.net/si0100.asp"));
        assert!(policy.should_disable_verify("https://ssl.ratsinfo-online.net:8443/x"));
        assert!(!policy.should_disable_verify("https://other.example.org/"));
        assert!(!policy.should_disable_verify("not a url"));
    }

    #[test]
    fn allowlist_entries_are_normalized() {
        let policy = SslPolicy::new(&[" Bad.Example.ORG:443 ".to_string()]);
        assert!(policy.should_disable_verify("https://bad.example.org/page"));
    }

    #[test]
    fn counters_accumulate() {
        let policy = SslPolicy::new(&[]);
        policy.record_ssl_error();
        policy.record_ssl_error();
        policy.record_ssl_fallback("h", "https://h/");
        policy.record_http_fallback("https://h/", "http://h/");
        let snap = policy.metrics();
        assert_eq!(snap.ssl_errors_total, 2);
        assert_eq!(snap.ssl_fallback_used_total, 1);
        assert_eq!(snap.http_fallback_used_total, 1);
    }
}
