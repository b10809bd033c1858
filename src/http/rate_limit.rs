//! Politeness control: global and per-origin concurrency plus spacing.
//!
//! Two semaphores gate every request (global cap, per-origin cap), and
//! request starts against one origin are at least `min_delay` apart, with a
//! per-domain override table for hosts that demand a larger crawl delay.
//! Fast mode adds a small uniform jitter so request trains do not align.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Jitter bounds in milliseconds for fast mode.
const JITTER_MS: (u64, u64) = (50, 250);

/// Hosts with a robots crawl-delay larger than the default spacing.
const DOMAIN_DELAYS: &[(&str, u64)] = &[("geobasis-bb.de", 10), ("www.geobasis-bb.de", 10)];

#[derive(Debug)]
struct OriginState {
    semaphore: Arc<Semaphore>,
    last_request: Option<Instant>,
}

/// Held for the duration of one request; dropping it releases both permits.
#[derive(Debug)]
pub struct RequestPermit {
    _global: OwnedSemaphorePermit,
    _origin: OwnedSemaphorePermit,
}

/// Per-origin rate limiter shared by all requests of one process.
#[derive(Debug)]
pub struct RateLimiter {
    global: Arc<Semaphore>,
    per_origin: usize,
    min_delay: Duration,
    domain_delays: HashMap<String, Duration>,
    jitter: bool,
    origins: Mutex<HashMap<String, Arc<Mutex<OriginState>>>>,
}

impl RateLimiter {
    /// Create a limiter with the given caps. `jitter` should be true in
    /// fast mode only.
    pub fn new(global_concurrency: usize, per_origin_concurrency: usize, jitter: bool) -> Self {
        let domain_delays = DOMAIN_DELAYS
            .iter()
            .map(|(host, secs)| (host.to_string(), Duration::from_secs(*secs)))
            .collect();
        Self {
            global: Arc::new(Semaphore::new(global_concurrency.max(1))),
            per_origin: per_origin_concurrency.max(1),
            min_delay: Duration::from_secs(1),
            domain_delays,
            jitter,
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Override the default per-origin minimum spacing.
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Add or replace a per-domain spacing override.
    pub fn with_domain_delay(mut self, host: &str, delay: Duration) -> Self {
        self.domain_delays.insert(host.to_lowercase(), delay);
        self
    }

    /// Extract the origin host from a URL.
    pub fn extract_origin(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    fn delay_for(&self, origin: &str) -> Duration {
        self.domain_delays
            .get(origin)
            .copied()
            .unwrap_or(self.min_delay)
    }

    /// Wait until the origin admits another request, then return the permit.
    ///
    /// URLs without a parseable host only consume the global permit.
    pub async fn acquire(&self, url: &str) -> RequestPermit {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .expect("global semaphore never closed");

        let origin = Self::extract_origin(url).unwrap_or_default();
        let state = {
            let mut origins = self.origins.lock().await;
            origins
                .entry(origin.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(OriginState {
                        semaphore: Arc::new(Semaphore::new(self.per_origin)),
                        last_request: None,
                    }))
                })
                .clone()
        };

        let semaphore = { state.lock().await.semaphore.clone() };
        let origin_permit = semaphore
            .acquire_owned()
            .await
            .expect("origin semaphore never closed");

        // Spacing: request starts per origin are at least delay_for(origin)
        // apart. Check-and-stamp happens under the state lock so concurrent
        // holders of the (capped) origin permits still space out.
        let delay = self.delay_for(&origin);
        loop {
            let wait = {
                let mut guard = state.lock().await;
                let now = Instant::now();
                match guard.last_request {
                    Some(last) if now < last + delay => last + delay - now,
                    _ => {
                        guard.last_request = Some(now);
                        break;
                    }
                }
            };
            debug!(origin = %origin, ?wait, "spacing requests");
            tokio::time::sleep(wait).await;
        }

        if self.jitter {
            let jitter_ms = rand::thread_rng().gen_range(JITTER_MS.0..=JITTER_MS.1);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        RequestPermit {
            _global: global,
            _origin: origin_permit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_origin() {
        assert_eq!(
            RateLimiter::extract_origin("https://www.metzdorf.de/amtsblatt"),
            Some("www.metzdorf.de".to_string())
        );
        assert_eq!(RateLimiter::extract_origin("nonsense"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_min_spacing_per_origin() {
        let limiter = RateLimiter::new(10, 2, false).with_min_delay(Duration::from_millis(500));
        let start = Instant::now();
        let p1 = limiter.acquire("https://example.org/a").await;
        drop(p1);
        let p2 = limiter.acquire("https://example.org/b").await;
        drop(p2);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn different_origins_do_not_space_each_other() {
        let limiter = RateLimiter::new(10, 2, false).with_min_delay(Duration::from_secs(60));
        let _p1 = limiter.acquire("https://a.example.org/").await;
        let start = Instant::now();
        let _p2 = limiter.acquire("https://b.example.org/").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn domain_override_applies() {
        let limiter = RateLimiter::new(10, 2, false).with_min_delay(Duration::from_millis(10));
        let start = Instant::now();
        drop(limiter.acquire("https://www.geobasis-bb.de/wfs").await);
        drop(limiter.acquire("https://www.geobasis-bb.de/wfs2").await);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn per_origin_cap_blocks_third_request() {
        let limiter = Arc::new(RateLimiter::new(10, 2, false).with_min_delay(Duration::ZERO));
        let _p1 = limiter.acquire("https://example.org/1").await;
        let _p2 = limiter.acquire("https://example.org/2").await;
        let limiter2 = limiter.clone();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            limiter2.acquire("https://example.org/3"),
        )
        .await;
        assert!(blocked.is_err(), "third concurrent request must wait");
    }
}
