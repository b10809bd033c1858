//! Job queue contract.
//!
//! A single shared queue carries discovery and extraction jobs; payloads
//! are discriminated by the presence of `candidate_id`. The production
//! broker is an external collaborator providing at-least-once delivery;
//! the in-memory backend is a FIFO for tests and single-process runs.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use crate::models::JobPayload;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Producer/consumer interface over the shared job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push one job payload.
    async fn enqueue(&self, payload: &JobPayload) -> Result<(), QueueError>;

    /// Pop the next payload, waiting up to `timeout`. `None` on timeout.
    async fn pop(&self, timeout: Duration) -> Result<Option<JobPayload>, QueueError>;
}

/// FIFO queue in process memory. Payloads round-trip through JSON so the
/// wire behaviour matches broker backends.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, payload: &JobPayload) -> Result<(), QueueError> {
        let encoded = serde_json::to_string(payload)?;
        self.items.lock().await.push_back(encoded);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<JobPayload>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(encoded) = self.items.lock().await.pop_front() {
                return Ok(Some(serde_json::from_str(&encoded)?));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlMode;
    use crate::models::{DiscoveryJob, ExtractionJob};

    fn discovery_job() -> JobPayload {
        JobPayload::Discovery(DiscoveryJob {
            region: "BB".into(),
            source: "ris".into(),
            entrypoint: None,
            municipality_key: "12345".into(),
            municipality_name: "Metzdorf".into(),
            county: "MOL".into(),
            storage_base_path: "/data/documents".into(),
            mode: CrawlMode::Fast,
        })
    }

    fn extraction_job() -> JobPayload {
        JobPayload::Extraction(ExtractionJob {
            candidate_id: "c-1".into(),
            run_id: "r-1".into(),
            region: "BB".into(),
            source: "ris".into(),
            municipality_key: "12345".into(),
            mode: CrawlMode::Fast,
        })
    }

    #[tokio::test]
    async fn fifo_order_and_discrimination() {
        let queue = MemoryQueue::new();
        queue.enqueue(&discovery_job()).await.unwrap();
        queue.enqueue(&extraction_job()).await.unwrap();

        let first = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(first.kind(), "discovery");
        let second = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(second.kind(), "extraction");
    }

    #[tokio::test(start_paused = true)]
    async fn pop_times_out_when_empty() {
        let queue = MemoryQueue::new();
        let result = queue.pop(Duration::from_millis(50)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_consumer() {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        queue.enqueue(&extraction_job()).await.unwrap();
        let popped = consumer.await.unwrap().unwrap();
        assert!(popped.is_some());
    }
}
