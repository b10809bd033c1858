//! Worker loop: consume jobs from the shared queue and route them by
//! payload kind. The stop signal is honoured at job boundaries only.

mod discovery;
mod extraction;

pub use discovery::DiscoveryWorker;
pub use extraction::ExtractionWorker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::http::HttpContext;
use crate::models::{DiscoverySource, JobPayload, SourceStatus};
use crate::queue::JobQueue;
use crate::repository::Repository;

/// One worker task: pops one job at a time and processes it to completion.
pub struct Worker {
    discovery: DiscoveryWorker,
    extraction: ExtractionWorker,
    queue: Arc<dyn JobQueue>,
}

impl Worker {
    pub fn new(
        ctx: Arc<HttpContext>,
        repo: Arc<dyn Repository>,
        queue: Arc<dyn JobQueue>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            discovery: DiscoveryWorker::new(ctx.clone(), repo.clone(), queue.clone()),
            extraction: ExtractionWorker::new(ctx, repo, settings),
            queue,
        }
    }

    /// Run until the stop signal flips. Each loop iteration handles at
    /// most one job; in-flight jobs are finished before stopping.
    pub async fn run(&self, stop: watch::Receiver<bool>) {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(run_id, "worker started");

        loop {
            if *stop.borrow() {
                break;
            }
            match self.queue.pop(Duration::from_secs(5)).await {
                Ok(Some(JobPayload::Discovery(job))) => {
                    self.discovery.process(&job, &run_id).await;
                }
                Ok(Some(JobPayload::Extraction(job))) => {
                    self.extraction.process(&job, &run_id).await;
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "queue error, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!(run_id, "worker stopped");
    }
}

/// Emit the one-line per-municipality summary once stats rows for all
/// three sources of the run exist. Reading all rows makes the line
/// idempotent regardless of source completion order.
pub async fn log_municipality_summary(
    repo: &dyn Repository,
    municipality_key: &str,
    municipality_name: &str,
    run_id: &str,
) {
    let stats = match repo.stats_for_run(municipality_key, run_id).await {
        Ok(stats) => stats,
        Err(e) => {
            debug!(error = %e, "could not read stats for summary");
            return;
        }
    };

    let mut statuses: HashMap<DiscoverySource, SourceStatus> = HashMap::new();
    let mut procedures_saved = 0u64;
    for stat in &stats {
        procedures_saved += stat.counts.procedures_saved;
        let entry = statuses.entry(stat.source).or_insert(stat.source_status);
        // Any error row for a source marks the whole source as failed.
        if stat.source_status != SourceStatus::Success {
            *entry = stat.source_status;
        }
    }

    let all_sources = [
        DiscoverySource::Ris,
        DiscoverySource::Gazette,
        DiscoverySource::MunicipalWebsite,
    ];
    if !all_sources.iter().all(|s| statuses.contains_key(s)) {
        return;
    }

    info!(
        "MUNICIPALITY_SUMMARY: {} ({}) | RIS={} | Gazette={} | Municipal={} | Procedures={}",
        municipality_name,
        municipality_key,
        statuses[&DiscoverySource::Ris].as_str(),
        statuses[&DiscoverySource::Gazette].as_str(),
        statuses[&DiscoverySource::MunicipalWebsite].as_str(),
        procedures_saved,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlStat;
    use crate::repository::MemoryRepository;

    #[tokio::test]
    async fn summary_requires_all_three_sources() {
        let repo = MemoryRepository::new();
        for (i, source) in [DiscoverySource::Ris, DiscoverySource::Gazette]
            .into_iter()
            .enumerate()
        {
            let stat = CrawlStat::new("run-1", &format!("job-{i}"), "12345", source);
            repo.insert_crawl_stats(&stat).await.unwrap();
        }
        // Two of three sources: the function returns without logging and,
        // crucially, without panicking on the missing entry.
        log_municipality_summary(&repo, "12345", "Metzdorf", "run-1").await;

        let stat = CrawlStat::new("run-1", "job-2", "12345", DiscoverySource::MunicipalWebsite);
        repo.insert_crawl_stats(&stat).await.unwrap();
        log_municipality_summary(&repo, "12345", "Metzdorf", "run-1").await;
    }
}
