//! Orchestrator: periodically selects due municipalities and enqueues
//! their discovery jobs.
//!
//! A pure producer: one task, no internal concurrency. Each cycle takes up
//! to `batch_size` municipalities that were never crawled or whose latest
//! stats row is older than the rescan interval, enqueues three discovery
//! jobs each (RIS, gazette, website) and sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Settings;
use crate::discovery::patterns::website_guesses;
use crate::models::{DiscoveryJob, JobPayload, Municipality};
use crate::queue::JobQueue;
use crate::repository::Repository;

pub struct Orchestrator {
    repo: Arc<dyn Repository>,
    queue: Arc<dyn JobQueue>,
    settings: Arc<Settings>,
}

impl Orchestrator {
    pub fn new(
        repo: Arc<dyn Repository>,
        queue: Arc<dyn JobQueue>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            repo,
            queue,
            settings,
        }
    }

    /// Run until the stop signal flips.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            batch_size = self.settings.batch_size,
            rescan_interval_days = self.settings.rescan_interval_days,
            check_interval_seconds = self.settings.check_interval_seconds,
            "orchestrator started"
        );

        let mut cycles = 0u64;
        let mut total_jobs = 0u64;

        while !*stop.borrow() {
            cycles += 1;
            match self.run_cycle().await {
                Ok(jobs) => {
                    total_jobs += jobs as u64;
                    if jobs > 0 {
                        info!(cycle = cycles, jobs, total_jobs, "cycle complete");
                    }
                }
                Err(e) => warn!(cycle = cycles, error = %e, "cycle failed"),
            }

            let sleep = Duration::from_secs(self.settings.check_interval_seconds);
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = stop.changed() => {}
            }
        }

        info!(cycles, total_jobs, "orchestrator stopped");
    }

    /// One selection-and-enqueue cycle. Returns the number of jobs pushed.
    pub async fn run_cycle(&self) -> anyhow::Result<usize> {
        let due = self
            .repo
            .due_municipalities(
                chrono::Duration::days(self.settings.rescan_interval_days),
                self.settings.batch_size,
            )
            .await?;

        let mut jobs = 0usize;
        for municipality in &due {
            jobs += self.enqueue_discovery_jobs(municipality).await;
        }
        Ok(jobs)
    }

    /// Three discovery jobs per municipality, one per source.
    async fn enqueue_discovery_jobs(&self, municipality: &Municipality) -> usize {
        let storage_base_path = self.settings.storage_base_path.display().to_string();

        let jobs = [
            ("ris", municipality.ris_url.clone()),
            ("gazette", municipality.gazette_url.clone()),
            (
                "municipal_website",
                municipality
                    .official_website
                    .clone()
                    .or_else(|| website_guesses(&municipality.name).into_iter().next()),
            ),
        ];

        let mut enqueued = 0usize;
        for (source, entrypoint) in jobs {
            let payload = JobPayload::Discovery(DiscoveryJob {
                region: municipality.region.clone(),
                source: source.to_string(),
                entrypoint,
                municipality_key: municipality.municipality_key.clone(),
                municipality_name: municipality.name.clone(),
                county: municipality.county.clone(),
                storage_base_path: storage_base_path.clone(),
                mode: self.settings.mode,
            });
            match self.queue.enqueue(&payload).await {
                Ok(()) => enqueued += 1,
                Err(e) => warn!(
                    municipality = %municipality.name,
                    source,
                    error = %e,
                    "failed to enqueue discovery job"
                ),
            }
        }

        info!(
            municipality = %municipality.name,
            key = %municipality.municipality_key,
            enqueued,
            "queued discovery jobs"
        );
        enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlStat;
    use crate::models::DiscoverySource;
    use crate::queue::MemoryQueue;
    use crate::repository::MemoryRepository;

    async fn setup() -> (Arc<MemoryRepository>, Arc<MemoryQueue>, Orchestrator) {
        let repo = Arc::new(MemoryRepository::new());
        let queue = Arc::new(MemoryQueue::new());
        let orchestrator = Orchestrator::new(
            repo.clone(),
            queue.clone(),
            Arc::new(Settings::default()),
        );
        (repo, queue, orchestrator)
    }

    #[tokio::test]
    async fn cycle_enqueues_three_jobs_per_municipality() {
        let (repo, queue, orchestrator) = setup().await;
        repo.seed_municipality(Municipality::new("1", "Metzdorf", "MOL", "BB"))
            .await;
        repo.seed_municipality(
            Municipality::new("2", "Altdorf", "LOS", "BB")
                .with_official_website("https://www.altdorf.de"),
        )
        .await;

        let jobs = orchestrator.run_cycle().await.unwrap();
        assert_eq!(jobs, 6);
        assert_eq!(queue.len().await, 6);

        // All payloads are discovery jobs with the expected sources.
        let mut sources = Vec::new();
        while let Some(payload) = queue.pop(Duration::from_millis(10)).await.unwrap() {
            match payload {
                JobPayload::Discovery(job) => sources.push(job.source),
                other => panic!("unexpected payload {other:?}"),
            }
        }
        assert_eq!(sources.iter().filter(|s| *s == "ris").count(), 2);
        assert_eq!(sources.iter().filter(|s| *s == "gazette").count(), 2);
        assert_eq!(
            sources.iter().filter(|s| *s == "municipal_website").count(),
            2
        );
    }

    #[tokio::test]
    async fn website_entrypoint_prefers_official_site() {
        let (repo, queue, orchestrator) = setup().await;
        repo.seed_municipality(
            Municipality::new("1", "Metzdorf", "MOL", "BB")
                .with_official_website("https://www.metzdorf-official.de"),
        )
        .await;

        orchestrator.run_cycle().await.unwrap();
        let mut website_entry = None;
        while let Some(payload) = queue.pop(Duration::from_millis(10)).await.unwrap() {
            if let JobPayload::Discovery(job) = payload {
                if job.source == "municipal_website" {
                    website_entry = job.entrypoint;
                }
            }
        }
        assert_eq!(
            website_entry.as_deref(),
            Some("https://www.metzdorf-official.de")
        );
    }

    #[tokio::test]
    async fn recently_crawled_municipalities_are_skipped() {
        let (repo, queue, orchestrator) = setup().await;
        repo.seed_municipality(Municipality::new("1", "Metzdorf", "MOL", "BB"))
            .await;
        let stat = CrawlStat::new("run-0", "job-0", "1", DiscoverySource::Ris);
        repo.insert_crawl_stats(&stat).await.unwrap();

        let jobs = orchestrator.run_cycle().await.unwrap();
        assert_eq!(jobs, 0);
        assert!(queue.is_empty().await);
    }
}
