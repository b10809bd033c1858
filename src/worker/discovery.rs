//! Discovery worker: run one source crawler for one municipality, score
//! the raw items, persist candidates and enqueue extraction jobs.
//!
//! Contract: consume one discovery job, emit candidates, never fail the
//! worker. Whatever happens, a stats row is written.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::classify::{prefilter_score, should_extract};
use crate::crawlers::{CrawlSummary, GazetteCrawler, RawItem, RisCrawler, WebsiteCrawler};
use crate::discovery::patterns::website_guesses;
use crate::discovery::ReasonCode;
use crate::http::HttpContext;
use crate::models::{
    CandidateStatus, CrawlCandidate, CrawlStat, DiscoveryJob, DiscoverySource, ExtractionJob,
    JobPayload, SourceStatus,
};
use crate::queue::JobQueue;
use crate::repository::Repository;

use super::log_municipality_summary;

pub struct DiscoveryWorker {
    ctx: Arc<HttpContext>,
    repo: Arc<dyn Repository>,
    queue: Arc<dyn JobQueue>,
}

impl DiscoveryWorker {
    pub fn new(
        ctx: Arc<HttpContext>,
        repo: Arc<dyn Repository>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self { ctx, repo, queue }
    }

    /// Process one discovery job end to end. Never returns an error; the
    /// outcome is recorded in the stats row.
    pub async fn process(&self, job: &DiscoveryJob, run_id: &str) {
        let job_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let Some(source) = DiscoverySource::from_str(&job.source) else {
            error!(source = %job.source, "unknown discovery source, dropping job");
            return;
        };

        let mut stat = CrawlStat::new(run_id, &job_id, &job.municipality_key, source);
        stat.domain = job
            .entrypoint
            .as_deref()
            .and_then(crate::http::RateLimiter::extract_origin)
            .or_else(|| Some(job.municipality_name.clone()));

        match self.run(job, source, run_id, &mut stat).await {
            Ok(summary) => {
                stat.source_status = match summary.diagnostics.reason_code {
                    Some(ReasonCode::SslBlocked) => SourceStatus::ErrorSsl,
                    _ => SourceStatus::Success,
                };
                stat.discovery_diagnostics = Some(summary.diagnostics);
            }
            Err(e) => {
                error!(
                    municipality = %job.municipality_name,
                    source = %job.source,
                    error = %e,
                    "discovery job failed"
                );
                stat.source_status = SourceStatus::ErrorOther;
                let mut message = e.to_string();
                message.truncate(200);
                stat.error_message = Some(message);
            }
        }

        stat.timings.total_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = self.repo.insert_crawl_stats(&stat).await {
            debug!(error = %e, "stats row not written (possibly a redelivery)");
        }

        info!(
            municipality = %job.municipality_name,
            source = %job.source,
            candidates = stat.counts.candidates_found,
            status = stat.source_status.as_str(),
            "discovery job completed"
        );

        log_municipality_summary(
            self.repo.as_ref(),
            &job.municipality_key,
            &job.municipality_name,
            run_id,
        )
        .await;
    }

    async fn run(
        &self,
        job: &DiscoveryJob,
        source: DiscoverySource,
        run_id: &str,
        stat: &mut CrawlStat,
    ) -> anyhow::Result<CrawlSummary> {
        // Seed hints from the municipality row, when present.
        let municipality = self.repo.get_municipality(&job.municipality_key).await?;
        let official_website = municipality
            .as_ref()
            .and_then(|m| m.official_website.clone());
        let seed = job.entrypoint.clone().or_else(|| match source {
            DiscoverySource::Ris => municipality.as_ref().and_then(|m| m.ris_url.clone()),
            DiscoverySource::Gazette => {
                municipality.as_ref().and_then(|m| m.gazette_url.clone())
            }
            DiscoverySource::MunicipalWebsite => official_website
                .clone()
                .or_else(|| website_guesses(&job.municipality_name).into_iter().next()),
        });

        let (tx, mut rx) = mpsc::channel::<RawItem>(64);
        let crawler = {
            let ctx = self.ctx.clone();
            let name = job.municipality_name.clone();
            let seed = seed.clone();
            let official = official_website.clone();
            tokio::spawn(async move {
                match source {
                    DiscoverySource::Ris => {
                        RisCrawler::new()
                            .crawl(&ctx, &name, seed.as_deref(), official.as_deref(), &tx)
                            .await
                    }
                    DiscoverySource::Gazette => {
                        GazetteCrawler::new()
                            .crawl(&ctx, &name, seed.as_deref(), official.as_deref(), &tx)
                            .await
                    }
                    DiscoverySource::MunicipalWebsite => match seed.as_deref() {
                        Some(homepage) => {
                            WebsiteCrawler::new().crawl(&ctx, homepage, &tx).await
                        }
                        None => CrawlSummary::default(),
                    },
                }
            })
        };

        let fetch_started = Instant::now();
        while let Some(item) = rx.recv().await {
            stat.counts.candidates_found += 1;
            if let Err(e) = self.handle_item(job, source, run_id, &item, stat).await {
                warn!(url = item.url(), error = %e, "failed to persist candidate");
            }
        }
        stat.timings.fetch_html_ms = fetch_started.elapsed().as_millis() as u64;

        let summary = crawler.await?;
        stat.counts.pages_fetched = summary.pages_fetched;
        Ok(summary)
    }

    async fn handle_item(
        &self,
        job: &DiscoveryJob,
        source: DiscoverySource,
        run_id: &str,
        item: &RawItem,
        stat: &mut CrawlStat,
    ) -> anyhow::Result<()> {
        let score = prefilter_score(item.title(), item.url());

        let mut candidate = CrawlCandidate::new(
            run_id,
            &job.municipality_key,
            source,
            item.discovery_path(),
            item.title(),
            item.url(),
        );
        candidate.date_hint = item.date_hint();
        candidate.doc_urls = item.documents().to_vec();
        candidate.prefilter_score = score;

        let db_started = Instant::now();
        let candidate_id = self.repo.upsert_candidate(&candidate).await?;

        if should_extract(score, job.mode, source) {
            let payload = JobPayload::Extraction(ExtractionJob {
                candidate_id: candidate_id.clone(),
                run_id: run_id.to_string(),
                region: job.region.clone(),
                source: source.job_str().to_string(),
                municipality_key: job.municipality_key.clone(),
                mode: job.mode,
            });
            self.queue.enqueue(&payload).await?;
            self.repo
                .update_candidate_status(&candidate_id, CandidateStatus::Enqueued, None)
                .await?;
        } else {
            let reason = format!("prefilter_score {score:.2} below threshold");
            self.repo
                .update_candidate_status(
                    &candidate_id,
                    CandidateStatus::Skipped,
                    Some(reason.as_str()),
                )
                .await?;
        }
        stat.timings.db_write_ms += db_started.elapsed().as_millis() as u64;
        Ok(())
    }
}
