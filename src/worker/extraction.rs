//! Extraction worker: process one candidate to a persisted procedure.
//!
//! Contract: at most one procedure plus its source, documents and project
//! link per job; the candidate never stays in a non-terminal state, and a
//! stats row is written whatever happens.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::classify::{self, keywords, Classification};
use crate::config::{CrawlMode, Settings};
use crate::crawlers::ris::fetch_agenda_item;
use crate::entity::{self, rollup, ProjectSignature};
use crate::extract;
use crate::http::{FetchError, HttpContext};
use crate::models::{
    CandidateStatus, CrawlCandidate, CrawlStat, DiscoverySource, DocumentRecord, ExtractionJob,
    LegalBasis, LinkReason, MaturityStage, Procedure, ProcedureType, ProjectEntity, ProjectLink,
    SourceRecord, SourceStatus,
};
use crate::repository::{ExtractionOutcome, Repository};
use crate::storage::{self, TextCache};
use crate::text::{html, pdf};

/// Attachments processed per candidate.
const MAX_DOCUMENTS: usize = 5;
/// Prefilter score above which large documents are downloaded even in
/// fast mode.
const LARGE_DOWNLOAD_SCORE: f64 = 0.8;

pub struct ExtractionWorker {
    ctx: Arc<HttpContext>,
    repo: Arc<dyn Repository>,
    settings: Arc<Settings>,
    text_cache: TextCache,
}

impl ExtractionWorker {
    pub fn new(
        ctx: Arc<HttpContext>,
        repo: Arc<dyn Repository>,
        settings: Arc<Settings>,
    ) -> Self {
        let text_cache = TextCache::new(&settings.crawl_text_cache_base);
        Self {
            ctx,
            repo,
            settings,
            text_cache,
        }
    }

    /// Process one extraction job. Never returns an error; failures land in
    /// the candidate status and the stats row.
    pub async fn process(&self, job: &ExtractionJob, run_id: &str) {
        let job_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let source =
            DiscoverySource::from_str(&job.source).unwrap_or(DiscoverySource::MunicipalWebsite);
        let mut stat = CrawlStat::new(run_id, &job_id, &job.municipality_key, source);

        match self.run(job, &mut stat).await {
            Ok(()) => {}
            Err(e) => {
                error!(candidate = %job.candidate_id, error = %e, "extraction job failed");
                stat.source_status = status_for(&e);
                let mut message = e.to_string();
                message.truncate(500);
                stat.error_message = Some(message.clone());
                if let Err(status_err) = self
                    .repo
                    .update_candidate_status(
                        &job.candidate_id,
                        CandidateStatus::Error,
                        Some(message.as_str()),
                    )
                    .await
                {
                    warn!(error = %status_err, "failed to mark candidate as errored");
                }
            }
        }

        stat.timings.total_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = self.repo.insert_crawl_stats(&stat).await {
            debug!(error = %e, "stats row not written (possibly a redelivery)");
        }
    }

    async fn run(&self, job: &ExtractionJob, stat: &mut CrawlStat) -> anyhow::Result<()> {
        let Some(candidate) = self.repo.get_candidate(&job.candidate_id).await? else {
            warn!(candidate = %job.candidate_id, "candidate not found");
            return Ok(());
        };
        stat.domain = crate::http::RateLimiter::extract_origin(&candidate.url);

        // Page text.
        let fetch_started = Instant::now();
        let (html_text, http_status) = self.fetch_page(&candidate).await;
        stat.timings.fetch_html_ms = fetch_started.elapsed().as_millis() as u64;
        if http_status == 200 {
            stat.counts.pages_fetched = 1;
        }

        // Attachments: RIS agenda items carry theirs on a detail page.
        let mut doc_urls = candidate.doc_urls.clone();
        if doc_urls.is_empty()
            && candidate.discovery_source == DiscoverySource::Ris
            && has_privileged_agenda_term(&candidate.title)
        {
            let agenda = fetch_agenda_item(&self.ctx, &candidate.url).await;
            doc_urls = agenda.documents;
        }

        let mut all_text = format!("{} {}", candidate.title, html_text);
        let mut documents: Vec<DocumentRecord> = Vec::new();
        self.download_documents(job, &candidate, &doc_urls, &mut all_text, &mut documents, stat)
            .await;

        // Classify on the combined text; absent date hints count as today.
        let classify_started = Instant::now();
        let date = candidate
            .date_hint
            .unwrap_or_else(|| Utc::now().date_naive());
        let classification = classify::classify(&all_text, &candidate.title, Some(date));
        stat.timings.classify_ms = classify_started.elapsed().as_millis() as u64;

        // Container gate. Rejected items keep their source row for audit.
        if let Err(reason) = classify::validate(
            &candidate.title,
            &candidate.url,
            candidate.discovery_source,
            Some(&classification),
            Some(all_text.as_str()),
        ) {
            let source_row = SourceRecord::new(
                &candidate.url,
                http_status,
                candidate.discovery_source,
                &candidate.discovery_path,
            );
            self.repo.insert_source(&source_row).await?;
            self.repo
                .update_candidate_status(
                    &candidate.candidate_id,
                    CandidateStatus::Skipped,
                    Some(reason.as_str()),
                )
                .await?;
            stat.counts.procedures_skipped = 1;
            debug!(candidate = %candidate.candidate_id, reason = reason.as_str(), "candidate skipped");
            return Ok(());
        }

        let procedure =
            self.build_procedure(job, &candidate, &all_text, &classification, date).await?;

        // Entity resolution and rollup.
        let signature = entity::compute_signature(&procedure);
        let (project, link) = self.resolve_project(job, &procedure, &signature).await?;

        let source_row = SourceRecord::new(
            &candidate.url,
            http_status,
            candidate.discovery_source,
            &candidate.discovery_path,
        )
        .for_procedure(&procedure.procedure_id);
        for document in &mut documents {
            document.source_id = source_row.source_id.clone();
        }

        let db_started = Instant::now();
        self.repo
            .persist_extraction(&ExtractionOutcome {
                candidate_id: candidate.candidate_id.clone(),
                procedure: procedure.clone(),
                source: source_row,
                documents,
                project,
                link,
            })
            .await?;
        stat.timings.db_write_ms = db_started.elapsed().as_millis() as u64;
        stat.counts.procedures_saved = 1;

        info!(
            candidate = %candidate.candidate_id,
            procedure = %procedure.procedure_id,
            pdfs = stat.counts.pdfs_downloaded,
            "extraction completed"
        );
        Ok(())
    }

    /// Fetch the candidate page and extract its visible text. Fetch
    /// failures degrade to empty text; the title may still carry the
    /// procedure.
    async fn fetch_page(&self, candidate: &CrawlCandidate) -> (String, u16) {
        let result = if candidate.discovery_source == DiscoverySource::Ris {
            self.ctx.fetch_ris(&candidate.url).await
        } else {
            self.ctx.fetch(&candidate.url).await
        };
        match result {
            Ok(response) => {
                let status = response.status;
                (html::extract_text(&response.text()), status)
            }
            Err(e) => {
                debug!(url = %candidate.url, error = %e, "page fetch failed, continuing with title only");
                (String::new(), 0)
            }
        }
    }

    /// Download up to five attachments through HEAD gate, cache and
    /// progressive text extraction, storing bytes content-addressed.
    async fn download_documents(
        &self,
        job: &ExtractionJob,
        candidate: &CrawlCandidate,
        doc_urls: &[String],
        all_text: &mut String,
        documents: &mut Vec<DocumentRecord>,
        stat: &mut CrawlStat,
    ) {
        let initial_pages = match job.mode {
            CrawlMode::Fast => 3,
            CrawlMode::Deep => 5,
        };

        for doc_url in doc_urls.iter().take(MAX_DOCUMENTS) {
            // HEAD first: skip oversized bodies in fast mode unless the
            // prefilter already flagged the candidate as hot.
            let head_started = Instant::now();
            if job.mode == CrawlMode::Fast && candidate.prefilter_score < LARGE_DOWNLOAD_SCORE {
                if let Ok(head) = self.ctx.head(doc_url).await {
                    if head
                        .content_length()
                        .is_some_and(|len| len > self.settings.pdf_max_size_bytes())
                    {
                        debug!(url = %doc_url, "skipping oversized document in fast mode");
                        stat.counts.pdfs_skipped += 1;
                        continue;
                    }
                }
            }

            let response = match self.ctx.fetch(doc_url).await {
                Ok(response) if response.status == 200 => response,
                Ok(response) => {
                    debug!(url = %doc_url, status = response.status, "document fetch rejected");
                    continue;
                }
                Err(e) => {
                    debug!(url = %doc_url, error = %e, "document fetch failed");
                    continue;
                }
            };
            stat.timings.fetch_pdf_ms += head_started.elapsed().as_millis() as u64;
            stat.counts.pdfs_downloaded += 1;

            let extract_started = Instant::now();
            let extracted = pdf::extract_progressive(
                &response.body,
                initial_pages,
                doc_url,
                Some(&self.text_cache),
            );
            stat.timings.extract_pdf_ms += extract_started.elapsed().as_millis() as u64;

            let text = extracted.map(|p| p.text);
            if let Some(text) = &text {
                all_text.push(' ');
                all_text.push_str(text);
            }

            match storage::save_document(&self.settings.storage_base_path, &response.body) {
                Ok(_) => {
                    let document =
                        DocumentRecord::new("", doc_url, "pdf", &response.body).with_text(text);
                    documents.push(document);
                }
                Err(e) => warn!(url = %doc_url, error = %e, "failed to store document bytes"),
            }
        }
    }

    /// Synthesize the procedure row, reusing the id of a previous run of
    /// the same candidate so re-extraction updates instead of inserting.
    async fn build_procedure(
        &self,
        job: &ExtractionJob,
        candidate: &CrawlCandidate,
        all_text: &str,
        classification: &Classification,
        date: chrono::NaiveDate,
    ) -> anyhow::Result<Procedure> {
        let mut procedure = match self
            .repo
            .procedure_for_candidate(&candidate.candidate_id)
            .await?
        {
            Some(existing) => existing,
            None => Procedure::new(&candidate.title, &job.region, &job.municipality_key),
        };
        procedure.title_raw = candidate.title.clone();
        procedure.title_norm = crate::text::normalize(&candidate.title);
        procedure.updated_at = Utc::now();

        if let Some(municipality) = self.repo.get_municipality(&job.municipality_key).await? {
            procedure.county = Some(municipality.county);
        }

        procedure.capacity_mw = extract::find_capacity_mw(all_text);
        procedure.capacity_mwh = extract::find_capacity_mwh(all_text);
        procedure.area_hectares = extract::find_largest_area(all_text);
        procedure.decision_date = extract::find_decision_date(all_text).or(candidate.date_hint);
        procedure.developer_company = extract::find_developer(all_text);
        procedure.site_location_raw = extract::extract_location(all_text);

        // An untyped but accepted item is stored as UNKNOWN and flagged.
        match classification.procedure_type {
            Some(procedure_type) => {
                procedure.procedure_type = procedure_type;
                procedure.review_recommended = classification.review_recommended;
            }
            None => {
                procedure.procedure_type = ProcedureType::Unknown;
                procedure.review_recommended = true;
            }
        }
        procedure.legal_basis = classification.legal_basis;
        procedure.project_components = classification.project_components;
        procedure.ambiguity_flag = classification.ambiguity_flag;
        procedure.confidence = classification.confidence;
        procedure.bess_score = classify::bess_score(all_text, &candidate.title, Some(date));
        procedure.grid_score = classify::grid_score(all_text);

        // Fast mode keeps evidence only for confident hits.
        procedure.evidence_snippets =
            if job.mode == CrawlMode::Fast && classification.confidence < 0.7 {
                Vec::new()
            } else {
                classification.evidence_snippets.clone()
            };

        Ok(procedure)
    }

    /// Link the procedure into a project: match against the municipality's
    /// existing projects or create a new one, then roll the fields up.
    async fn resolve_project(
        &self,
        job: &ExtractionJob,
        procedure: &Procedure,
        signature: &ProjectSignature,
    ) -> anyhow::Result<(ProjectEntity, ProjectLink)> {
        let projects = self
            .repo
            .projects_for_municipality(&job.municipality_key)
            .await?;

        if let Some((project_id, confidence, reason)) = entity::match_project(signature, &projects)
        {
            let mut project = projects
                .into_iter()
                .find(|p| p.project_id == project_id)
                .expect("matched project is present");
            let mut linked = self.repo.procedures_for_project(&project_id).await?;
            linked.retain(|p| p.procedure_id != procedure.procedure_id);
            linked.push(procedure.clone());
            rollup::recompute(&mut project, &linked, signature);

            let link = ProjectLink {
                project_id,
                procedure_id: procedure.procedure_id.clone(),
                link_confidence: confidence,
                link_reason: reason,
            };
            return Ok((project, link));
        }

        // No match: a fresh project. §36 assents get their own maturity
        // stage and link reason.
        let mut project = ProjectEntity::new(&job.region, &job.municipality_key);
        rollup::recompute(&mut project, std::slice::from_ref(procedure), signature);

        let link = if procedure.procedure_type == ProcedureType::Permit36Einvernehmen {
            project.maturity_stage = project.maturity_stage.max(MaturityStage::Permit36);
            if project.legal_basis_best == LegalBasis::Unknown {
                project.legal_basis_best = LegalBasis::Assent36;
            }
            ProjectLink {
                project_id: project.project_id.clone(),
                procedure_id: procedure.procedure_id.clone(),
                link_confidence: 0.85,
                link_reason: LinkReason::Permit36New,
            }
        } else {
            ProjectLink {
                project_id: project.project_id.clone(),
                procedure_id: procedure.procedure_id.clone(),
                link_confidence: 1.0,
                link_reason: LinkReason::NewProject,
            }
        };
        Ok((project, link))
    }
}

fn has_privileged_agenda_term(title: &str) -> bool {
    let lowered = crate::text::normalize(title);
    keywords::PRIVILEGED_AGENDA_TERMS
        .iter()
        .any(|t| lowered.contains(t))
}

fn status_for(error: &anyhow::Error) -> SourceStatus {
    match error.downcast_ref::<FetchError>() {
        Some(fetch_error) => fetch_error.source_status(),
        None => SourceStatus::ErrorOther,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_agenda_terms() {
        assert!(has_privileged_agenda_term(
            "TOP 3: Einvernehmen nach § 36 BauGB"
        ));
        assert!(has_privileged_agenda_term("Bauantrag Speicheranlage"));
        assert!(!has_privileged_agenda_term("Genehmigung der Niederschrift"));
    }
}
