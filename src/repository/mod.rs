//! Persistence contract.
//!
//! The relational backend is an external collaborator; the pipeline talks
//! to it through [`Repository`]. The in-memory implementation backs tests
//! and single-process runs and documents the expected upsert semantics.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    CandidateStatus, CrawlCandidate, CrawlStat, DocumentRecord, Municipality, Procedure,
    ProjectEntity, ProjectLink, SourceRecord,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Everything the extraction worker persists for one accepted candidate.
/// Implementations must commit the whole bundle in one transaction: a
/// reader observing the candidate as DONE sees all linked rows.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub candidate_id: String,
    pub procedure: Procedure,
    pub source: SourceRecord,
    pub documents: Vec<DocumentRecord>,
    pub project: ProjectEntity,
    pub link: ProjectLink,
}

/// Backend-agnostic persistence operations of the pipeline.
///
/// Upserts are keyed on stable ids; candidate upserts are additionally
/// keyed on (municipality, URL, source) so re-running a discovery job never
/// creates duplicate rows.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_municipality(&self, key: &str)
        -> Result<Option<Municipality>, RepositoryError>;

    /// Municipalities due for a crawl: no stats row yet, or the latest row
    /// older than the rescan interval. Never-crawled first, then oldest.
    async fn due_municipalities(
        &self,
        rescan_interval: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<Municipality>, RepositoryError>;

    /// Insert a candidate, or return the id of the existing row with the
    /// same (municipality, URL, discovery source).
    async fn upsert_candidate(
        &self,
        candidate: &CrawlCandidate,
    ) -> Result<String, RepositoryError>;

    async fn get_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CrawlCandidate>, RepositoryError>;

    async fn update_candidate_status(
        &self,
        candidate_id: &str,
        status: CandidateStatus,
        reason: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Audit row for a rejected or accepted retrieval.
    async fn insert_source(&self, source: &SourceRecord) -> Result<(), RepositoryError>;

    /// The procedure previously produced from a candidate, for idempotent
    /// re-extraction.
    async fn procedure_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<Procedure>, RepositoryError>;

    async fn projects_for_municipality(
        &self,
        municipality_key: &str,
    ) -> Result<Vec<ProjectEntity>, RepositoryError>;

    async fn procedures_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Procedure>, RepositoryError>;

    /// Commit procedure + source + documents + project + link and flip the
    /// candidate to DONE, atomically.
    async fn persist_extraction(
        &self,
        outcome: &ExtractionOutcome,
    ) -> Result<(), RepositoryError>;

    async fn insert_crawl_stats(&self, stat: &CrawlStat) -> Result<(), RepositoryError>;

    /// All stats rows of one run for one municipality (any source order).
    async fn stats_for_run(
        &self,
        municipality_key: &str,
        run_id: &str,
    ) -> Result<Vec<CrawlStat>, RepositoryError>;
}
