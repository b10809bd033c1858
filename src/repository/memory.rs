//! In-memory repository backend.
//!
//! Backs tests and single-process runs; the upsert behaviour mirrors what
//! the relational backend guarantees.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ExtractionOutcome, Repository, RepositoryError};
use crate::models::{
    CandidateStatus, CrawlCandidate, CrawlStat, DiscoverySource, DocumentRecord, Municipality,
    Procedure, ProjectEntity, ProjectLink, SourceRecord,
};

#[derive(Default)]
struct State {
    municipalities: Vec<Municipality>,
    candidates: HashMap<String, CrawlCandidate>,
    /// (municipality, url, source) -> candidate id.
    candidate_keys: HashMap<(String, String, DiscoverySource), String>,
    procedures: HashMap<String, Procedure>,
    procedure_by_candidate: HashMap<String, String>,
    sources: Vec<SourceRecord>,
    documents: HashMap<String, DocumentRecord>,
    projects: HashMap<String, ProjectEntity>,
    /// procedure id -> link (a procedure belongs to at most one project).
    links: HashMap<String, ProjectLink>,
    stats: Vec<CrawlStat>,
}

/// Repository kept entirely in process memory.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a municipality row (normally done by the external loader).
    pub async fn seed_municipality(&self, municipality: Municipality) {
        self.state.write().await.municipalities.push(municipality);
    }

    /// All stored source rows, for assertions.
    pub async fn sources(&self) -> Vec<SourceRecord> {
        self.state.read().await.sources.clone()
    }

    /// All stored documents, for assertions.
    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.state.read().await.documents.values().cloned().collect()
    }

    /// The link of one procedure, for assertions.
    pub async fn link_for_procedure(&self, procedure_id: &str) -> Option<ProjectLink> {
        self.state.read().await.links.get(procedure_id).cloned()
    }

    pub async fn candidate_count(&self) -> usize {
        self.state.read().await.candidates.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_municipality(
        &self,
        key: &str,
    ) -> Result<Option<Municipality>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .municipalities
            .iter()
            .find(|m| m.municipality_key == key)
            .cloned())
    }

    async fn due_municipalities(
        &self,
        rescan_interval: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<Municipality>, RepositoryError> {
        let state = self.state.read().await;
        let cutoff = Utc::now() - rescan_interval;

        let mut due: Vec<(Option<chrono::DateTime<Utc>>, Municipality)> = state
            .municipalities
            .iter()
            .filter_map(|m| {
                let last_crawled = state
                    .stats
                    .iter()
                    .filter(|s| s.municipality_key == m.municipality_key)
                    .map(|s| s.created_at)
                    .max();
                match last_crawled {
                    None => Some((None, m.clone())),
                    Some(at) if at < cutoff => Some((Some(at), m.clone())),
                    Some(_) => None,
                }
            })
            .collect();

        // Never crawled first, then oldest.
        due.sort_by_key(|(at, m)| (at.is_some(), *at, m.municipality_key.clone()));
        Ok(due.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    async fn upsert_candidate(
        &self,
        candidate: &CrawlCandidate,
    ) -> Result<String, RepositoryError> {
        let mut state = self.state.write().await;
        let key = (
            candidate.municipality_key.clone(),
            candidate.url.clone(),
            candidate.discovery_source,
        );
        if let Some(existing_id) = state.candidate_keys.get(&key) {
            return Ok(existing_id.clone());
        }
        let id = candidate.candidate_id.clone();
        state.candidate_keys.insert(key, id.clone());
        state.candidates.insert(id.clone(), candidate.clone());
        Ok(id)
    }

    async fn get_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CrawlCandidate>, RepositoryError> {
        Ok(self.state.read().await.candidates.get(candidate_id).cloned())
    }

    async fn update_candidate_status(
        &self,
        candidate_id: &str,
        status: CandidateStatus,
        reason: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let candidate = state
            .candidates
            .get_mut(candidate_id)
            .ok_or_else(|| RepositoryError::NotFound(candidate_id.to_string()))?;
        candidate.status = status;
        candidate.reason = reason.map(|r| r.to_string());
        candidate.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_source(&self, source: &SourceRecord) -> Result<(), RepositoryError> {
        self.state.write().await.sources.push(source.clone());
        Ok(())
    }

    async fn procedure_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Option<Procedure>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .procedure_by_candidate
            .get(candidate_id)
            .and_then(|pid| state.procedures.get(pid))
            .cloned())
    }

    async fn projects_for_municipality(
        &self,
        municipality_key: &str,
    ) -> Result<Vec<ProjectEntity>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .projects
            .values()
            .filter(|p| p.municipality_key == municipality_key)
            .cloned()
            .collect())
    }

    async fn procedures_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Procedure>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .links
            .values()
            .filter(|l| l.project_id == project_id)
            .filter_map(|l| state.procedures.get(&l.procedure_id))
            .cloned()
            .collect())
    }

    async fn persist_extraction(
        &self,
        outcome: &ExtractionOutcome,
    ) -> Result<(), RepositoryError> {
        // One write lock over the whole bundle stands in for the backend
        // transaction: DONE is never observable without the linked rows.
        let mut state = self.state.write().await;

        let candidate = state
            .candidates
            .get_mut(&outcome.candidate_id)
            .ok_or_else(|| RepositoryError::NotFound(outcome.candidate_id.clone()))?;
        candidate.status = CandidateStatus::Done;
        candidate.reason = None;
        candidate.updated_at = Utc::now();

        state
            .procedures
            .insert(outcome.procedure.procedure_id.clone(), outcome.procedure.clone());
        state
            .procedure_by_candidate
            .insert(outcome.candidate_id.clone(), outcome.procedure.procedure_id.clone());
        state.sources.push(outcome.source.clone());
        for document in &outcome.documents {
            state
                .documents
                .insert(document.sha256.clone(), document.clone());
        }
        state
            .projects
            .insert(outcome.project.project_id.clone(), outcome.project.clone());
        state
            .links
            .insert(outcome.link.procedure_id.clone(), outcome.link.clone());
        Ok(())
    }

    async fn insert_crawl_stats(&self, stat: &CrawlStat) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        // Composite unique on (run_id, job_id).
        if state
            .stats
            .iter()
            .any(|s| s.run_id == stat.run_id && s.job_id == stat.job_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "stats row for run {} job {} already exists",
                stat.run_id, stat.job_id
            )));
        }
        state.stats.push(stat.clone());
        Ok(())
    }

    async fn stats_for_run(
        &self,
        municipality_key: &str,
        run_id: &str,
    ) -> Result<Vec<CrawlStat>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .stats
            .iter()
            .filter(|s| s.municipality_key == municipality_key && s.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkReason;

    fn candidate(municipality: &str, url: &str) -> CrawlCandidate {
        CrawlCandidate::new(
            "run-1",
            municipality,
            DiscoverySource::Ris,
            "https://ris.example.org/list",
            "TOP 5: Batteriespeicher",
            url,
        )
    }

    #[tokio::test]
    async fn candidate_upsert_is_idempotent() {
        let repo = MemoryRepository::new();
        let first = candidate("12345", "https://ris.example.org/item/1");
        let second = candidate("12345", "https://ris.example.org/item/1");

        let id1 = repo.upsert_candidate(&first).await.unwrap();
        let id2 = repo.upsert_candidate(&second).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(repo.candidate_count().await, 1);
    }

    #[tokio::test]
    async fn status_updates_track_reason() {
        let repo = MemoryRepository::new();
        let c = candidate("12345", "https://ris.example.org/item/2");
        let id = repo.upsert_candidate(&c).await.unwrap();

        repo.update_candidate_status(&id, CandidateStatus::Skipped, Some("SKIP_CONTAINER"))
            .await
            .unwrap();
        let stored = repo.get_candidate(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, CandidateStatus::Skipped);
        assert_eq!(stored.reason.as_deref(), Some("SKIP_CONTAINER"));
    }

    #[tokio::test]
    async fn persist_extraction_is_atomic_and_visible() {
        let repo = MemoryRepository::new();
        let c = candidate("12345", "https://ris.example.org/item/3");
        let candidate_id = repo.upsert_candidate(&c).await.unwrap();

        let procedure = Procedure::new("Batteriespeicher B-Plan 5", "BB", "12345");
        let project = ProjectEntity::new("BB", "12345");
        let source = SourceRecord::new(
            &c.url,
            200,
            DiscoverySource::Ris,
            &c.discovery_path,
        )
        .for_procedure(&procedure.procedure_id);
        let link = ProjectLink {
            project_id: project.project_id.clone(),
            procedure_id: procedure.procedure_id.clone(),
            link_confidence: 1.0,
            link_reason: LinkReason::NewProject,
        };
        let outcome = ExtractionOutcome {
            candidate_id: candidate_id.clone(),
            procedure: procedure.clone(),
            source,
            documents: vec![DocumentRecord::new("s", "https://x/d.pdf", "pdf", b"doc")],
            project: project.clone(),
            link,
        };

        repo.persist_extraction(&outcome).await.unwrap();

        let stored = repo.get_candidate(&candidate_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CandidateStatus::Done);
        let found = repo.procedure_for_candidate(&candidate_id).await.unwrap();
        assert_eq!(
            found.map(|p| p.procedure_id),
            Some(procedure.procedure_id.clone())
        );
        let projects = repo.projects_for_municipality("12345").await.unwrap();
        assert_eq!(projects.len(), 1);
        let linked = repo.procedures_for_project(&project.project_id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert!(repo.link_for_procedure(&procedure.procedure_id).await.is_some());
    }

    #[tokio::test]
    async fn due_municipalities_prefers_never_crawled() {
        let repo = MemoryRepository::new();
        repo.seed_municipality(Municipality::new("1", "Altdorf", "LK", "BB"))
            .await;
        repo.seed_municipality(Municipality::new("2", "Neudorf", "LK", "BB"))
            .await;

        // Municipality 1 was crawled long ago.
        let mut stat = CrawlStat::new("run-0", "job-0", "1", DiscoverySource::Ris);
        stat.created_at = Utc::now() - chrono::Duration::days(30);
        repo.insert_crawl_stats(&stat).await.unwrap();

        let due = repo
            .due_municipalities(chrono::Duration::days(7), 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].municipality_key, "2"); // never crawled first
        assert_eq!(due[1].municipality_key, "1");
    }

    #[tokio::test]
    async fn recently_crawled_is_not_due() {
        let repo = MemoryRepository::new();
        repo.seed_municipality(Municipality::new("1", "Altdorf", "LK", "BB"))
            .await;
        let stat = CrawlStat::new("run-0", "job-0", "1", DiscoverySource::Ris);
        repo.insert_crawl_stats(&stat).await.unwrap();

        let due = repo
            .due_municipalities(chrono::Duration::days(7), 10)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn duplicate_stats_rows_conflict() {
        let repo = MemoryRepository::new();
        let stat = CrawlStat::new("run-1", "job-1", "1", DiscoverySource::Gazette);
        repo.insert_crawl_stats(&stat).await.unwrap();
        assert!(repo.insert_crawl_stats(&stat).await.is_err());
    }
}
