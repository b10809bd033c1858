//! Crawl statistics: one row per (run, job).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DiscoverySource;
use crate::discovery::DiscoveryDiagnostics;

/// Terminal status of a source crawl, for the per-municipality summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    Success,
    ErrorSsl,
    ErrorNetwork,
    ErrorOther,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::ErrorSsl => "ERROR_SSL",
            Self::ErrorNetwork => "ERROR_NETWORK",
            Self::ErrorOther => "ERROR_OTHER",
        }
    }
}

/// Counters collected over one job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrawlCounts {
    pub pages_fetched: u64,
    pub pdfs_downloaded: u64,
    pub pdfs_skipped: u64,
    pub candidates_found: u64,
    pub procedures_saved: u64,
    pub procedures_skipped: u64,
}

/// Wall-clock milliseconds spent per phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub fetch_html_ms: u64,
    pub fetch_pdf_ms: u64,
    pub extract_pdf_ms: u64,
    pub classify_ms: u64,
    pub db_write_ms: u64,
    pub total_ms: u64,
}

/// One stats row, written at the end of every discovery or extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStat {
    pub run_id: String,
    pub job_id: String,
    pub municipality_key: String,
    pub source: DiscoverySource,
    pub domain: Option<String>,
    pub counts: CrawlCounts,
    pub timings: PhaseTimings,
    pub source_status: SourceStatus,
    pub error_message: Option<String>,
    pub discovery_diagnostics: Option<DiscoveryDiagnostics>,
    pub created_at: DateTime<Utc>,
}

impl CrawlStat {
    pub fn new(
        run_id: &str,
        job_id: &str,
        municipality_key: &str,
        source: DiscoverySource,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            job_id: job_id.to_string(),
            municipality_key: municipality_key.to_string(),
            source,
            domain: None,
            counts: CrawlCounts::default(),
            timings: PhaseTimings::default(),
            source_status: SourceStatus::Success,
            error_message: None,
            discovery_diagnostics: None,
            created_at: Utc::now(),
        }
    }
}
