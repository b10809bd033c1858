//! Crawl candidates produced by discovery.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which source family a candidate was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoverySource {
    Ris,
    Gazette,
    MunicipalWebsite,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ris => "RIS",
            Self::Gazette => "GAZETTE",
            Self::MunicipalWebsite => "MUNICIPAL_WEBSITE",
        }
    }

    /// Parse the queue-payload spelling (`ris`, `gazette`, `municipal_website`)
    /// as well as the stored spelling.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ris" | "sessionnet" => Some(Self::Ris),
            "gazette" | "amtsblatt" => Some(Self::Gazette),
            "municipal_website" => Some(Self::MunicipalWebsite),
            _ => None,
        }
    }

    /// Queue-payload spelling.
    pub fn job_str(&self) -> &'static str {
        match self {
            Self::Ris => "ris",
            Self::Gazette => "gazette",
            Self::MunicipalWebsite => "municipal_website",
        }
    }
}

/// Candidate lifecycle. Terminal states are `Skipped`, `Done`, `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    New,
    Enqueued,
    Skipped,
    Done,
    Error,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Enqueued => "ENQUEUED",
            Self::Skipped => "SKIPPED",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Done | Self::Error)
    }
}

/// A listing item emitted by discovery, awaiting (or past) extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlCandidate {
    pub candidate_id: String,
    pub run_id: String,
    pub municipality_key: String,
    pub discovery_source: DiscoverySource,
    /// URL of the page that yielded this item.
    pub discovery_path: String,
    pub title: String,
    /// Date gleaned from the listing, if any.
    pub date_hint: Option<NaiveDate>,
    /// Canonical URL of the item itself.
    pub url: String,
    /// Attachment URLs known at discovery time.
    pub doc_urls: Vec<String>,
    /// Cheap title/URL relevance score in [0, 1].
    pub prefilter_score: f64,
    pub status: CandidateStatus,
    /// Skip/error reason; non-null whenever status is terminal and not DONE.
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlCandidate {
    pub fn new(
        run_id: &str,
        municipality_key: &str,
        discovery_source: DiscoverySource,
        discovery_path: &str,
        title: &str,
        url: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            candidate_id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            municipality_key: municipality_key.to_string(),
            discovery_source,
            discovery_path: discovery_path.to_string(),
            title: title.to_string(),
            date_hint: None,
            url: url.to_string(),
            doc_urls: Vec::new(),
            prefilter_score: 0.0,
            status: CandidateStatus::New,
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trip() {
        assert_eq!(DiscoverySource::from_str("ris"), Some(DiscoverySource::Ris));
        assert_eq!(
            DiscoverySource::from_str("amtsblatt"),
            Some(DiscoverySource::Gazette)
        );
        assert_eq!(
            DiscoverySource::from_str("MUNICIPAL_WEBSITE"),
            Some(DiscoverySource::MunicipalWebsite)
        );
        assert_eq!(DiscoverySource::Ris.job_str(), "ris");
    }

    #[test]
    fn terminal_states() {
        assert!(CandidateStatus::Skipped.is_terminal());
        assert!(CandidateStatus::Done.is_terminal());
        assert!(CandidateStatus::Error.is_terminal());
        assert!(!CandidateStatus::New.is_terminal());
        assert!(!CandidateStatus::Enqueued.is_terminal());
    }
}
