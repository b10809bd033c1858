//! Queue payloads.
//!
//! A single shared queue carries both job kinds; the discriminator is the
//! presence of `candidate_id` (extraction) versus its absence (discovery).

use serde::{Deserialize, Serialize};

use crate::config::CrawlMode;

/// Discovery job: run one source crawler for one municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub region: String,
    /// Source spelling: `ris`, `gazette`, `municipal_website`.
    pub source: String,
    /// Seed URL, when a base is already known.
    pub entrypoint: Option<String>,
    pub municipality_key: String,
    pub municipality_name: String,
    pub county: String,
    pub storage_base_path: String,
    #[serde(default)]
    pub mode: CrawlMode,
}

/// Extraction job: process one candidate end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub candidate_id: String,
    pub run_id: String,
    pub region: String,
    pub source: String,
    pub municipality_key: String,
    #[serde(default)]
    pub mode: CrawlMode,
}

/// Either job kind. Extraction is tried first on deserialization because
/// only extraction payloads carry `candidate_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobPayload {
    Extraction(ExtractionJob),
    Discovery(DiscoveryJob),
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction",
            Self::Discovery(_) => "discovery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminates_by_candidate_id() {
        let extraction = r#"{
            "candidate_id": "c-1",
            "run_id": "r-1",
            "region": "BB",
            "source": "ris",
            "municipality_key": "12345",
            "mode": "fast"
        }"#;
        let payload: JobPayload = serde_json::from_str(extraction).unwrap();
        assert!(matches!(payload, JobPayload::Extraction(_)));

        let discovery = r#"{
            "region": "BB",
            "source": "gazette",
            "entrypoint": null,
            "municipality_key": "12345",
            "municipality_name": "Metzdorf",
            "county": "MOL",
            "storage_base_path": "/data/documents",
            "mode": "deep"
        }"#;
        let payload: JobPayload = serde_json::from_str(discovery).unwrap();
        match payload {
            JobPayload::Discovery(job) => {
                assert_eq!(job.source, "gazette");
                assert!(job.entrypoint.is_none());
                assert_eq!(job.mode, CrawlMode::Deep);
            }
            other => panic!("expected discovery, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let job = JobPayload::Extraction(ExtractionJob {
            candidate_id: "c-2".into(),
            run_id: "r-2".into(),
            region: "BB".into(),
            source: "municipal_website".into(),
            municipality_key: "12000000".into(),
            mode: CrawlMode::Fast,
        });
        let json = serde_json::to_string(&job).unwrap();
        let back: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
