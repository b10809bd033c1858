//! Municipality seed rows.

use serde::{Deserialize, Serialize};

/// A municipality to crawl. Seed rows are created externally and are
/// read-only for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Municipality {
    /// Stable key (AGS/ARS).
    pub municipality_key: String,
    /// Display name, e.g. "Frankfurt (Oder)".
    pub name: String,
    /// County (Landkreis).
    pub county: String,
    /// Region/state code, e.g. "BB".
    pub region: String,
    /// Official website, when known.
    pub official_website: Option<String>,
    /// Known RIS base URL, when known.
    pub ris_url: Option<String>,
    /// Known gazette base URL, when known.
    pub gazette_url: Option<String>,
}

impl Municipality {
    pub fn new(municipality_key: &str, name: &str, county: &str, region: &str) -> Self {
        Self {
            municipality_key: municipality_key.to_string(),
            name: name.to_string(),
            county: county.to_string(),
            region: region.to_string(),
            official_website: None,
            ris_url: None,
            gazette_url: None,
        }
    }

    pub fn with_official_website(mut self, url: &str) -> Self {
        self.official_website = Some(url.to_string());
        self
    }

    pub fn with_ris_url(mut self, url: &str) -> Self {
        self.ris_url = Some(url.to_string());
        self
    }

    pub fn with_gazette_url(mut self, url: &str) -> Self {
        self.gazette_url = Some(url.to_string());
        self
    }
}
