//! Source crawlers: RIS, gazette and municipal website.
//!
//! Crawlers are finite producers: they push raw listing items into a
//! channel sink until exhausted and return a summary with the discovery
//! diagnostics. Per-URL failures are logged and swallowed; whether the
//! crawl as a whole failed is visible in the diagnostics.

pub mod gazette;
pub mod ris;
pub mod website;

pub use gazette::GazetteCrawler;
pub use ris::RisCrawler;
pub use website::WebsiteCrawler;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::discovery::DiscoveryDiagnostics;
use crate::models::DiscoverySource;

/// What kind of page a gazette candidate points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazetteItemKind {
    /// A PDF (or similar) document inside an issue.
    Document,
    /// The issue page itself, emitted when it has no document links.
    Issue,
}

/// What kind of page a website candidate points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteItemKind {
    /// A directly linked document.
    Document,
    /// An internal procedure page.
    ProcedurePage,
}

/// One raw listing item, typed by its discovery source. Fields the model
/// does not know about travel in the side map.
#[derive(Debug, Clone)]
pub enum RawItem {
    Ris {
        url: String,
        title: String,
        session_date: Option<NaiveDate>,
        discovery_path: String,
        documents: Vec<String>,
        extra: BTreeMap<String, String>,
    },
    Gazette {
        url: String,
        title: String,
        issue_date: Option<NaiveDate>,
        discovery_path: String,
        kind: GazetteItemKind,
        extra: BTreeMap<String, String>,
    },
    Website {
        url: String,
        title: String,
        discovery_path: String,
        kind: WebsiteItemKind,
        extra: BTreeMap<String, String>,
    },
}

impl RawItem {
    pub fn source(&self) -> DiscoverySource {
        match self {
            Self::Ris { .. } => DiscoverySource::Ris,
            Self::Gazette { .. } => DiscoverySource::Gazette,
            Self::Website { .. } => DiscoverySource::MunicipalWebsite,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Ris { url, .. } | Self::Gazette { url, .. } | Self::Website { url, .. } => url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Ris { title, .. }
            | Self::Gazette { title, .. }
            | Self::Website { title, .. } => title,
        }
    }

    pub fn discovery_path(&self) -> &str {
        match self {
            Self::Ris { discovery_path, .. }
            | Self::Gazette { discovery_path, .. }
            | Self::Website { discovery_path, .. } => discovery_path,
        }
    }

    pub fn date_hint(&self) -> Option<NaiveDate> {
        match self {
            Self::Ris { session_date, .. } => *session_date,
            Self::Gazette { issue_date, .. } => *issue_date,
            Self::Website { .. } => None,
        }
    }

    pub fn documents(&self) -> &[String] {
        match self {
            Self::Ris { documents, .. } => documents,
            _ => &[],
        }
    }
}

/// What a crawl produced besides the items themselves.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub diagnostics: DiscoveryDiagnostics,
    pub pages_fetched: u64,
}

/// Parse a session or issue date out of visible text. Three formats are
/// recognised: DD.MM.YYYY, DD-MM-YYYY and YYYY-MM-DD.
pub(crate) fn parse_date_in_text(text: &str) -> Option<NaiveDate> {
    use std::sync::LazyLock;
    static PATTERNS: LazyLock<Vec<(regex::Regex, bool)>> = LazyLock::new(|| {
        vec![
            (regex::Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").unwrap(), false),
            (regex::Regex::new(r"(\d{1,2})-(\d{1,2})-(\d{4})").unwrap(), false),
            (regex::Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap(), true),
        ]
    });

    for (pattern, year_first) in PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            let (year, month, day) = if *year_first {
                (&captures[1], &captures[2], &captures[3])
            } else {
                (&captures[3], &captures[2], &captures[1])
            };
            let parsed = NaiveDate::from_ymd_opt(
                year.parse().ok()?,
                month.parse().ok()?,
                day.parse().ok()?,
            );
            if parsed.is_some() {
                return parsed;
            }
        }
    }
    None
}

/// Whether a URL points at a downloadable document.
pub(crate) fn is_document_url(url: &str) -> bool {
    let lowered = url.to_lowercase();
    let path = lowered.split(['?', '#']).next().unwrap_or("");
    [".pdf", ".doc", ".docx"].iter().any(|ext| path.ends_with(ext))
}
