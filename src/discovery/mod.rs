//! Site discovery: locate RIS, gazette and announcement URLs for a
//! municipality.
//!
//! Two strategies, tried in order and merged: harvesting links from the
//! official website, then expanding URL templates from the municipality
//! name. The first candidate that answers 200 and carries a recognisable
//! marker is selected; every call returns diagnostics either way.

pub mod patterns;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{is_ris_page, FetchError, HttpContext};
use crate::text::html;
use patterns::*;

/// How a seed URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    SiteDriven,
    PatternGuessing,
    #[default]
    Unknown,
}

/// Outcome category of a discovery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Found,
    FoundButEmpty,
    NoSeedUrl,
    #[serde(rename = "ALL_URLS_404")]
    AllUrls404,
    SslBlocked,
    NoMarkersFound,
}

/// Diagnostics attached to every discovery call and stats row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDiagnostics {
    pub method: DiscoveryMethod,
    /// At most ten attempted URLs are retained.
    pub attempted_urls: Vec<String>,
    /// Failed URL -> truncated reason.
    pub failed_urls: BTreeMap<String, String>,
    pub reason_code: Option<ReasonCode>,
}

impl DiscoveryDiagnostics {
    fn record_attempts<'a>(&mut self, urls: impl Iterator<Item = &'a String>) {
        for url in urls {
            if self.attempted_urls.len() >= 10 {
                break;
            }
            self.attempted_urls.push(url.clone());
        }
    }

    fn record_failure(&mut self, url: &str, error: &FetchError) {
        let mut message = error.to_string();
        message.truncate(200);
        self.failed_urls.insert(url.to_string(), message);
    }

    fn finish_unfound(&mut self, had_candidates: bool) {
        self.reason_code = Some(if !had_candidates {
            ReasonCode::NoSeedUrl
        } else if self
            .failed_urls
            .values()
            .any(|v| v.to_lowercase().contains("ssl"))
        {
            ReasonCode::SslBlocked
        } else if !self.failed_urls.is_empty()
            && self.failed_urls.values().all(|v| v.contains("404"))
        {
            ReasonCode::AllUrls404
        } else {
            ReasonCode::NoMarkersFound
        });
    }
}

/// Links harvested from an official municipal website, ranked best first.
#[derive(Debug, Clone, Default)]
pub struct SiteLinks {
    pub ris_urls: Vec<String>,
    pub gazette_urls: Vec<String>,
    pub bekanntmachung_urls: Vec<String>,
}

/// Harvest RIS/gazette/announcement links from the official website.
///
/// Fetches the homepage plus a small set of navigational pages, classifies
/// every anchor. RIS links may point off-domain (installations commonly
/// live on vendor domains); gazette links must stay on the municipal
/// domain.
pub async fn discover_site_links(
    ctx: &HttpContext,
    official_url: &str,
    max_pages: usize,
) -> SiteLinks {
    let mut links = SiteLinks::default();
    if !official_url.starts_with("http") {
        warn!(official_url, "invalid official website URL");
        return links;
    }
    let base_url = official_url.trim_end_matches('/').to_string();

    let mut ris: HashSet<String> = HashSet::new();
    let mut gazette: HashSet<String> = HashSet::new();
    let mut bekanntmachung: HashSet<String> = HashSet::new();

    // The navigational pages are independent; fetch them concurrently.
    // The politeness limiter still spaces the actual requests.
    let page_urls: Vec<String> = DISCOVERY_PAGES
        .iter()
        .take(max_pages)
        .map(|path| format!("{base_url}{path}"))
        .collect();
    let pages_fetched = page_urls.len();
    let bodies =
        futures::future::join_all(page_urls.iter().map(|page_url| ctx.fetch_text(page_url)))
            .await;

    for (page_url, body) in page_urls.iter().zip(bodies) {
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                debug!(url = %page_url, error = %e, "discovery page unavailable");
                continue;
            }
        };

        for (href, anchor_text) in html::extract_anchors(&body) {
            let Some(absolute) = absolutize(&href, page_url) else {
                continue;
            };
            let url_lower = absolute.to_lowercase();
            let text_lower = anchor_text.to_lowercase();
            let same_domain = is_same_domain(&absolute, &base_url);

            let is_ris = RIS_DOMAIN_PATTERNS.iter().any(|p| p.is_match(&url_lower))
                || RIS_PATH_PATTERNS.iter().any(|p| p.is_match(&url_lower))
                || ["ratsinfo", "sessionnet", "allris", "sitzung", "gremium"]
                    .iter()
                    .any(|t| text_lower.contains(t));
            if is_ris {
                ris.insert(absolute.clone());
            }

            let is_gazette = GAZETTE_PATH_PATTERNS.iter().any(|p| p.is_match(&url_lower))
                || ["amtsblatt", "amtliche bekanntmachung"]
                    .iter()
                    .any(|t| text_lower.contains(t));
            if is_gazette && same_domain {
                gazette.insert(absolute.clone());
            }

            let is_bekanntmachung = ["bekanntmach", "veroeffentlich", "auslegung"]
                .iter()
                .any(|t| url_lower.contains(t))
                || ["bekanntmachung", "veröffentlichung", "öffentliche auslegung"]
                    .iter()
                    .any(|t| text_lower.contains(t));
            if is_bekanntmachung && same_domain && !gazette.contains(&absolute) {
                bekanntmachung.insert(absolute);
            }
        }
    }

    links.ris_urls = ranked(ris, rank_ris_url);
    links.gazette_urls = ranked(gazette, rank_gazette_url);
    links.bekanntmachung_urls = ranked(bekanntmachung, rank_gazette_url);

    info!(
        base = %base_url,
        ris = links.ris_urls.len(),
        gazette = links.gazette_urls.len(),
        bekanntmachung = links.bekanntmachung_urls.len(),
        pages = pages_fetched,
        "site-driven discovery finished"
    );
    links
}

/// Locate the RIS for a municipality. Returns the selected root (if any)
/// plus diagnostics.
pub async fn discover_ris(
    ctx: &HttpContext,
    municipality_name: &str,
    base_url: Option<&str>,
    official_website: Option<&str>,
) -> (Option<String>, DiscoveryDiagnostics) {
    let mut diagnostics = DiscoveryDiagnostics::default();
    let mut candidates: Vec<String> = Vec::new();

    if let Some(official) = official_website {
        let links = discover_site_links(ctx, official, 10).await;
        if !links.ris_urls.is_empty() {
            diagnostics.method = DiscoveryMethod::SiteDriven;
            diagnostics.record_attempts(links.ris_urls.iter());
            candidates.extend(links.ris_urls);
        }
    }

    if candidates.is_empty() {
        let guesses = ris_url_guesses(municipality_name, base_url);
        diagnostics.method = DiscoveryMethod::PatternGuessing;
        diagnostics.record_attempts(guesses.iter());
        candidates.extend(guesses);
    }

    const RIS_ENTRY_POINTS: &[&str] = &["", "/si0100.asp", "/si0100.php", "/index.php"];
    for candidate in &candidates {
        for entry_point in RIS_ENTRY_POINTS {
            let test_url = format!("{}{}", candidate.trim_end_matches('/'), entry_point);
            match ctx.fetch_ris(&test_url).await {
                Ok(response) if response.status == 200 && is_ris_page(&response.text()) => {
                    info!(url = %test_url, method = ?diagnostics.method, "found RIS");
                    diagnostics.reason_code = Some(ReasonCode::Found);
                    return (Some(test_url), diagnostics);
                }
                Ok(_) => {}
                Err(e) => {
                    diagnostics.record_failure(&test_url, &e);
                    debug!(url = %test_url, error = %e, "RIS probe failed");
                }
            }
        }
    }

    diagnostics.finish_unfound(!candidates.is_empty());
    (None, diagnostics)
}

/// Locate the gazette for a municipality.
pub async fn discover_gazette(
    ctx: &HttpContext,
    municipality_name: &str,
    base_url: Option<&str>,
    official_website: Option<&str>,
) -> (Option<String>, DiscoveryDiagnostics) {
    let mut diagnostics = DiscoveryDiagnostics::default();
    let mut candidates: Vec<String> = Vec::new();

    if let Some(official) = official_website {
        let links = discover_site_links(ctx, official, 10).await;
        let harvested: Vec<String> = links
            .gazette_urls
            .into_iter()
            .chain(links.bekanntmachung_urls)
            .collect();
        if !harvested.is_empty() {
            diagnostics.method = DiscoveryMethod::SiteDriven;
            diagnostics.record_attempts(harvested.iter());
            candidates.extend(harvested);
        }
    }

    if candidates.is_empty() {
        let guesses = gazette_url_guesses(municipality_name, base_url);
        diagnostics.method = DiscoveryMethod::PatternGuessing;
        diagnostics.record_attempts(guesses.iter());
        candidates.extend(guesses);
    }

    const GAZETTE_MARKERS: &[&str] = &[
        "amtsblatt",
        "bekanntmachung",
        "veröffentlichung",
        "veroeffentlichung",
        "ausgabe",
    ];
    for candidate in &candidates {
        match ctx.fetch(candidate).await {
            Ok(response) if response.status == 200 => {
                let lowered = response.text().to_lowercase();
                if GAZETTE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    info!(url = %candidate, method = ?diagnostics.method, "found gazette");
                    diagnostics.reason_code = Some(ReasonCode::Found);
                    return (Some(candidate.clone()), diagnostics);
                }
            }
            Ok(_) => {}
            Err(e) => {
                diagnostics.record_failure(candidate, &e);
                debug!(url = %candidate, error = %e, "gazette probe failed");
            }
        }
    }

    diagnostics.finish_unfound(!candidates.is_empty());
    (None, diagnostics)
}

/// Resolve a possibly relative href against its page URL.
pub fn absolutize(href: &str, page_url: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(page_url).ok()?;
    let joined = base.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Whether two URLs share a host.
pub fn is_same_domain(a: &str, b: &str) -> bool {
    let host = |u: &str| {
        Url::parse(u)
            .ok()
            .and_then(|p| p.host_str().map(|h| h.to_lowercase()))
    };
    match (host(a), host(b)) {
        (Some(ha), Some(hb)) => ha == hb,
        _ => false,
    }
}

fn ranked(urls: HashSet<String>, rank: fn(&str) -> i32) -> Vec<String> {
    let mut list: Vec<String> = urls.into_iter().collect();
    list.sort_by(|a, b| rank(b).cmp(&rank(a)).then_with(|| a.cmp(b)));
    list
}

fn rank_ris_url(url: &str) -> i32 {
    let lowered = url.to_lowercase();
    let mut score = 0;
    if lowered.contains("allris") || lowered.contains("sessionnet") {
        score += 10;
    }
    if lowered.contains("si0100") || lowered.contains("ris") {
        score += 5;
    }
    score
}

fn rank_gazette_url(url: &str) -> i32 {
    let lowered = url.to_lowercase();
    let mut score = 0;
    if lowered.contains("amtsblatt") {
        score += 10;
    }
    if lowered.contains("bekanntmachung") {
        score += 5;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolutize_relative_and_absolute() {
        assert_eq!(
            absolutize("/ris/si0100.asp", "https://www.stadt.de/politik"),
            Some("https://www.stadt.de/ris/si0100.asp".to_string())
        );
        assert_eq!(
            absolutize("https://allris.stadt.de/", "https://www.stadt.de/"),
            Some("https://allris.stadt.de/".to_string())
        );
        assert_eq!(absolutize("mailto:rat@stadt.de", "https://www.stadt.de/"), None);
    }

    #[test]
    fn same_domain_check() {
        assert!(is_same_domain(
            "https://www.stadt.de/a",
            "https://www.stadt.de/b"
        ));
        assert!(!is_same_domain(
            "https://allris.stadt.de/",
            "https://www.stadt.de/"
        ));
    }

    #[test]
    fn ris_ranking_prefers_vendor_urls() {
        let urls: HashSet<String> = [
            "https://www.stadt.de/politik".to_string(),
            "https://stadt.allris.de/si0100.asp".to_string(),
        ]
        .into_iter()
        .collect();
        let ranked = ranked(urls, rank_ris_url);
        assert_eq!(ranked[0], "https://stadt.allris.de/si0100.asp");
    }

    #[test]
    fn unfound_reason_codes() {
        let mut empty = DiscoveryDiagnostics::default();
        empty.finish_unfound(false);
        assert_eq!(empty.reason_code, Some(ReasonCode::NoSeedUrl));

        let mut all_404 = DiscoveryDiagnostics::default();
        all_404
            .failed_urls
            .insert("https://x.de".into(), "HTTP 404 for https://x.de".into());
        all_404.finish_unfound(true);
        assert_eq!(all_404.reason_code, Some(ReasonCode::AllUrls404));

        let mut ssl = DiscoveryDiagnostics::default();
        ssl.failed_urls
            .insert("https://y.de".into(), "SSL error for https://y.de: bad chain".into());
        ssl.finish_unfound(true);
        assert_eq!(ssl.reason_code, Some(ReasonCode::SslBlocked));

        let mut nothing = DiscoveryDiagnostics::default();
        nothing.finish_unfound(true);
        assert_eq!(nothing.reason_code, Some(ReasonCode::NoMarkersFound));
    }

    #[test]
    fn attempted_urls_are_capped() {
        let mut diagnostics = DiscoveryDiagnostics::default();
        let urls: Vec<String> = (0..20).map(|i| format!("https://x.de/{i}")).collect();
        diagnostics.record_attempts(urls.iter());
        assert_eq!(diagnostics.attempted_urls.len(), 10);
    }

    #[test]
    fn diagnostics_serialize_with_screaming_reason() {
        let mut diagnostics = DiscoveryDiagnostics::default();
        diagnostics.reason_code = Some(ReasonCode::Found);
        let json = serde_json::to_string(&diagnostics).unwrap();
        assert!(json.contains("\"FOUND\""));
        assert!(json.contains("\"unknown\""));
    }
}
