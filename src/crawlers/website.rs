//! Municipal-website crawler, spider-first.
//!
//! From the homepage, same-origin anchors whose visible text or URL carry a
//! relevant keyword are followed. When the spider yields nothing, a fixed
//! set of known planning/announcement paths is tried instead. Documents and
//! internal procedure pages become candidates; external RIS/gazette links
//! are noted but not emitted.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{is_document_url, CrawlSummary, RawItem, WebsiteItemKind};
use crate::discovery::patterns::MUNICIPAL_DISCOVERY_PATHS;
use crate::discovery::{absolutize, is_same_domain, ReasonCode};
use crate::http::HttpContext;
use crate::text::html;

/// Anchor keywords that justify following or emitting a link.
const RELEVANT_TERMS: &[&str] = &[
    "bebauungsplan",
    "b-plan",
    "bauleitplanung",
    "aufstellungsbeschluss",
    "auslegung",
    "satzung",
    "bauvorbescheid",
    "baugenehmigung",
    "einvernehmen",
    "verfahren",
    "beteiligung",
    "bekanntmachung",
];

/// Hosts/paths that belong to external systems covered by other crawlers.
const EXTERNAL_TERMS: &[&str] = &["ris", "allris", "sessionnet", "amtsblatt"];

pub struct WebsiteCrawler {
    max_pages: usize,
}

impl Default for WebsiteCrawler {
    fn default() -> Self {
        Self { max_pages: 15 }
    }
}

impl WebsiteCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Crawl the municipal website, pushing candidates into the sink.
    pub async fn crawl(
        &self,
        ctx: &HttpContext,
        homepage: &str,
        sink: &mpsc::Sender<RawItem>,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();
        if !homepage.starts_with("http") {
            summary.diagnostics.reason_code = Some(ReasonCode::NoSeedUrl);
            return summary;
        }
        let base = homepage.trim_end_matches('/').to_string();
        summary.diagnostics.attempted_urls.push(base.clone());

        let mut emitted = self.spider(ctx, &base, sink, &mut summary).await;

        if emitted == 0 {
            debug!(base = %base, "spider found nothing, falling back to known paths");
            emitted = self.crawl_known_paths(ctx, &base, sink, &mut summary).await;
        }

        summary.diagnostics.reason_code = Some(if emitted > 0 {
            ReasonCode::Found
        } else {
            ReasonCode::FoundButEmpty
        });
        info!(base = %base, items = emitted, pages = summary.pages_fetched, "website crawl finished");
        summary
    }

    /// Breadth-first walk over same-origin keyword-bearing links.
    async fn spider(
        &self,
        ctx: &HttpContext,
        base: &str,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let mut queue: VecDeque<String> = VecDeque::from([base.to_string()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut emitted = 0usize;

        while let Some(page_url) = queue.pop_front() {
            if visited.len() >= self.max_pages {
                break;
            }
            if !visited.insert(page_url.clone()) {
                continue;
            }

            let body = match ctx.fetch_text(&page_url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(url = %page_url, error = %e, "page unavailable");
                    continue;
                }
            };
            summary.pages_fetched += 1;

            for (href, text) in html::extract_anchors(&body) {
                let Some(url) = absolutize(&href, &page_url) else {
                    continue;
                };
                let url_lower = url.to_lowercase();
                let text_lower = text.to_lowercase();

                let relevant = RELEVANT_TERMS
                    .iter()
                    .any(|t| url_lower.contains(t) || text_lower.contains(t));
                if !relevant {
                    continue;
                }

                if is_document_url(&url) {
                    let item = RawItem::Website {
                        url,
                        title: text,
                        discovery_path: page_url.clone(),
                        kind: WebsiteItemKind::Document,
                        extra: BTreeMap::new(),
                    };
                    if sink.send(item).await.is_err() {
                        return emitted;
                    }
                    emitted += 1;
                    continue;
                }

                if EXTERNAL_TERMS.iter().any(|t| url_lower.contains(t))
                    || !is_same_domain(&url, base)
                {
                    debug!(url = %url, "external link, covered by other crawlers");
                    continue;
                }

                let item = RawItem::Website {
                    url: url.clone(),
                    title: text,
                    discovery_path: page_url.clone(),
                    kind: WebsiteItemKind::ProcedurePage,
                    extra: BTreeMap::new(),
                };
                if sink.send(item).await.is_err() {
                    return emitted;
                }
                emitted += 1;

                if !visited.contains(&url) && visited.len() + queue.len() < self.max_pages {
                    queue.push_back(url);
                }
            }
        }

        emitted
    }

    /// Fallback: enumerate the fixed planning/announcement paths.
    async fn crawl_known_paths(
        &self,
        ctx: &HttpContext,
        base: &str,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let mut emitted = 0usize;

        for path in MUNICIPAL_DISCOVERY_PATHS {
            let section_url = format!("{base}{path}");
            let body = match ctx.fetch_text(&section_url).await {
                Ok(body) => body,
                Err(_) => continue,
            };
            summary.pages_fetched += 1;

            for (href, text) in html::extract_anchors(&body) {
                let Some(url) = absolutize(&href, &section_url) else {
                    continue;
                };
                let url_lower = url.to_lowercase();
                let text_lower = text.to_lowercase();
                let relevant = RELEVANT_TERMS
                    .iter()
                    .any(|t| url_lower.contains(t) || text_lower.contains(t));
                if !relevant {
                    continue;
                }

                let kind = if is_document_url(&url) {
                    WebsiteItemKind::Document
                } else if EXTERNAL_TERMS.iter().any(|t| url_lower.contains(t))
                    || !is_same_domain(&url, base)
                {
                    continue;
                } else {
                    WebsiteItemKind::ProcedurePage
                };

                let item = RawItem::Website {
                    url,
                    title: text,
                    discovery_path: section_url.clone(),
                    kind,
                    extra: BTreeMap::new(),
                };
                if sink.send(item).await.is_err() {
                    return emitted;
                }
                emitted += 1;
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevant_terms_gate_links() {
        let relevant = "https://stadt.de/bauleitplanung/bplan-5".to_lowercase();
        assert!(RELEVANT_TERMS.iter().any(|t| relevant.contains(t)));
        let irrelevant = "https://stadt.de/tourismus".to_lowercase();
        assert!(!RELEVANT_TERMS.iter().any(|t| irrelevant.contains(t)));
    }

    #[test]
    fn external_systems_are_not_emitted() {
        let url = "https://stadt.allris.de/si0100.asp".to_lowercase();
        assert!(EXTERNAL_TERMS.iter().any(|t| url.contains(t)));
    }
}
