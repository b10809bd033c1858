//! Gazette crawler: list issues from a gazette root, then emit document
//! links of issues that carry planning/permit/energy language.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{is_document_url, parse_date_in_text, CrawlSummary, GazetteItemKind, RawItem};
use crate::classify::keywords;
use crate::discovery::{absolutize, discover_gazette, ReasonCode};
use crate::http::HttpContext;
use crate::text::{html, normalize};

/// Terms that mark an anchor as an issue link.
const ISSUE_LINK_TERMS: &[&str] = &["amtsblatt", "bekanntmachung", "ausgabe", "nummer"];

#[derive(Debug, Clone)]
struct Issue {
    url: String,
    title: String,
    date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Default)]
pub struct GazetteCrawler;

impl GazetteCrawler {
    pub fn new() -> Self {
        Self
    }

    /// Crawl one municipality's gazette, pushing candidates into the sink.
    pub async fn crawl(
        &self,
        ctx: &HttpContext,
        municipality_name: &str,
        entrypoint: Option<&str>,
        official_website: Option<&str>,
        sink: &mpsc::Sender<RawItem>,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();

        let (gazette_url, diagnostics) =
            discover_gazette(ctx, municipality_name, entrypoint, official_website).await;
        summary.diagnostics = diagnostics;
        let Some(gazette_url) = gazette_url else {
            debug!(
                municipality = municipality_name,
                reason = ?summary.diagnostics.reason_code,
                "no gazette found"
            );
            return summary;
        };

        let issues = self.list_issues(ctx, &gazette_url).await;
        summary.pages_fetched += 1;

        let mut emitted = 0usize;
        for issue in &issues {
            emitted += self.emit_issue(ctx, issue, sink, &mut summary).await;
        }

        summary.diagnostics.reason_code = Some(if emitted > 0 {
            ReasonCode::Found
        } else {
            ReasonCode::FoundButEmpty
        });
        info!(
            municipality = municipality_name,
            issues = issues.len(),
            items = emitted,
            "gazette crawl finished"
        );
        summary
    }

    /// Issue links below the gazette root, by term heuristics.
    async fn list_issues(&self, ctx: &HttpContext, gazette_url: &str) -> Vec<Issue> {
        let body = match ctx.fetch(gazette_url).await {
            Ok(response) if response.status == 200 => response.text(),
            _ => return Vec::new(),
        };

        html::extract_anchors(&body)
            .into_iter()
            .filter(|(_, text)| {
                let lowered = text.to_lowercase();
                ISSUE_LINK_TERMS.iter().any(|t| lowered.contains(t))
            })
            .filter_map(|(href, text)| {
                let url = absolutize(&href, gazette_url)?;
                let date = parse_date_in_text(&text);
                Some(Issue { url, title: text, date })
            })
            .collect()
    }

    /// Emit an issue's document links when its text carries a
    /// planning/permit/energy keyword; without document links the issue
    /// page itself becomes the candidate.
    async fn emit_issue(
        &self,
        ctx: &HttpContext,
        issue: &Issue,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let body = match ctx.fetch(&issue.url).await {
            Ok(response) if response.status == 200 => response.text(),
            Ok(_) => return 0,
            Err(e) => {
                debug!(url = %issue.url, error = %e, "issue page unavailable");
                return 0;
            }
        };
        summary.pages_fetched += 1;

        let page_text = normalize(&html::extract_text(&body));
        let relevant = keywords::has_procedure_term(&page_text)
            || keywords::contains_any(&page_text, keywords::BESS_TERMS_EXPLICIT)
            || keywords::contains_any(&page_text, keywords::ENERGY_CONTEXT_TERMS);
        if !relevant {
            return 0;
        }

        let mut documents: Vec<(String, String)> = html::extract_anchors(&body)
            .into_iter()
            .filter(|(href, _)| is_document_url(href))
            .filter_map(|(href, text)| Some((absolutize(&href, &issue.url)?, text)))
            .collect();
        for src in html::extract_iframe_sources(&body) {
            if src.to_lowercase().contains(".pdf") {
                if let Some(url) = absolutize(&src, &issue.url) {
                    documents.push((url, issue.title.clone()));
                }
            }
        }

        let mut emitted = 0usize;
        if documents.is_empty() {
            let item = RawItem::Gazette {
                url: issue.url.clone(),
                title: issue.title.clone(),
                issue_date: issue.date,
                discovery_path: issue.url.clone(),
                kind: GazetteItemKind::Issue,
                extra: BTreeMap::new(),
            };
            if sink.send(item).await.is_ok() {
                emitted += 1;
            }
        } else {
            for (doc_url, label) in documents {
                let title = if label.is_empty() {
                    issue.title.clone()
                } else {
                    label
                };
                let item = RawItem::Gazette {
                    url: doc_url,
                    title,
                    issue_date: issue.date,
                    discovery_path: issue.url.clone(),
                    kind: GazetteItemKind::Document,
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
    fn issue_link_terms_match() {
        for text in ["Amtsblatt 3/2024", "Ausgabe Nr. 7", "Bekanntmachung vom 01.02.2024"] {
            let lowered = text.to_lowercase();
            assert!(
                ISSUE_LINK_TERMS.iter().any(|t| lowered.contains(t)),
                "{text} should look like an issue link"
            );
        }
        let unrelated = "Veranstaltungskalender".to_lowercase();
        assert!(!ISSUE_LINK_TERMS.iter().any(|t| unrelated.contains(t)));
    }
}
