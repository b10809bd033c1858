//! RIS crawler: locate-root → list-committees → list-sessions →
//! extract-items → package.
//!
//! Only committees on the allow-list are descended. Pagination is smart:
//! sessions are walked in list order and a committee is abandoned after
//! three consecutive sessions dated before the cut-off; undated sessions
//! count as recent.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{is_document_url, parse_date_in_text, CrawlSummary, RawItem};
use crate::discovery::patterns::{RIS_COMMITTEE_ALLOWLIST, RIS_COMMITTEE_PATHS};
use crate::discovery::{absolutize, discover_ris, ReasonCode};
use crate::http::HttpContext;
use crate::text::html;

/// Agenda keywords that make an item worth emitting: privileged-project
/// language plus energy/storage vocabulary.
const AGENDA_ITEM_TERMS: &[&str] = &[
    "bebauungsplan",
    "b-plan",
    "bauleitplanung",
    "bauvorbescheid",
    "baugenehmigung",
    "einvernehmen",
    "§ 36",
    "§36",
    "§ 35",
    "§35",
    "§ 34",
    "§34",
    "bauantrag",
    "bauvoranfrage",
    "vorbescheid",
    "stellungnahme",
    "kenntnisnahme",
    "antrag auf errichtung",
    "batteriespeicher",
    "energiespeicher",
    "speicheranlage",
    "speicher",
    "photovoltaik",
    "umspannwerk",
    "energie",
    "containeranlage",
];

#[derive(Debug, Clone)]
struct Committee {
    name: String,
    url: String,
}

#[derive(Debug, Clone)]
struct Session {
    url: String,
    title: String,
    date: Option<NaiveDate>,
}

/// A fetched agenda item detail page with its attachments.
#[derive(Debug, Clone, Default)]
pub struct AgendaItem {
    pub url: String,
    pub title: String,
    pub documents: Vec<String>,
}

pub struct RisCrawler {
    cutoff: NaiveDate,
    max_consecutive_old: usize,
}

impl Default for RisCrawler {
    fn default() -> Self {
        Self {
            cutoff: NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date"),
            max_consecutive_old: 3,
        }
    }
}

impl RisCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the session cut-off date.
    pub fn with_cutoff(mut self, cutoff: NaiveDate) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Crawl one municipality's RIS, pushing agenda items into the sink.
    pub async fn crawl(
        &self,
        ctx: &HttpContext,
        municipality_name: &str,
        entrypoint: Option<&str>,
        official_website: Option<&str>,
        sink: &mpsc::Sender<RawItem>,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();

        let (ris_url, diagnostics) =
            discover_ris(ctx, municipality_name, entrypoint, official_website).await;
        summary.diagnostics = diagnostics;
        let Some(ris_url) = ris_url else {
            debug!(
                municipality = municipality_name,
                reason = ?summary.diagnostics.reason_code,
                "no RIS found"
            );
            return summary;
        };
        summary.pages_fetched += 1;

        let committees = self.discover_committees(ctx, &ris_url).await;
        let mut emitted = 0usize;

        if committees.is_empty() {
            debug!(url = %ris_url, "no committees found, trying direct session listing");
            emitted += self
                .crawl_sessions_direct(ctx, &ris_url, sink, &mut summary)
                .await;
        } else {
            for committee in &committees {
                emitted += self
                    .crawl_committee(ctx, committee, sink, &mut summary)
                    .await;
            }
        }

        summary.diagnostics.reason_code = Some(if emitted > 0 {
            ReasonCode::Found
        } else {
            ReasonCode::FoundButEmpty
        });
        info!(
            municipality = municipality_name,
            committees = committees.len(),
            items = emitted,
            "RIS crawl finished"
        );
        summary
    }

    /// Committees matching the allow-list, harvested from the known list
    /// paths below the RIS root.
    async fn discover_committees(&self, ctx: &HttpContext, ris_url: &str) -> Vec<Committee> {
        let mut committees: Vec<Committee> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for path in RIS_COMMITTEE_PATHS {
            let list_url = format!("{}{}", ris_url.trim_end_matches('/'), path);
            let body = match ctx.fetch_ris(&list_url).await {
                Ok(response) if response.status == 200 => response.text(),
                Ok(_) => continue,
                Err(e) => {
                    debug!(url = %list_url, error = %e, "committee path unavailable");
                    continue;
                }
            };

            for (href, text) in html::extract_anchors(&body) {
                let text_lower = text.to_lowercase();
                if !RIS_COMMITTEE_ALLOWLIST
                    .iter()
                    .any(|name| text_lower.contains(name))
                {
                    continue;
                }
                let Some(url) = absolutize(&href, &list_url) else {
                    continue;
                };
                if seen.insert(url.clone()) {
                    committees.push(Committee { name: text, url });
                }
            }
        }

        committees
    }

    /// Walk one committee's sessions with the consecutive-old stop rule.
    async fn crawl_committee(
        &self,
        ctx: &HttpContext,
        committee: &Committee,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let sessions = self.list_sessions(ctx, &committee.url).await;
        summary.pages_fetched += 1;

        let mut emitted = 0usize;
        let mut consecutive_old = 0usize;

        for session in &sessions {
            match session.date {
                Some(date) if date < self.cutoff => {
                    consecutive_old += 1;
                    if consecutive_old >= self.max_consecutive_old {
                        debug!(
                            committee = %committee.name,
                            "stopping pagination after {consecutive_old} consecutive old sessions"
                        );
                        break;
                    }
                }
                _ => consecutive_old = 0,
            }

            emitted += self
                .emit_session_items(ctx, session, sink, summary)
                .await;
        }

        emitted
    }

    async fn list_sessions(&self, ctx: &HttpContext, committee_url: &str) -> Vec<Session> {
        let body = match ctx.fetch_ris(committee_url).await {
            Ok(response) if response.status == 200 => response.text(),
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!(url = %committee_url, error = %e, "failed to list sessions");
                return Vec::new();
            }
        };

        html::extract_anchors(&body)
            .into_iter()
            .filter(|(_, text)| {
                let lowered = text.to_lowercase();
                ["sitzung", "sitzungstag", "datum"]
                    .iter()
                    .any(|t| lowered.contains(t))
            })
            .filter_map(|(href, text)| {
                let url = absolutize(&href, committee_url)?;
                let date = parse_date_in_text(&text);
                Some(Session { url, title: text, date })
            })
            .collect()
    }

    /// Fallback when a RIS root exposes no committee list.
    async fn crawl_sessions_direct(
        &self,
        ctx: &HttpContext,
        ris_url: &str,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let body = match ctx.fetch_ris(ris_url).await {
            Ok(response) if response.status == 200 => response.text(),
            _ => return 0,
        };

        let mut emitted = 0usize;
        for (href, text) in html::extract_anchors(&body) {
            let lowered = text.to_lowercase();
            if !["sitzung", "tagesordnung", "beschluss"]
                .iter()
                .any(|t| lowered.contains(t))
            {
                continue;
            }
            let Some(url) = absolutize(&href, ris_url) else {
                continue;
            };
            let session = Session {
                url,
                title: text,
                date: parse_date_in_text(&lowered),
            };
            emitted += self
                .emit_session_items(ctx, &session, sink, summary)
                .await;
        }
        emitted
    }

    /// Keyword-gated agenda items of one session page.
    async fn emit_session_items(
        &self,
        ctx: &HttpContext,
        session: &Session,
        sink: &mpsc::Sender<RawItem>,
        summary: &mut CrawlSummary,
    ) -> usize {
        let body = match ctx.fetch_ris(&session.url).await {
            Ok(response) if response.status == 200 => response.text(),
            Ok(_) => return 0,
            Err(e) => {
                debug!(url = %session.url, error = %e, "session page unavailable");
                return 0;
            }
        };
        summary.pages_fetched += 1;

        let mut emitted = 0usize;
        for (href, text) in html::extract_anchors(&body) {
            let lowered = text.to_lowercase();
            if !AGENDA_ITEM_TERMS.iter().any(|t| lowered.contains(t)) {
                continue;
            }
            let Some(url) = absolutize(&href, &session.url) else {
                continue;
            };
            let item = RawItem::Ris {
                url,
                title: text,
                session_date: session.date,
                discovery_path: session.url.clone(),
                documents: Vec::new(),
                extra: BTreeMap::new(),
            };
            if sink.send(item).await.is_err() {
                return emitted;
            }
            emitted += 1;
        }
        emitted
    }
}

/// Fetch an agenda item detail page and collect its attachment URLs.
pub async fn fetch_agenda_item(ctx: &HttpContext, url: &str) -> AgendaItem {
    let body = match ctx.fetch_ris(url).await {
        Ok(response) if response.status == 200 => response.text(),
        _ => return AgendaItem::default(),
    };

    let title = html::extract_title(&body).unwrap_or_default();
    let documents = html::extract_anchors(&body)
        .into_iter()
        .filter(|(href, _)| is_document_url(href))
        .filter_map(|(href, _)| absolutize(&href, url))
        .collect();

    AgendaItem {
        url: url.to_string(),
        title,
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_counter_rules() {
        // Mirrors the stop rule: dates before cutoff count up, recent or
        // undated sessions reset.
        let crawler = RisCrawler::new();
        let old = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let recent = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let mut consecutive = 0usize;
        let mut stopped_at = None;
        for (i, date) in [Some(old), Some(old), Some(recent), Some(old), Some(old), Some(old), None]
            .iter()
            .enumerate()
        {
            match date {
                Some(d) if *d < crawler.cutoff => {
                    consecutive += 1;
                    if consecutive >= crawler.max_consecutive_old {
                        stopped_at = Some(i);
                        break;
                    }
                }
                _ => consecutive = 0,
            }
        }
        // Two old, reset by a recent one, then three consecutive old.
        assert_eq!(stopped_at, Some(5));
    }

    #[test]
    fn agenda_terms_gate() {
        assert!(AGENDA_ITEM_TERMS
            .iter()
            .any(|t| "TOP 4: Einvernehmen § 36 BauGB".to_lowercase().contains(t)));
        assert!(!AGENDA_ITEM_TERMS
            .iter()
            .any(|t| "TOP 1: Genehmigung der Niederschrift".to_lowercase().contains(t)));
    }
}
