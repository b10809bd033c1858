//! Prefilter scoring: fast title/URL relevance check, no downloads.
//!
//! The score routes candidates cheaply: clearly relevant items go straight
//! to extraction, clearly irrelevant ones are skipped without touching the
//! network again.

use crate::config::CrawlMode;
use crate::models::DiscoverySource;

const STRONG_BESS_TITLE_TERMS: &[&str] = &[
    "batteriespeicher",
    "batterie-speicher",
    "energiespeicher",
    "stromspeicher",
    "grossspeicher",
    "großspeicher",
];

const SOLAR_TITLE_TERMS: &[&str] = &["photovoltaik", "pv", "solarpark", "solaranlage", "solar"];

const PROCEDURE_TITLE_TERMS: &[&str] = &[
    "aufstellungsbeschluss",
    "öffentliche auslegung",
    "oeffentliche auslegung",
    "satzungsbeschluss",
    "bauvorbescheid",
    "baugenehmigung",
    "§ 36",
    "§36",
    "einvernehmen",
];

const URL_PROCEDURE_TERMS: &[&str] = &[
    "bauleitplanung",
    "bebauungsplan",
    "amtsblatt",
    "ris",
    "sessionnet",
];

const CONTAINER_TITLE_TERMS: &[&str] = &[
    "amtsblatt",
    "sonderamtsblatt",
    "bekanntmachungsblatt",
    "ausgabe",
    "nummer",
    "nr.",
];

/// Score a listing item from title and URL alone. Result is in [0, 1].
///
/// +0.6 strong storage title, +0.4 solar/PV title, +0.3 procedure signal in
/// the title, +0.2 procedure hint in the URL, −0.7 container-like title
/// without a procedure signal; clamped.
pub fn prefilter_score(title: &str, url: &str) -> f64 {
    let title_lower = title.to_lowercase();
    let url_lower = url.to_lowercase();
    let mut score: f64 = 0.0;

    if STRONG_BESS_TITLE_TERMS
        .iter()
        .any(|t| title_lower.contains(t))
    {
        score += 0.6;
    }

    if SOLAR_TITLE_TERMS.iter().any(|t| title_lower.contains(t)) {
        score += 0.4;
    }

    let has_procedure_signal = PROCEDURE_TITLE_TERMS
        .iter()
        .any(|t| title_lower.contains(t));
    if has_procedure_signal {
        score += 0.3;
    }

    if URL_PROCEDURE_TERMS.iter().any(|t| url_lower.contains(t)) {
        score += 0.2;
    }

    let is_container = CONTAINER_TITLE_TERMS
        .iter()
        .any(|t| title_lower.contains(t));
    if is_container && !has_procedure_signal {
        score -= 0.7;
    }

    score.clamp(0.0, 1.0)
}

/// Source-aware extraction gate. RIS uses the lowest thresholds because the
/// storage terms are usually only in the attachments; municipal websites
/// the highest to keep the noise out.
pub fn should_extract(score: f64, mode: CrawlMode, source: DiscoverySource) -> bool {
    let threshold = match (source, mode) {
        (DiscoverySource::Ris, CrawlMode::Fast) => 0.35,
        (DiscoverySource::Ris, CrawlMode::Deep) => 0.20,
        (DiscoverySource::Gazette, CrawlMode::Fast) => 0.50,
        (DiscoverySource::Gazette, CrawlMode::Deep) => 0.30,
        (DiscoverySource::MunicipalWebsite, CrawlMode::Fast) => 0.60,
        (DiscoverySource::MunicipalWebsite, CrawlMode::Deep) => 0.50,
    };
    score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_stays_in_unit_interval() {
        for (title, url) in [
            ("Batteriespeicher Solarpark Aufstellungsbeschluss", "https://x.de/bebauungsplan"),
            ("Amtsblatt Ausgabe 12", ""),
            ("", ""),
        ] {
            let score = prefilter_score(title, url);
            assert!((0.0..=1.0).contains(&score), "{score} out of range");
        }
    }

    #[test]
    fn strong_bess_title_scores_high() {
        assert!(prefilter_score("Batteriespeicheranlage Metzdorf", "") >= 0.6);
    }

    #[test]
    fn container_without_procedure_is_zeroed() {
        assert_eq!(prefilter_score("Amtsblatt Ausgabe 12", ""), 0.0);
    }

    #[test]
    fn container_with_procedure_keeps_signal() {
        let score = prefilter_score("Amtsblatt: Aufstellungsbeschluss B-Plan 5", "");
        assert!(score >= 0.3);
    }

    #[test]
    fn url_hint_contributes() {
        let with_hint = prefilter_score("Niederschrift", "https://ris.stadt.de/si0100.asp");
        let without = prefilter_score("Niederschrift", "https://stadt.de/page");
        assert!(with_hint > without);
    }

    #[test]
    fn thresholds_are_source_aware() {
        use CrawlMode::*;
        use DiscoverySource::*;
        assert!(should_extract(0.4, Fast, Ris));
        assert!(!should_extract(0.4, Fast, Gazette));
        assert!(!should_extract(0.4, Fast, MunicipalWebsite));
        assert!(should_extract(0.3, Deep, Gazette));
        assert!(should_extract(0.5, Deep, MunicipalWebsite));
        assert!(!should_extract(0.19, Deep, Ris));
    }
}
