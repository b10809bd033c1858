//! Entity resolution: map each accepted procedure into exactly one project.
//!
//! A structured signature (plan token, parcel token, developer token, title
//! signature) is computed per procedure and matched against the existing
//! projects of the same municipality in descending precedence; the first
//! match wins.

pub mod rollup;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{LinkReason, MaturityStage, Procedure, ProcedureType, ProjectEntity};

static PLAN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"b(?:ebauungs)?-?plan\s*(?:nr\.?|nummer)?\s*([a-z0-9\-/]+)").unwrap()
});
static QUOTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[„\"']([^„\"']{5,50})[“\"']").unwrap());
static PARCEL_GEMARKUNG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"gemarkung\s*:?\s*([a-zäöüß-]+)").unwrap());
static PARCEL_FLUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"flur\s*:?\s*(\d+)").unwrap());
static PARCEL_FLURSTUECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"flurst(?:ueck|ück)\s*:?\s*(\d+(?:/\d+)?[a-z]?)").unwrap()
});
static COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(gmbh & co\. kg|gmbh|ag|ug|kg|gbr|e\.v\.|e\.k\.|ohg)\s*$").unwrap()
});
static TITLE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zäöüß]{3,}\b").unwrap());

/// Signature of one procedure for project matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSignature {
    /// Plan number or quoted plan name, e.g. `5` from "Bebauungsplan Nr. 5".
    pub plan_token: Option<String>,
    /// Canonical `gemarkung=…;flur=…;flurstueck=…`.
    pub parcel_token: Option<String>,
    /// Developer with corporate suffixes stripped, lower-cased.
    pub developer_token: Option<String>,
    /// Up to ten informative title tokens, space-joined.
    pub title_signature: String,
}

/// Compute the signature from a procedure and its evidence snippets.
pub fn compute_signature(procedure: &Procedure) -> ProjectSignature {
    let mut text = procedure.title_raw.clone();
    for snippet in procedure.evidence_snippets.iter().take(3) {
        text.push(' ');
        text.push_str(snippet);
    }

    ProjectSignature {
        plan_token: extract_plan_token(&procedure.title_raw, Some(text.as_str())),
        parcel_token: extract_parcel_token(procedure.site_location_raw.as_deref()),
        developer_token: normalize_company_name(procedure.developer_company.as_deref()),
        title_signature: extract_title_signature(&procedure.title_raw),
    }
}

/// Plan number after "Bebauungsplan Nr." or a quoted plan-like name.
pub fn extract_plan_token(title: &str, text: Option<&str>) -> Option<String> {
    let combined = format!("{} {}", title, text.unwrap_or("")).to_lowercase();

    if let Some(captures) = PLAN_TOKEN.captures(&combined) {
        let token = captures[1].trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if let Some(captures) = QUOTED_NAME.captures(&combined) {
        let candidate = captures[1].trim();
        if ["plan", "gebiet", "bereich", "vorhaben"]
            .iter()
            .any(|w| candidate.contains(w))
        {
            return Some(candidate.to_string());
        }
    }

    None
}

/// Canonical parcel token from a raw location string.
pub fn extract_parcel_token(site_location_raw: Option<&str>) -> Option<String> {
    let location = site_location_raw?.to_lowercase();
    let mut parts = Vec::new();

    if let Some(captures) = PARCEL_GEMARKUNG.captures(&location) {
        parts.push(format!("gemarkung={}", captures[1].trim()));
    }
    if let Some(captures) = PARCEL_FLUR.captures(&location) {
        parts.push(format!("flur={}", &captures[1]));
    }
    if let Some(captures) = PARCEL_FLURSTUECK.captures(&location) {
        parts.push(format!("flurstueck={}", &captures[1]));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

/// Company name with corporate suffixes stripped, for matching.
pub fn normalize_company_name(company: Option<&str>) -> Option<String> {
    let company = company?.trim();
    if company.is_empty() {
        return None;
    }
    let stripped = COMPANY_SUFFIX.replace(company, "");
    let normalized = crate::text::collapse_whitespace(&stripped).to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Informative title tokens with procedural stop phrases and stop-words
/// removed, truncated to ten tokens.
pub fn extract_title_signature(title: &str) -> String {
    const STOP_PHRASES: &[&str] = &[
        "zur beteiligung",
        "öffentliche auslegung",
        "oeffentliche auslegung",
        "zur aufstellung",
        "bekanntmachung",
        "verfahren",
        "beschluss",
        "sitzung",
        "tagesordnung",
    ];
    const STOPWORDS: &[&str] = &[
        "und", "der", "die", "das", "für", "fuer", "von", "mit", "auf", "in", "an", "zu", "dem",
        "den",
    ];

    let mut normalized = title.to_lowercase();
    for phrase in STOP_PHRASES {
        normalized = normalized.replace(phrase, " ");
    }

    let tokens: Vec<&str> = TITLE_WORD
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !STOPWORDS.contains(t))
        .take(10)
        .collect();

    tokens.join(" ")
}

/// Jaccard similarity of two space-separated token signatures.
pub fn title_signature_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Match a signature against the existing projects of the municipality.
/// Returns the matched project id, the link confidence and the reason.
pub fn match_project(
    signature: &ProjectSignature,
    projects: &[ProjectEntity],
) -> Option<(String, f64, LinkReason)> {
    // Level 1: parcel substring match in the best-known site location.
    if let Some(parcel) = &signature.parcel_token {
        for project in projects {
            if project
                .site_location_best
                .as_deref()
                .is_some_and(|loc| loc.to_lowercase().contains(parcel))
            {
                return Some((project.project_id.clone(), 0.95, LinkReason::ParcelMatch));
            }
        }
    }

    // Level 2: plan token against the canonical name.
    if let Some(plan) = &signature.plan_token {
        for project in projects {
            if project
                .canonical_project_name
                .as_deref()
                .is_some_and(|name| {
                    let name = name.to_lowercase();
                    name.contains(plan.as_str()) || name == *plan
                })
            {
                return Some((project.project_id.clone(), 0.90, LinkReason::PlanTokenMatch));
            }
        }
    }

    // Level 3: developer equality with title-signature overlap.
    if let Some(developer) = &signature.developer_token {
        if !signature.title_signature.is_empty() {
            for project in projects {
                let project_dev =
                    normalize_company_name(project.developer_company_best.as_deref());
                if project_dev.as_ref() != Some(developer) {
                    continue;
                }
                let overlaps = match project.title_signature.as_deref() {
                    Some(stored) => {
                        title_signature_similarity(&signature.title_signature, stored) > 0.0
                    }
                    // Without a stored signature, developer equality alone
                    // decides.
                    None => true,
                };
                if overlaps {
                    return Some((project.project_id.clone(), 0.80, LinkReason::DevTitleMatch));
                }
            }
        }
    }

    // Level 4: title-signature Jaccard.
    if !signature.title_signature.is_empty() {
        for project in projects {
            if let Some(stored) = project.title_signature.as_deref() {
                if title_signature_similarity(&signature.title_signature, stored) >= 0.5 {
                    return Some((project.project_id.clone(), 0.70, LinkReason::TitleMatch));
                }
            }
        }
    }

    None
}

/// Maturity stage a procedure type contributes to its project.
pub fn maturity_for(procedure_type: ProcedureType) -> MaturityStage {
    match procedure_type {
        ProcedureType::PermitBaugenehmigung => MaturityStage::Baugenehmigung,
        ProcedureType::PermitBauvorbescheid => MaturityStage::Bauvorbescheid,
        ProcedureType::Permit36Einvernehmen => MaturityStage::Permit36,
        ProcedureType::BplanSatzung => MaturityStage::BplanSatzung,
        ProcedureType::BplanAuslegung32 => MaturityStage::BplanAuslegung,
        ProcedureType::BplanFruehzeitig31 | ProcedureType::BplanAufstellung => {
            MaturityStage::BplanAufstellung
        }
        _ => MaturityStage::Discovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_token_from_numbered_plan() {
        assert_eq!(
            extract_plan_token("Aufstellungsbeschluss für Bebauungsplan Nr. 5", None),
            Some("5".to_string())
        );
        assert_eq!(
            extract_plan_token("B-Plan 12/4 Gewerbegebiet", None),
            Some("12/4".to_string())
        );
    }

    #[test]
    fn plan_token_from_quoted_name() {
        assert_eq!(
            extract_plan_token("Satzung über das \"Sondergebiet Energiepark Vorhaben Ost\"", None),
            Some("sondergebiet energiepark vorhaben ost".to_string())
        );
    }

    #[test]
    fn parcel_token_canonical_form() {
        let token =
            extract_parcel_token(Some("Gemarkung: Musterstadt; Flur: 3; Flurstück: 12/4")).unwrap();
        assert!(token.contains("gemarkung=musterstadt"));
        assert!(token.contains("flur=3"));
        assert!(token.contains("flurstueck=12/4"));
    }

    #[test]
    fn company_normalization_strips_suffixes() {
        assert_eq!(
            normalize_company_name(Some("Example GmbH")),
            Some("example".to_string())
        );
        assert_eq!(
            normalize_company_name(Some("Test AG")),
            Some("test".to_string())
        );
        assert_eq!(
            normalize_company_name(Some("Speicher Projekt GmbH & Co. KG")),
            Some("speicher projekt".to_string())
        );
        assert_eq!(normalize_company_name(None), None);
    }

    #[test]
    fn title_signature_drops_stop_phrases() {
        let signature =
            extract_title_signature("Aufstellungsbeschluss zur Beteiligung für Bebauungsplan Batteriespeicher");
        assert!(signature.contains("bebauungsplan"));
        assert!(signature.contains("batteriespeicher"));
        assert!(!signature.contains("beteiligung"));
    }

    #[test]
    fn signature_determinism() {
        let title = "Bebauungsplan Batteriespeicher Metzdorf";
        assert_eq!(extract_title_signature(title), extract_title_signature(title));
    }

    #[test]
    fn jaccard_bounds() {
        assert_eq!(title_signature_similarity("a b c", "a b c"), 1.0);
        assert_eq!(title_signature_similarity("abc def", "ghi jkl"), 0.0);
        let half = title_signature_similarity("alpha beta", "alpha gamma");
        assert!(half > 0.3 && half < 0.34);
    }

    fn project_with(
        name: Option<&str>,
        location: Option<&str>,
        developer: Option<&str>,
        title_signature: Option<&str>,
    ) -> ProjectEntity {
        let mut project = ProjectEntity::new("BB", "12345");
        project.canonical_project_name = name.map(|s| s.to_string());
        project.site_location_best = location.map(|s| s.to_string());
        project.developer_company_best = developer.map(|s| s.to_string());
        project.title_signature = title_signature.map(|s| s.to_string());
        project
    }

    #[test]
    fn match_precedence_parcel_first() {
        let parcel_project = project_with(None, Some("gemarkung=metzdorf;flur=3"), None, None);
        let plan_project = project_with(Some("B-Plan 5"), None, None, None);
        let signature = ProjectSignature {
            plan_token: Some("5".to_string()),
            parcel_token: Some("gemarkung=metzdorf;flur=3".to_string()),
            developer_token: None,
            title_signature: String::new(),
        };

        let (id, confidence, reason) =
            match_project(&signature, &[plan_project, parcel_project.clone()]).unwrap();
        assert_eq!(id, parcel_project.project_id);
        assert_eq!(confidence, 0.95);
        assert_eq!(reason, LinkReason::ParcelMatch);
    }

    #[test]
    fn match_plan_token() {
        let project = project_with(Some("B-Plan 5"), None, None, None);
        let signature = ProjectSignature {
            plan_token: Some("5".to_string()),
            ..Default::default()
        };
        let (_, confidence, reason) = match_project(&signature, &[project]).unwrap();
        assert_eq!(confidence, 0.90);
        assert_eq!(reason, LinkReason::PlanTokenMatch);
    }

    #[test]
    fn match_developer_with_title_overlap() {
        let project = project_with(
            None,
            None,
            Some("Energiepark Metzdorf GmbH"),
            Some("solarpark metzdorf speicher"),
        );
        let signature = ProjectSignature {
            developer_token: Some("energiepark metzdorf".to_string()),
            title_signature: "batteriespeicher metzdorf".to_string(),
            ..Default::default()
        };
        let (_, confidence, reason) = match_project(&signature, &[project]).unwrap();
        assert_eq!(confidence, 0.80);
        assert_eq!(reason, LinkReason::DevTitleMatch);
    }

    #[test]
    fn match_title_jaccard() {
        let project = project_with(None, None, None, Some("bebauungsplan batteriespeicher metzdorf"));
        let signature = ProjectSignature {
            title_signature: "bebauungsplan batteriespeicher metzdorf nord".to_string(),
            ..Default::default()
        };
        let (_, confidence, reason) = match_project(&signature, &[project]).unwrap();
        assert_eq!(confidence, 0.70);
        assert_eq!(reason, LinkReason::TitleMatch);
    }

    #[test]
    fn no_match_for_unrelated_signature() {
        let project = project_with(Some("B-Plan 5"), None, None, Some("solarfeld sued"));
        let signature = ProjectSignature {
            plan_token: Some("9".to_string()),
            title_signature: "windpark nord".to_string(),
            ..Default::default()
        };
        assert!(match_project(&signature, &[project]).is_none());
    }

    #[test]
    fn maturity_mapping() {
        assert_eq!(
            maturity_for(ProcedureType::PermitBaugenehmigung),
            MaturityStage::Baugenehmigung
        );
        assert_eq!(
            maturity_for(ProcedureType::BplanFruehzeitig31),
            MaturityStage::BplanAufstellung
        );
        assert_eq!(maturity_for(ProcedureType::Unknown), MaturityStage::Discovered);
    }
}
