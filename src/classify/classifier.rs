//! Deterministic rule-based classifier for storage-related procedures.
//!
//! Operates on title and text normalized by the text module; negative terms
//! are additionally checked against the raw lower-cased form because PDF
//! extraction sometimes yields text that normalization would mask.

use chrono::NaiveDate;

use super::keywords::*;
use crate::models::{LegalBasis, ProcedureType, ProjectComponents};
use crate::text::normalize;

/// Earliest decision date the R2 title rule accepts.
fn r2_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date")
}

/// Classifier output for one candidate.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub is_relevant: bool,
    /// Set only when relevant; `Unknown` when no type could be tagged.
    pub procedure_type: Option<ProcedureType>,
    pub legal_basis: LegalBasis,
    pub project_components: Option<ProjectComponents>,
    pub confidence: f64,
    pub ambiguity_flag: bool,
    pub review_recommended: bool,
    pub evidence_snippets: Vec<String>,
}

/// Candidate gate: procedure term plus a storage/energy signal, vetoed by
/// negative storage vocabulary unless explicit BESS language is present.
pub fn is_candidate(text: &str, title: &str) -> bool {
    let combined = format!("{} {}", normalize(text), normalize(title));

    let has_negative = contains_any(&combined, NEGATIVE_STORAGE_TERMS)
        || contains_any(&combined, NEGATIVE_UNRELATED_TERMS);
    let has_bess_explicit = contains_any(&combined, BESS_TERMS_EXPLICIT);
    if has_negative && !has_bess_explicit {
        return false;
    }

    if !has_procedure_term(&combined) {
        return false;
    }

    let has_speicher_energy =
        combined.contains("speicher") && contains_any(&combined, ENERGY_CONTEXT_TERMS);
    let has_zoning_energy = contains_any(&combined, ZONING_TERMS)
        && contains_any(&combined, ENERGY_CONTEXT_TERMS);

    has_bess_explicit || has_speicher_energy || has_zoning_energy
}

/// Confirmed-relevance rules, typing, confidence and evidence.
///
/// Rules are evaluated in order, first match wins; negatives veto unless an
/// explicit BESS term is present. Items without a date are eligible for R2.
pub fn classify(text: &str, title: &str, date: Option<NaiveDate>) -> Classification {
    let normalized_text = normalize(text);
    let normalized_title = normalize(title);
    let combined = format!("{normalized_text} {normalized_title}");
    let raw_combined = format!("{} {}", text.to_lowercase(), title.to_lowercase());

    let mut result = Classification::default();

    let has_negative = contains_any(&combined, NEGATIVE_STORAGE_TERMS)
        || contains_any(&combined, NEGATIVE_UNRELATED_TERMS)
        || contains_any(&raw_combined, NEGATIVE_STORAGE_TERMS)
        || contains_any(&raw_combined, NEGATIVE_UNRELATED_TERMS);

    let has_bess_strong = contains_any(&combined, BESS_TERMS_STRONG);
    let has_bess_medium = contains_any(&combined, BESS_TERMS_MEDIUM);
    let has_procedure = has_procedure_term(&combined);

    if has_negative && !has_bess_strong {
        return result;
    }

    // R1: explicit BESS term and a procedure term.
    if has_bess_strong && has_procedure {
        result.is_relevant = true;
    }

    // R2: explicit storage term in the title; decision date (when present)
    // must be 2023 or later.
    if !result.is_relevant
        && date.map_or(true, |d| d >= r2_cutoff())
        && (normalized_title.contains("batteriespeicher")
            || normalized_title.contains("energiespeicher"))
    {
        result.is_relevant = true;
    }

    // R3: ambiguous "Speicher" with at least two grid/container terms and a
    // planning-step or permit term.
    if !result.is_relevant && (combined.contains("speicher") || has_bess_medium) {
        let grid_terms = count_matches(&combined, BESS_TERMS_CONTAINER_GRID);
        let has_step_or_permit = contains_any(&combined, PLANNING_STEP_TERMS)
            || contains_any(&combined, PERMIT_TERMS_STRONG);
        if grid_terms >= 2 && has_step_or_permit {
            result.is_relevant = true;
            result.ambiguity_flag = true;
        }
    }

    if !result.is_relevant {
        return result;
    }

    result.procedure_type = Some(tag_procedure_type(&combined));
    result.legal_basis = tag_legal_basis(&combined);
    result.project_components = Some(tag_project_components(&combined));
    result.confidence = confidence_score(&combined, has_bess_strong, date);

    if !has_bess_strong {
        result.ambiguity_flag = true;
    }
    if (0.35..=0.65).contains(&result.confidence) {
        result.review_recommended = true;
    }

    result.evidence_snippets = evidence_snippets(&combined);
    result
}

/// Tag the procedural step. Permits come before B-Plan stages: permit
/// notices frequently quote planning vocabulary.
pub fn tag_procedure_type(text: &str) -> ProcedureType {
    if text.contains("bauvorbescheid") || text.contains("vorbescheid") {
        return ProcedureType::PermitBauvorbescheid;
    }
    if text.contains("baugenehmigung") {
        return ProcedureType::PermitBaugenehmigung;
    }
    if text.contains("§ 36 baugb")
        || (text.contains("gemeindliches einvernehmen") && text.contains("§ 36"))
    {
        return ProcedureType::Permit36Einvernehmen;
    }
    if text.contains("bauantrag")
        || (text.contains("antrag auf") && contains_any(text, PERMIT_TERMS_STRONG))
        || text.contains("bauvoranfrage")
        || text.contains("bauvorantrag")
        || (text.contains("kenntnisnahme")
            && (text.contains("bauantrag") || text.contains("vorhaben")))
        || text.contains("antrag auf errichtung")
    {
        return ProcedureType::PermitOther;
    }

    if text.contains("aufstellungsbeschluss")
        || text.contains("beschluss zur aufstellung")
        || text.contains("§ 2 abs. 1 baugb")
    {
        return ProcedureType::BplanAufstellung;
    }
    if text.contains("§ 3 abs. 1 baugb")
        || text.contains("fruehzeitige beteiligung")
        || text.contains("frühzeitige beteiligung")
    {
        return ProcedureType::BplanFruehzeitig31;
    }
    if text.contains("§ 3 abs. 2 baugb")
        || text.contains("oeffentliche auslegung")
        || text.contains("öffentliche auslegung")
    {
        return ProcedureType::BplanAuslegung32;
    }
    if text.contains("satzungsbeschluss")
        || text.contains("§ 10 baugb")
        || text.contains("inkrafttreten")
    {
        return ProcedureType::BplanSatzung;
    }
    if contains_any(text, PLANNING_TERMS_STRONG) {
        return ProcedureType::BplanOther;
    }

    ProcedureType::Unknown
}

/// Tag the legal basis. Tolerates the broken whitespace common in RIS PDFs.
pub fn tag_legal_basis(text: &str) -> LegalBasis {
    let flat = text.replace(['\n', '\t'], " ").replace("  ", " ");

    let matches_any = |variants: &[&str]| variants.iter().any(|v| flat.contains(v));

    if matches_any(&["§ 35 baugb", "§35 baugb", "§ 35bau gb", "§35bau gb"])
        || flat.contains("aussenbereich")
        || flat.contains("außenbereich")
    {
        LegalBasis::Outer35
    } else if matches_any(&["§ 34 baugb", "§34 baugb", "§ 34bau gb", "§34bau gb"])
        || flat.contains("innenbereich")
    {
        LegalBasis::Inner34
    } else if matches_any(&["§ 36 baugb", "§36 baugb", "§ 36bau gb", "§36bau gb"]) {
        LegalBasis::Assent36
    } else {
        LegalBasis::Unknown
    }
}

/// Tag which components the project combines. Grid-paired container
/// phrasing and "anlage zur energiespeicherung" count as BESS.
pub fn tag_project_components(text: &str) -> ProjectComponents {
    let flat = text.replace(['\n', '\t'], " ");

    let has_pv = ["photovoltaik", "pv", "solarpark"]
        .iter()
        .any(|t| flat.contains(t));
    let has_wind = ["windenergie", "windpark"].iter().any(|t| flat.contains(t));
    let mut has_bess = contains_any(&flat, BESS_TERMS_EXPLICIT) || flat.contains("speicher");

    let has_grid = [
        "netz",
        "umspannwerk",
        "trafostation",
        "mittelspannung",
        "hochspannung",
    ]
    .iter()
    .any(|t| flat.contains(t));
    if flat.contains("containeranlage") && has_grid {
        has_bess = true;
    }
    if flat.contains("anlage zur energiespeicherung") {
        has_bess = true;
    }

    if has_pv && has_bess {
        ProjectComponents::PvBess
    } else if has_wind && has_bess {
        ProjectComponents::WindBess
    } else if has_bess {
        ProjectComponents::BessOnly
    } else {
        ProjectComponents::OtherUnclear
    }
}

/// Additive confidence score, clamped to [0, 1].
fn confidence_score(text: &str, has_bess_strong: bool, date: Option<NaiveDate>) -> f64 {
    let mut score: f64 = 0.0;

    if ["batteriespeicher", "energiespeicher", "stromspeicher"]
        .iter()
        .any(|t| text.contains(t))
    {
        score += 0.55;
    } else if ["speicheranlage", "grossspeicher", "großspeicher", "speicherpark"]
        .iter()
        .any(|t| text.contains(t))
    {
        score += 0.35;
    } else if text.contains("speicher") && contains_any(text, ENERGY_CONTEXT_TERMS) {
        score += 0.15;
    }

    if contains_any(text, PLANNING_STEP_TERMS) {
        score += 0.25;
    }
    if text.contains("bauvorbescheid") || text.contains("baugenehmigung") {
        score += 0.25;
    }
    if text.contains("§ 36 baugb") || text.contains("gemeindliches einvernehmen") {
        score += 0.20;
    }

    let grid_terms = [
        "umspannwerk",
        "netzanschluss",
        "trafostation",
        "mittelspannung",
        "hochspannung",
        "netzverknuepfungspunkt",
        "netzverknüpfungspunkt",
    ];
    if grid_terms.iter().any(|t| text.contains(t)) {
        score += 0.10;
    }

    if contains_any(text, NEGATIVE_STORAGE_TERMS) && !has_bess_strong {
        return 0.0;
    }
    if text.contains("speicher") && !contains_any(text, BESS_TERMS_CONTAINER_GRID) {
        score -= 0.25;
    }
    if date.is_none() {
        score -= 0.15;
    }

    score.clamp(0.0, 1.0)
}

/// Up to five deduplicated snippets of at most 250 chars, windowed ±100
/// chars around the first BESS, procedure-step and legal-basis hits.
fn evidence_snippets(normalized: &str) -> Vec<String> {
    const MAX_SNIPPETS: usize = 5;
    const MAX_LEN: usize = 250;
    const WINDOW: usize = 100;

    let mut snippets: Vec<String> = Vec::new();
    let term_families: [&[&str]; 3] = [BESS_TERMS_EXPLICIT, PLANNING_STEP_TERMS, LEGAL_BASIS_TERMS];

    for family in term_families {
        let hit = family
            .iter()
            .find_map(|term| normalized.find(term).map(|idx| (idx, term.len())));
        let Some((idx, len)) = hit else {
            continue;
        };
        // Char-safe window around the byte hit.
        let start = floor_char_boundary(normalized, idx.saturating_sub(WINDOW));
        let end = ceil_char_boundary(normalized, (idx + len + WINDOW).min(normalized.len()));
        let snippet = normalized[start..end].trim().to_string();
        if !snippet.is_empty() && snippet.len() <= MAX_LEN && !snippets.contains(&snippet) {
            snippets.push(snippet);
        }
        // Also check permit-strong terms within the procedure family.
        if snippets.len() >= MAX_SNIPPETS {
            break;
        }
    }

    if snippets.len() < MAX_SNIPPETS {
        if let Some((idx, len)) = PERMIT_TERMS_STRONG
            .iter()
            .find_map(|term| normalized.find(term).map(|idx| (idx, term.len())))
        {
            let start = floor_char_boundary(normalized, idx.saturating_sub(WINDOW));
            let end = ceil_char_boundary(normalized, (idx + len + WINDOW).min(normalized.len()));
            let snippet = normalized[start..end].trim().to_string();
            if !snippet.is_empty() && snippet.len() <= MAX_LEN && !snippets.contains(&snippet) {
                snippets.push(snippet);
            }
        }
    }

    snippets.truncate(MAX_SNIPPETS);
    snippets
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
