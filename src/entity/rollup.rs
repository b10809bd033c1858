//! Project rollup: best-field aggregation over linked procedures.
//!
//! Recomputed on every new link. Quantities take the maximum, the legal
//! basis follows its precedence, maturity never decreases, and the review
//! flag is the OR over all linked procedures.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::{maturity_for, ProjectSignature};
use crate::models::{LegalBasis, MaturityStage, Procedure, ProjectEntity};

/// Recompute a project entity from all of its linked procedures.
pub fn recompute(
    project: &mut ProjectEntity,
    procedures: &[Procedure],
    signature: &ProjectSignature,
) {
    project.canonical_project_name = canonical_name(procedures, signature)
        .or_else(|| project.canonical_project_name.take());
    project.site_location_best =
        best_site_location(procedures, signature).or_else(|| project.site_location_best.take());
    project.developer_company_best =
        modal_developer(procedures).or_else(|| project.developer_company_best.take());

    project.capacity_mw_best = max_option(
        project.capacity_mw_best,
        procedures.iter().filter_map(|p| p.capacity_mw).fold(None, fold_max),
    );
    project.capacity_mwh_best = max_option(
        project.capacity_mwh_best,
        procedures.iter().filter_map(|p| p.capacity_mwh).fold(None, fold_max),
    );
    project.area_hectares_best = max_option(
        project.area_hectares_best,
        procedures.iter().filter_map(|p| p.area_hectares).fold(None, fold_max),
    );

    for procedure in procedures {
        if procedure.legal_basis.precedence() > project.legal_basis_best.precedence() {
            project.legal_basis_best = procedure.legal_basis;
        }
    }

    if project.project_components.is_none() {
        project.project_components = procedures.iter().find_map(|p| p.project_components);
    }

    let computed_stage = procedures
        .iter()
        .map(|p| maturity_for(p.procedure_type))
        .fold(MaturityStage::Discovered, MaturityStage::max);
    project.maturity_stage = project.maturity_stage.max(computed_stage);

    let (first, last) = seen_dates(procedures);
    project.first_seen = min_date(project.first_seen, first);
    project.last_seen = max_date(project.last_seen, last);

    for procedure in procedures {
        if procedure.confidence > project.max_confidence {
            project.max_confidence = procedure.confidence;
        }
        if procedure.review_recommended {
            project.needs_review = true;
        }
    }

    if project.title_signature.is_none() && !signature.title_signature.is_empty() {
        project.title_signature = Some(signature.title_signature.clone());
    }

    project.updated_at = chrono::Utc::now();
}

/// Canonical name: `B-Plan <token>` when a plan token exists, else the
/// longest plan-mentioning title, else the longest title.
fn canonical_name(procedures: &[Procedure], signature: &ProjectSignature) -> Option<String> {
    if let Some(token) = &signature.plan_token {
        return Some(format!("B-Plan {token}"));
    }

    let titles: Vec<&str> = procedures
        .iter()
        .map(|p| p.title_raw.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    if titles.is_empty() {
        return None;
    }

    let plan_titles: Vec<&str> = titles
        .iter()
        .copied()
        .filter(|t| {
            let lowered = t.to_lowercase();
            ["bebauungsplan", "b-plan", "plan"]
                .iter()
                .any(|w| lowered.contains(w))
        })
        .collect();

    let pool = if plan_titles.is_empty() { &titles } else { &plan_titles };
    pool.iter().max_by_key(|t| t.len()).map(|t| t.to_string())
}

fn best_site_location(procedures: &[Procedure], signature: &ProjectSignature) -> Option<String> {
    if let Some(parcel) = &signature.parcel_token {
        return Some(parcel.clone());
    }
    procedures
        .iter()
        .filter_map(|p| p.site_location_raw.as_deref())
        .max_by_key(|l| l.len())
        .map(|l| l.to_string())
}

/// Most frequent non-empty developer name.
fn modal_developer(procedures: &[Procedure]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for procedure in procedures {
        if let Some(dev) = procedure.developer_company.as_deref() {
            if !dev.is_empty() {
                *counts.entry(dev).or_default() += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(dev, _)| dev.to_string())
}

fn seen_dates(procedures: &[Procedure]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;
    for procedure in procedures {
        let date = procedure
            .decision_date
            .unwrap_or_else(|| procedure.created_at.date_naive());
        first = min_date(first, Some(date));
        last = max_date(last, Some(date));
    }
    (first, last)
}

fn fold_max(best: Option<f64>, value: f64) -> Option<f64> {
    Some(best.map_or(value, |b| b.max(value)))
}

fn max_option(existing: Option<f64>, computed: Option<f64>) -> Option<f64> {
    match (existing, computed) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProcedureType, ProjectComponents};

    fn procedure(title: &str) -> Procedure {
        Procedure::new(title, "BB", "12345")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn plan_token_names_the_project() {
        let mut project = ProjectEntity::new("BB", "12345");
        let signature = ProjectSignature {
            plan_token: Some("5".to_string()),
            ..Default::default()
        };
        recompute(&mut project, &[procedure("irrelevant")], &signature);
        assert_eq!(project.canonical_project_name.as_deref(), Some("B-Plan 5"));
    }

    #[test]
    fn longest_plan_title_wins_without_token() {
        let mut project = ProjectEntity::new("BB", "12345");
        let procedures = vec![
            procedure("Kurzmitteilung"),
            procedure("Bebauungsplan Batteriespeicheranlage Metzdorf Nord"),
            procedure("Bebauungsplan Ost"),
        ];
        recompute(&mut project, &procedures, &ProjectSignature::default());
        assert_eq!(
            project.canonical_project_name.as_deref(),
            Some("Bebauungsplan Batteriespeicheranlage Metzdorf Nord")
        );
    }

    #[test]
    fn capacities_take_maximum() {
        let mut project = ProjectEntity::new("BB", "12345");
        let mut p1 = procedure("a");
        p1.capacity_mw = Some(10.0);
        p1.capacity_mwh = Some(5.0);
        let mut p2 = procedure("b");
        p2.capacity_mw = Some(50.0);
        recompute(&mut project, &[p1, p2], &ProjectSignature::default());
        assert_eq!(project.capacity_mw_best, Some(50.0));
        assert_eq!(project.capacity_mwh_best, Some(5.0));
    }

    #[test]
    fn legal_basis_never_downgrades() {
        let mut project = ProjectEntity::new("BB", "12345");
        project.legal_basis_best = LegalBasis::Outer35;
        let mut p = procedure("a");
        p.legal_basis = LegalBasis::Assent36;
        recompute(&mut project, &[p], &ProjectSignature::default());
        assert_eq!(project.legal_basis_best, LegalBasis::Outer35);
    }

    #[test]
    fn maturity_is_monotone() {
        let mut project = ProjectEntity::new("BB", "12345");
        let mut p = procedure("a");
        p.procedure_type = ProcedureType::PermitBaugenehmigung;
        recompute(&mut project, std::slice::from_ref(&p), &ProjectSignature::default());
        assert_eq!(project.maturity_stage, MaturityStage::Baugenehmigung);

        // A later, earlier-stage procedure must not lower the stage.
        let mut early = procedure("b");
        early.procedure_type = ProcedureType::BplanAufstellung;
        recompute(&mut project, &[early], &ProjectSignature::default());
        assert_eq!(project.maturity_stage, MaturityStage::Baugenehmigung);
    }

    #[test]
    fn modal_developer_wins() {
        let mut project = ProjectEntity::new("BB", "12345");
        let mut procedures = Vec::new();
        for _ in 0..2 {
            let mut p = procedure("a");
            p.developer_company = Some("Alpha GmbH".to_string());
            procedures.push(p);
        }
        let mut other = procedure("b");
        other.developer_company = Some("Beta AG".to_string());
        procedures.push(other);
        recompute(&mut project, &procedures, &ProjectSignature::default());
        assert_eq!(project.developer_company_best.as_deref(), Some("Alpha GmbH"));
    }

    #[test]
    fn seen_dates_and_flags() {
        let mut project = ProjectEntity::new("BB", "12345");
        let mut p1 = procedure("a");
        p1.decision_date = Some(date(2023, 5, 1));
        p1.confidence = 0.4;
        p1.review_recommended = true;
        let mut p2 = procedure("b");
        p2.decision_date = Some(date(2024, 2, 1));
        p2.confidence = 0.9;
        recompute(&mut project, &[p1, p2], &ProjectSignature::default());
        assert_eq!(project.first_seen, Some(date(2023, 5, 1)));
        assert_eq!(project.last_seen, Some(date(2024, 2, 1)));
        assert_eq!(project.max_confidence, 0.9);
        assert!(project.needs_review);
    }

    #[test]
    fn components_are_kept_once_set() {
        let mut project = ProjectEntity::new("BB", "12345");
        project.project_components = Some(ProjectComponents::PvBess);
        let mut p = procedure("a");
        p.project_components = Some(ProjectComponents::BessOnly);
        recompute(&mut project, &[p], &ProjectSignature::default());
        assert_eq!(project.project_components, Some(ProjectComponents::PvBess));
    }
}
