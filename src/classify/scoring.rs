//! Integer heuristic scores kept on procedures for ranking and recall
//! debugging: a storage score in [0, 100] and an open-ended grid score.

use super::classifier::{classify, is_candidate};
use chrono::NaiveDate;

const GRID_TOKENS: &[(&str, u32)] = &[
    ("umspannwerk", 5),
    ("110 kv", 5),
    ("220 kv", 5),
    ("380 kv", 5),
    ("400 kv", 5),
    ("hochspannung", 4),
    ("mittelspannung", 3),
    ("20 kv", 3),
    ("30 kv", 3),
    ("10 kv", 2),
    ("schaltanlage", 2),
    ("netzverknüpfungspunkt", 2),
    ("netzverknuepfungspunkt", 2),
    ("netzanschluss", 2),
    ("netzanschlusspunkt", 2),
    ("trafostation", 1),
    ("trafo", 1),
    ("einspeisepunkt", 1),
    ("einspeisung", 1),
    ("stromnetz", 1),
    ("energienetz", 1),
];

/// Storage relevance score in [0, 100]. Zero unless the candidate gate
/// passes; otherwise scaled classifier confidence with bonuses for explicit
/// storage and substation language.
pub fn bess_score(text: &str, title: &str, date: Option<NaiveDate>) -> u32 {
    let combined = format!(
        "{} {}",
        crate::text::normalize(text),
        crate::text::normalize(title)
    );

    if !is_candidate(text, title) {
        return 0;
    }
    let result = classify(text, title, date);
    if !result.is_relevant {
        return 0;
    }

    let mut score = (result.confidence * 50.0) as u32;
    if ["batteriespeicher", "energiespeicher", "stromspeicher"]
        .iter()
        .any(|t| combined.contains(t))
    {
        score += 20;
    }
    if ["umspannwerk", "110 kv", "220 kv", "380 kv"]
        .iter()
        .any(|t| combined.contains(t))
    {
        score += 15;
    }
    score.min(100)
}

/// Grid-infrastructure score: token-weighted with combination bonuses.
/// A lone generic grid word scores zero.
pub fn grid_score(text: &str) -> u32 {
    let lowered = crate::text::normalize(text);
    let mut total: u32 = 0;

    for (token, weight) in GRID_TOKENS {
        if lowered.contains(token) {
            total += weight;
        }
    }
    // Generic "netz" counts once, only alongside other grid vocabulary.
    if lowered.contains("netz") && total > 0 {
        total += 1;
    }

    if (lowered.contains("umspannwerk") || lowered.contains("schaltanlage"))
        && (lowered.contains("110") || lowered.contains("220") || lowered.contains("380"))
    {
        total += 2;
    }
    let has_renewable =
        lowered.contains("solar") || lowered.contains("pv") || lowered.contains("wind");
    if lowered.contains("netzanschluss") && has_renewable {
        total += 2;
    }
    if lowered.contains("einspeisung") && has_renewable {
        total += 2;
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bess_score_zero_for_non_candidates() {
        assert_eq!(bess_score("Regenrückhaltebecken am Ortsrand", "", None), 0);
        assert_eq!(bess_score("Wochenmarkt", "Markttermine", None), 0);
    }

    #[test]
    fn bess_score_rewards_explicit_storage() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let score = bess_score(
            "Aufstellungsbeschluss für den Bebauungsplan Batteriespeicher mit \
             Umspannwerk am 110 kV Netzanschluss",
            "Batteriespeicher",
            date,
        );
        assert!(score >= 50, "got {score}");
        assert!(score <= 100);
    }

    #[test]
    fn grid_score_combinations() {
        let score = grid_score("Umspannwerk mit Anschluss an das 110 kV Netz");
        // umspannwerk(5) + 110 kv(5) + netz bonus(1) + combo(2)
        assert!(score >= 12, "got {score}");
    }

    #[test]
    fn lone_generic_netz_scores_zero() {
        assert_eq!(grid_score("Das soziale Netz der Gemeinde"), 0);
    }
}
