//! Keyword lexicons for detecting battery-storage planning and permitting
//! procedures in German municipal text.
//!
//! Matching happens on normalized text (lower-case, umlauts folded), but a
//! few lists keep both spellings because negative terms are also checked
//! against the raw lower-cased form.

/// Planning-procedure signals (B-Plan / Bauleitplanung).
pub const PLANNING_TERMS_STRONG: &[&str] = &[
    "bebauungsplan",
    "b-plan",
    "bauleitplanung",
    "baugb",
    "flaechennutzungsplan",
    "flächennutzungsplan",
    "fnp",
    "vorhabenbezogener bebauungsplan",
    "vbp",
];

/// Concrete planning steps, from Aufstellung to Inkrafttreten.
pub const PLANNING_STEP_TERMS: &[&str] = &[
    "aufstellungsbeschluss",
    "beschluss zur aufstellung",
    "beschlussfassung zur aufstellung",
    "gemäß § 2 abs. 1 baugb",
    "gemaess § 2 abs. 1 baugb",
    "§ 2 abs. 1 baugb",
    "fruehzeitige beteiligung",
    "frühzeitige beteiligung",
    "§ 3 abs. 1 baugb",
    "§ 4 abs. 1 baugb",
    "oeffentliche auslegung",
    "öffentliche auslegung",
    "auslegung der unterlagen",
    "§ 3 abs. 2 baugb",
    "§ 4 abs. 2 baugb",
    "satzungsbeschluss",
    "als satzung beschlossen",
    "bekanntmachung des satzungsbeschlusses",
    "inkrafttreten",
    "tritt in kraft",
    "§ 10 baugb",
];

/// Permit / privileged-project signals (§35/§34/§36 + permits).
pub const PERMIT_TERMS_STRONG: &[&str] = &[
    "bauvorbescheid",
    "antrag auf bauvorbescheid",
    "vorbescheid",
    "baugenehmigung",
    "bauantrag",
    "genehmigung nach",
    "gemeindliches einvernehmen",
    "einvernehmen gemaess § 36 baugb",
    "§ 36 baugb",
    "stellungnahme der gemeinde",
    "einvernehmen erteilen",
    "einvernehmen versagen",
    "bauvoranfrage",
    "bauvorantrag",
    "kenntnisnahme",
    "antrag auf errichtung",
    "standortgemeinde",
];

pub const LEGAL_BASIS_TERMS: &[&str] = &[
    "§ 35 baugb",
    "aussenbereich",
    "außenbereich",
    "privilegiertes vorhaben",
    "§ 34 baugb",
    "innenbereich",
    "§ 36 baugb",
];

/// Storage terms. Strong terms are explicit BESS language; medium terms
/// can also mean heat or water storage and need context.
pub const BESS_TERMS_EXPLICIT: &[&str] = &[
    "batteriespeicher",
    "batterie-speicher",
    "energiespeicher",
    "stromspeicher",
    "grossspeicher",
    "großspeicher",
    "bess",
    "speicheranlage",
    "speicherpark",
    "speicherkraftwerk",
];

/// Strong subset of the explicit terms (no medium/ambiguous entries).
pub const BESS_TERMS_STRONG: &[&str] = &[
    "batteriespeicher",
    "batterie-speicher",
    "energiespeicher",
    "stromspeicher",
    "grossspeicher",
    "großspeicher",
    "bess",
];

pub const BESS_TERMS_MEDIUM: &[&str] = &["speicheranlage", "speicherpark", "speicherkraftwerk"];

/// Container and grid vocabulary supporting an ambiguous "Speicher".
pub const BESS_TERMS_CONTAINER_GRID: &[&str] = &[
    "containeranlage",
    "speichercontainer",
    "wechselrichter",
    "trafostation",
    "trafostationen",
    "transformator",
    "umspannwerk",
    "netzanschluss",
    "mittelspannung",
    "hochspannung",
    "anschluss an das stromnetz",
    "netzverknuepfungspunkt",
    "netzverknüpfungspunkt",
    "anlage zur energiespeicherung",
];

pub const ENERGY_CONTEXT_TERMS: &[&str] = &[
    "photovoltaik",
    "pv",
    "solarpark",
    "windenergie",
    "energieerzeugung",
    "energieversorgung",
    "strom",
    "netzdienlich",
    "netzdienlichkeit",
    "regelenergie",
    "spitzenlast",
    "erneuerbare energien",
];

pub const ZONING_TERMS: &[&str] = &[
    "sondergebiet",
    "so energie",
    "sondergebiet energie",
    "industriegebiet",
    "gewerbegebiet",
    "flaeche fuer versorgungsanlagen",
    "fläche für versorgungsanlagen",
    "technische anlagen",
    "anlagen zur energieversorgung",
    "versorgung",
];

pub const PARCEL_TERMS: &[&str] = &[
    "gemarkung",
    "flur",
    "flurstueck",
    "flurstück",
    "flurstuecke",
    "flurstücke",
    "lageplan",
    "adresse",
    "strasse",
    "straße",
    "koordinaten",
];

/// Negative storage vocabulary: rain retention, water, heat/cold, gas,
/// waste, plain warehousing.
pub const NEGATIVE_STORAGE_TERMS: &[&str] = &[
    "regenrueckhaltebecken",
    "regenrückhaltebecken",
    "wasserbehaelter",
    "wasserbehälter",
    "loeschwasser",
    "löschwasser",
    "waermespeicher",
    "wärmespeicher",
    "kaeltespeicher",
    "kältespeicher",
    "gaslager",
    "gasspeicher",
    "muell",
    "abfall",
    "lagerhalle",
    "lagerung",
    "speisekammer",
];

/// Negative unrelated vocabulary (data storage and friends).
pub const NEGATIVE_UNRELATED_TERMS: &[&str] = &[
    "datenspeicher",
    "speicherstadt",
    "speicherkarte",
    "cloud",
];

/// Privileged-project agenda language used by the RIS relaxations.
pub const PRIVILEGED_AGENDA_TERMS: &[&str] = &[
    "einvernehmen",
    "bauantrag",
    "bauvorbescheid",
    "vorbescheid",
    "stellungnahme",
    "energie",
    "speicher",
    "photovoltaik",
    "umspannwerk",
];

/// Whether any term of `terms` occurs in `text`.
pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

/// How many terms of `terms` occur in `text`.
pub fn count_matches(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| text.contains(*t)).count()
}

/// Whether the text carries any procedure term (planning strong, planning
/// step, or permit strong).
pub fn has_procedure_term(text: &str) -> bool {
    contains_any(text, PLANNING_TERMS_STRONG)
        || contains_any(text, PLANNING_STEP_TERMS)
        || contains_any(text, PERMIT_TERMS_STRONG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_terms_are_subset_of_explicit() {
        for term in BESS_TERMS_STRONG {
            assert!(BESS_TERMS_EXPLICIT.contains(term), "{term} missing");
        }
    }

    #[test]
    fn procedure_term_families() {
        assert!(has_procedure_term("aufstellungsbeschluss zum bebauungsplan"));
        assert!(has_procedure_term("antrag auf bauvorbescheid"));
        assert!(!has_procedure_term("wochenmarkt am rathausplatz"));
    }

    #[test]
    fn counting() {
        let text = "umspannwerk und trafostation mit netzanschluss";
        assert_eq!(count_matches(text, BESS_TERMS_CONTAINER_GRID), 3);
    }
}
