//! Container gate: rejects gazette-issue and index pages that carry no
//! procedure signal of their own, and enforces the procedure-signal
//! requirement before anything is persisted.

use super::classifier::Classification;
use crate::models::DiscoverySource;
use crate::text::normalize;

/// Why a candidate was rejected before persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Container,
    NoProcedureSignal,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "SKIP_CONTAINER",
            Self::NoProcedureSignal => "SKIP_NO_PROCEDURE_SIGNAL",
        }
    }
}

const CONTAINER_KEYWORDS: &[&str] = &[
    "amtsblatt",
    "sonderamtsblatt",
    "bekanntmachungsblatt",
    "bekanntmachung",
    "veröffentlichung",
    "veroeffentlichung",
    "ausgabe",
    "nummer",
    "nr.",
    "jahrgang",
];

const PROCEDURE_SIGNALS: &[&str] = &[
    "bebauungsplan",
    "b-plan",
    "bauleitplanung",
    "aufstellungsbeschluss",
    "satzungsbeschluss",
    "öffentliche auslegung",
    "oeffentliche auslegung",
    "auslegung",
    "bauvorbescheid",
    "baugenehmigung",
    "einvernehmen",
    "§ 35",
    "§ 34",
    "§ 36",
    "bauantrag",
    "bauvoranfrage",
    "stellungnahme",
];

const BESS_SIGNALS: &[&str] = &[
    "batteriespeicher",
    "energiespeicher",
    "stromspeicher",
    "speicheranlage",
    "speicherpark",
    "containeranlage",
    "anlage zur energiespeicherung",
];

const GRID_SIGNALS: &[&str] = &[
    "umspannwerk",
    "netzanschluss",
    "trafostation",
    "mittelspannung",
    "hochspannung",
    "110 kv",
    "220 kv",
];

/// Privileged-project language that lets a RIS item through even when no
/// procedure type could be tagged.
const RIS_PRIVILEGED_TERMS: &[&str] = &[
    "einvernehmen",
    "stellungnahme",
    "bauantrag",
    "bauvoranfrage",
    "vorhaben",
    "kenntnisnahme",
    "antrag auf errichtung",
];

/// Whether title or URL look like a gazette issue or similar container
/// rather than a concrete procedure item.
pub fn is_container(title: &str, url: &str) -> bool {
    let combined = format!("{} {}", normalize(title), url.to_lowercase());

    let has_container = CONTAINER_KEYWORDS.iter().any(|k| combined.contains(k));
    let has_procedure = PROCEDURE_SIGNALS.iter().any(|k| combined.contains(k))
        || BESS_SIGNALS.iter().any(|k| combined.contains(k));

    has_container && !has_procedure
}

/// Screen a classified candidate before persistence.
///
/// Containers are rejected unless the extracted text itself carries a
/// procedure signal. A non-null procedure type is required in general; two
/// relaxations apply: an explicit storage signal (or "Speicher" plus grid
/// language) passes for any source, and RIS items with privileged-project
/// language pass even untyped.
pub fn validate(
    title: &str,
    url: &str,
    source: DiscoverySource,
    classification: Option<&Classification>,
    extracted_text: Option<&str>,
) -> Result<(), SkipReason> {
    let combined = format!(
        "{} {}",
        normalize(title),
        normalize(extracted_text.unwrap_or(""))
    );

    if is_container(title, url) {
        let has_signal_in_text = PROCEDURE_SIGNALS.iter().any(|k| combined.contains(k));
        let has_typed_procedure =
            classification.is_some_and(|c| c.procedure_type.is_some());
        if !has_signal_in_text && !has_typed_procedure {
            return Err(SkipReason::Container);
        }
        return Ok(());
    }

    let has_bess = BESS_SIGNALS.iter().any(|k| combined.contains(k));
    let has_grid = GRID_SIGNALS.iter().any(|k| combined.contains(k));
    if has_bess || (has_grid && combined.contains("speicher")) {
        return Ok(());
    }

    if source == DiscoverySource::Ris {
        let has_privileged = RIS_PRIVILEGED_TERMS.iter().any(|k| combined.contains(k));
        if has_privileged {
            return Ok(());
        }
    }

    if classification.is_some_and(|c| c.procedure_type.is_some()) {
        return Ok(());
    }

    Err(SkipReason::NoProcedureSignal)
}
