//! Procedure rows: one concrete procedural event at a municipality.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Procedural step type. Permits are checked before B-Plan stages when
/// tagging because the wording overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcedureType {
    PermitBauvorbescheid,
    PermitBaugenehmigung,
    #[serde(rename = "PERMIT_36_EINVERNEHMEN")]
    Permit36Einvernehmen,
    PermitOther,
    BplanAufstellung,
    #[serde(rename = "BPLAN_FRUEHZEITIG_3_1")]
    BplanFruehzeitig31,
    #[serde(rename = "BPLAN_AUSLEGUNG_3_2")]
    BplanAuslegung32,
    BplanSatzung,
    BplanOther,
    Unknown,
}

impl ProcedureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermitBauvorbescheid => "PERMIT_BAUVORBESCHEID",
            Self::PermitBaugenehmigung => "PERMIT_BAUGENEHMIGUNG",
            Self::Permit36Einvernehmen => "PERMIT_36_EINVERNEHMEN",
            Self::PermitOther => "PERMIT_OTHER",
            Self::BplanAufstellung => "BPLAN_AUFSTELLUNG",
            Self::BplanFruehzeitig31 => "BPLAN_FRUEHZEITIG_3_1",
            Self::BplanAuslegung32 => "BPLAN_AUSLEGUNG_3_2",
            Self::BplanSatzung => "BPLAN_SATZUNG",
            Self::BplanOther => "BPLAN_OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_permit(&self) -> bool {
        matches!(
            self,
            Self::PermitBauvorbescheid
                | Self::PermitBaugenehmigung
                | Self::Permit36Einvernehmen
                | Self::PermitOther
        )
    }
}

/// Legal basis of the procedure under the federal building code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LegalBasis {
    #[serde(rename = "§35")]
    Outer35,
    #[serde(rename = "§34")]
    Inner34,
    #[serde(rename = "§36")]
    Assent36,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl LegalBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outer35 => "§35",
            Self::Inner34 => "§34",
            Self::Assent36 => "§36",
            Self::Unknown => "unknown",
        }
    }

    /// Merge precedence: §35 > §34 > §36 > unknown. A known outer/inner
    /// basis is never downgraded by a merge.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Outer35 => 3,
            Self::Inner34 => 2,
            Self::Assent36 => 1,
            Self::Unknown => 0,
        }
    }
}

/// Which generation/storage components the project combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectComponents {
    #[serde(rename = "BESS_ONLY")]
    BessOnly,
    #[serde(rename = "PV+BESS")]
    PvBess,
    #[serde(rename = "WIND+BESS")]
    WindBess,
    #[serde(rename = "OTHER/UNCLEAR")]
    OtherUnclear,
}

impl ProjectComponents {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BessOnly => "BESS_ONLY",
            Self::PvBess => "PV+BESS",
            Self::WindBess => "WIND+BESS",
            Self::OtherUnclear => "OTHER/UNCLEAR",
        }
    }
}

/// A persisted procedure with classification and extracted attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub procedure_id: String,
    pub title_raw: String,
    pub title_norm: String,
    pub region: String,
    pub county: Option<String>,
    pub municipality_key: String,
    pub procedure_type: ProcedureType,
    pub legal_basis: LegalBasis,
    pub project_components: Option<ProjectComponents>,
    pub developer_company: Option<String>,
    pub capacity_mw: Option<f64>,
    pub capacity_mwh: Option<f64>,
    pub area_hectares: Option<f64>,
    pub decision_date: Option<NaiveDate>,
    /// Raw serialized parcel/street location, when found.
    pub site_location_raw: Option<String>,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Keyword heuristic score in [0, 100].
    pub bess_score: u32,
    /// Grid-infrastructure heuristic score.
    pub grid_score: u32,
    pub ambiguity_flag: bool,
    pub review_recommended: bool,
    /// Bounded evidence snippets, each at most 250 chars.
    pub evidence_snippets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Procedure {
    pub fn new(title_raw: &str, region: &str, municipality_key: &str) -> Self {
        let now = Utc::now();
        Self {
            procedure_id: uuid::Uuid::new_v4().to_string(),
            title_raw: title_raw.to_string(),
            title_norm: title_raw.to_lowercase(),
            region: region.to_string(),
            county: None,
            municipality_key: municipality_key.to_string(),
            procedure_type: ProcedureType::Unknown,
            legal_basis: LegalBasis::Unknown,
            project_components: None,
            developer_company: None,
            capacity_mw: None,
            capacity_mwh: None,
            area_hectares: None,
            decision_date: None,
            site_location_raw: None,
            confidence: 0.0,
            bess_score: 0,
            grid_score: 0,
            ambiguity_flag: false,
            review_recommended: false,
            evidence_snippets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_basis_precedence_order() {
        assert!(LegalBasis::Outer35.precedence() > LegalBasis::Inner34.precedence());
        assert!(LegalBasis::Inner34.precedence() > LegalBasis::Assent36.precedence());
        assert!(LegalBasis::Assent36.precedence() > LegalBasis::Unknown.precedence());
    }

    #[test]
    fn permit_set() {
        assert!(ProcedureType::PermitBauvorbescheid.is_permit());
        assert!(ProcedureType::Permit36Einvernehmen.is_permit());
        assert!(!ProcedureType::BplanSatzung.is_permit());
        assert!(!ProcedureType::Unknown.is_permit());
    }

    #[test]
    fn components_serde_spelling() {
        let json = serde_json::to_string(&ProjectComponents::PvBess).unwrap();
        assert_eq!(json, "\"PV+BESS\"");
        let back: ProjectComponents = serde_json::from_str("\"OTHER/UNCLEAR\"").unwrap();
        assert_eq!(back, ProjectComponents::OtherUnclear);
    }
}
