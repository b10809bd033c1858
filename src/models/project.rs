//! Project entities: persistent aggregates over repeated procedures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Project maturity lifecycle. Ordered by precedence; a project's stage is
/// monotonically non-decreasing across updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaturityStage {
    Discovered,
    BplanAufstellung,
    BplanAuslegung,
    BplanSatzung,
    #[serde(rename = "PERMIT_36")]
    Permit36,
    Bauvorbescheid,
    Baugenehmigung,
}

impl MaturityStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "DISCOVERED",
            Self::BplanAufstellung => "BPLAN_AUFSTELLUNG",
            Self::BplanAuslegung => "BPLAN_AUSLEGUNG",
            Self::BplanSatzung => "BPLAN_SATZUNG",
            Self::Permit36 => "PERMIT_36",
            Self::Bauvorbescheid => "BAUVORBESCHEID",
            Self::Baugenehmigung => "BAUGENEHMIGUNG",
        }
    }

    /// Precedence: BAUGENEHMIGUNG > BAUVORBESCHEID > PERMIT_36 >
    /// BPLAN_SATZUNG > BPLAN_AUSLEGUNG > BPLAN_AUFSTELLUNG > DISCOVERED.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Baugenehmigung => 6,
            Self::Bauvorbescheid => 5,
            Self::Permit36 => 4,
            Self::BplanSatzung => 3,
            Self::BplanAuslegung => 2,
            Self::BplanAufstellung => 1,
            Self::Discovered => 0,
        }
    }

    /// The higher of two stages by precedence.
    pub fn max(self, other: Self) -> Self {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }
}

/// Why a procedure was linked to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkReason {
    ParcelMatch,
    PlanTokenMatch,
    #[serde(rename = "DEV+TITLE_MATCH")]
    DevTitleMatch,
    TitleMatch,
    NewProject,
    #[serde(rename = "PERMIT_36_NEW")]
    Permit36New,
}

impl LinkReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParcelMatch => "PARCEL_MATCH",
            Self::PlanTokenMatch => "PLAN_TOKEN_MATCH",
            Self::DevTitleMatch => "DEV+TITLE_MATCH",
            Self::TitleMatch => "TITLE_MATCH",
            Self::NewProject => "NEW_PROJECT",
            Self::Permit36New => "PERMIT_36_NEW",
        }
    }
}

/// Many-to-one link from a procedure into its project. A procedure belongs
/// to at most one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLink {
    pub project_id: String,
    pub procedure_id: String,
    pub link_confidence: f64,
    pub link_reason: LinkReason,
}

/// Aggregated best-known state of one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntity {
    pub project_id: String,
    pub region: String,
    pub municipality_key: String,
    pub canonical_project_name: Option<String>,
    pub project_components: Option<super::ProjectComponents>,
    pub legal_basis_best: super::LegalBasis,
    pub site_location_best: Option<String>,
    pub developer_company_best: Option<String>,
    pub capacity_mw_best: Option<f64>,
    pub capacity_mwh_best: Option<f64>,
    pub area_hectares_best: Option<f64>,
    pub maturity_stage: MaturityStage,
    /// Signature tokens kept for title-overlap matching of later procedures.
    pub title_signature: Option<String>,
    pub first_seen: Option<NaiveDate>,
    pub last_seen: Option<NaiveDate>,
    pub max_confidence: f64,
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectEntity {
    pub fn new(region: &str, municipality_key: &str) -> Self {
        let now = Utc::now();
        Self {
            project_id: uuid::Uuid::new_v4().to_string(),
            region: region.to_string(),
            municipality_key: municipality_key.to_string(),
            canonical_project_name: None,
            project_components: None,
            legal_basis_best: super::LegalBasis::Unknown,
            site_location_best: None,
            developer_company_best: None,
            capacity_mw_best: None,
            capacity_mwh_best: None,
            area_hectares_best: None,
            maturity_stage: MaturityStage::Discovered,
            title_signature: None,
            first_seen: None,
            last_seen: None,
            max_confidence: 0.0,
            needs_review: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maturity_precedence_chain() {
        use MaturityStage::*;
        let order = [
            Discovered,
            BplanAufstellung,
            BplanAuslegung,
            BplanSatzung,
            Permit36,
            Bauvorbescheid,
            Baugenehmigung,
        ];
        for pair in order.windows(2) {
            assert!(pair[1].precedence() > pair[0].precedence());
        }
    }

    #[test]
    fn maturity_max_never_decreases() {
        let stage = MaturityStage::Bauvorbescheid;
        assert_eq!(stage.max(MaturityStage::BplanAufstellung), stage);
        assert_eq!(
            stage.max(MaturityStage::Baugenehmigung),
            MaturityStage::Baugenehmigung
        );
    }

    #[test]
    fn link_reason_spelling() {
        assert_eq!(LinkReason::DevTitleMatch.as_str(), "DEV+TITLE_MATCH");
        assert_eq!(
            serde_json::to_string(&LinkReason::Permit36New).unwrap(),
            "\"PERMIT_36_NEW\""
        );
    }
}
