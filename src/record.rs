//! Input record-batch schema
//!
//! The extraction collaborator emits snapshot batches of denormalized
//! rows with a fixed, already-validated shape. This module is the serde
//! mirror of that shape plus the controlled-vocabulary parsing the rest
//! of the core relies on (phase, status category, agency class).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trial phase, following the registry's phase vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    EarlyPhase1,
    Phase1,
    Phase1Phase2,
    Phase2,
    Phase2Phase3,
    Phase3,
    Phase4,
    Unknown,
}

impl Phase {
    /// Parse a raw registry phase string. Anything unrecognized maps to
    /// `Unknown` rather than failing the record.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return Self::Unknown };
        match raw.trim().to_ascii_uppercase().as_str() {
            "EARLY_PHASE1" => Self::EarlyPhase1,
            "PHASE1" => Self::Phase1,
            "PHASE1/PHASE2" => Self::Phase1Phase2,
            "PHASE2" => Self::Phase2,
            "PHASE2/PHASE3" => Self::Phase2Phase3,
            "PHASE3" => Self::Phase3,
            "PHASE4" => Self::Phase4,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarlyPhase1 => "EARLY_PHASE1",
            Self::Phase1 => "PHASE1",
            Self::Phase1Phase2 => "PHASE1/PHASE2",
            Self::Phase2 => "PHASE2",
            Self::Phase2Phase3 => "PHASE2/PHASE3",
            Self::Phase3 => "PHASE3",
            Self::Phase4 => "PHASE4",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Coarse grouping of the registry's many overall-status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCategory {
    Completed,
    Active,
    Stopped,
    Planned,
    Other,
    Unknown,
}

impl StatusCategory {
    pub fn categorize(status: Option<&str>) -> Self {
        let Some(status) = status else { return Self::Unknown };
        let status = status.trim().to_ascii_uppercase();
        if status.is_empty() {
            return Self::Unknown;
        }
        match status.as_str() {
            "COMPLETED" => Self::Completed,
            "RECRUITING" | "ENROLLING_BY_INVITATION" | "ACTIVE_NOT_RECRUITING" => Self::Active,
            "TERMINATED" | "WITHDRAWN" | "SUSPENDED" => Self::Stopped,
            "NOT_YET_RECRUITING" | "APPROVED_FOR_MARKETING" => Self::Planned,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Active => "ACTIVE",
            Self::Stopped => "STOPPED",
            Self::Planned => "PLANNED",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Sponsor agency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgencyClass {
    Industry,
    Nih,
    Other,
    Unknown,
}

impl AgencyClass {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return Self::Unknown };
        match raw.trim().to_ascii_uppercase().as_str() {
            "INDUSTRY" => Self::Industry,
            "NIH" => Self::Nih,
            "OTHER" | "OTHER_GOV" | "FED" | "NETWORK" | "INDIV" => Self::Other,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "INDUSTRY",
            Self::Nih => "NIH",
            Self::Other => "OTHER",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Intervention type. Only drugs and biologicals become Drug nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionType {
    Drug,
    Biological,
}

impl InterventionType {
    /// Parse a raw intervention-type string. `None` means the
    /// intervention is out of scope (device, procedure, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DRUG" => Some(Self::Drug),
            "BIOLOGICAL" => Some(Self::Biological),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drug => "DRUG",
            Self::Biological => "BIOLOGICAL",
        }
    }
}

/// Role of a sponsor row relative to its trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorRole {
    Lead,
    Collaborator,
}

/// One study row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub nct_id: String,
    #[serde(default)]
    pub brief_title: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub overall_status: Option<String>,
    #[serde(default)]
    pub enrollment: Option<i64>,
    #[serde(default)]
    pub number_of_arms: Option<i64>,
    #[serde(default)]
    pub is_fda_regulated_drug: Option<bool>,
}

/// One sponsor link row (lead or collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorRecord {
    pub nct_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub agency_class: Option<String>,
    pub role: SponsorRole,
}

/// One intervention row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub nct_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub intervention_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One condition link row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub nct_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub downcase_name: Option<String>,
}

/// One design-group row. Only the description is consumed, as a
/// secondary text source for route extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignGroupRecord {
    pub nct_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A snapshot batch: everything the extractor pulled at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBatch {
    /// When the source snapshot was taken.
    pub snapshot_at: DateTime<Utc>,
    #[serde(default)]
    pub studies: Vec<StudyRecord>,
    #[serde(default)]
    pub sponsors: Vec<SponsorRecord>,
    #[serde(default)]
    pub interventions: Vec<InterventionRecord>,
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
    #[serde(default)]
    pub design_groups: Vec<DesignGroupRecord>,
}

impl RecordBatch {
    /// An empty batch stamped now. Mostly useful in tests.
    pub fn empty() -> Self {
        Self {
            snapshot_at: Utc::now(),
            studies: Vec::new(),
            sponsors: Vec::new(),
            interventions: Vec::new(),
            conditions: Vec::new(),
            design_groups: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parsing_covers_registry_vocabulary() {
        assert_eq!(Phase::parse(Some("PHASE2")), Phase::Phase2);
        assert_eq!(Phase::parse(Some("phase1/phase2")), Phase::Phase1Phase2);
        assert_eq!(Phase::parse(Some("EARLY_PHASE1")), Phase::EarlyPhase1);
        assert_eq!(Phase::parse(Some("NA")), Phase::Unknown);
        assert_eq!(Phase::parse(None), Phase::Unknown);
    }

    #[test]
    fn status_categories_match_registry_groups() {
        assert_eq!(StatusCategory::categorize(Some("COMPLETED")), StatusCategory::Completed);
        assert_eq!(StatusCategory::categorize(Some("Recruiting")), StatusCategory::Active);
        assert_eq!(StatusCategory::categorize(Some("WITHDRAWN")), StatusCategory::Stopped);
        assert_eq!(StatusCategory::categorize(Some("NOT_YET_RECRUITING")), StatusCategory::Planned);
        assert_eq!(StatusCategory::categorize(Some("UNKNOWN_STATUS")), StatusCategory::Other);
        assert_eq!(StatusCategory::categorize(None), StatusCategory::Unknown);
    }

    #[test]
    fn only_drugs_and_biologicals_are_in_scope() {
        assert_eq!(InterventionType::parse("DRUG"), Some(InterventionType::Drug));
        assert_eq!(InterventionType::parse("biological"), Some(InterventionType::Biological));
        assert_eq!(InterventionType::parse("DEVICE"), None);
        assert_eq!(InterventionType::parse("PROCEDURE"), None);
    }

    #[test]
    fn record_batch_deserializes_with_missing_sections() {
        let json = r#"{"snapshot_at":"2024-03-01T00:00:00Z","studies":[{"nct_id":"NCT00000001"}]}"#;
        let batch: RecordBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.studies.len(), 1);
        assert!(batch.sponsors.is_empty());
        assert!(batch.studies[0].brief_title.is_none());
    }
}
