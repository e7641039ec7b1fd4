//! Entity resolution: raw occurrences to canonical records
//!
//! Every raw organization/drug/condition mention across a batch funnels
//! through here. The resolver interns occurrences by dedup key in a
//! single consolidation pass — one writer, plain maps, no shared
//! state — and refines each canonical record as better variants show
//! up. An occurrence with unusable text resolves to the sentinel
//! unknown entity and bumps a data-quality counter instead of failing.

use std::collections::HashMap;

use crate::normalize::{
    normalize_condition, normalize_drug, normalize_organization, prefer_display, NormalizedName,
    UNKNOWN_KEY,
};
use crate::record::{AgencyClass, InterventionType};

/// Canonical organization record for one dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationEntity {
    pub key: String,
    pub name: String,
    pub agency_class: AgencyClass,
}

/// Canonical drug record for one dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugEntity {
    pub key: String,
    pub name: String,
    pub intervention_type: InterventionType,
}

/// Canonical condition record for one dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEntity {
    pub key: String,
    pub name: String,
}

/// Single-writer consolidation of raw entity occurrences.
#[derive(Debug, Default)]
pub struct EntityResolver {
    organizations: HashMap<String, OrganizationEntity>,
    drugs: HashMap<String, DrugEntity>,
    conditions: HashMap<String, ConditionEntity>,
    unresolved: u64,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occurrences that could not be resolved to a real entity.
    pub fn unresolved_count(&self) -> u64 {
        self.unresolved
    }

    /// Resolve a raw organization occurrence, returning its dedup key.
    pub fn resolve_organization(&mut self, raw: Option<&str>, agency_class: AgencyClass) -> String {
        let normalized = normalize_organization(raw.unwrap_or(""));
        if normalized.is_unknown() {
            self.unresolved += 1;
        }
        let entry = self
            .organizations
            .entry(normalized.key.clone())
            .or_insert_with(|| OrganizationEntity {
                key: normalized.key.clone(),
                name: normalized.display.clone(),
                agency_class,
            });
        refine_display(&mut entry.name, &normalized);
        // A known class never regresses to unknown.
        if !entry.agency_class.is_known() && agency_class.is_known() {
            entry.agency_class = agency_class;
        }
        normalized.key
    }

    /// Resolve a raw drug occurrence, returning its dedup key.
    pub fn resolve_drug(&mut self, raw: Option<&str>, intervention_type: InterventionType) -> String {
        let normalized = normalize_drug(raw.unwrap_or(""));
        if normalized.is_unknown() {
            self.unresolved += 1;
        }
        let entry = self
            .drugs
            .entry(normalized.key.clone())
            .or_insert_with(|| DrugEntity {
                key: normalized.key.clone(),
                name: normalized.display.clone(),
                intervention_type,
            });
        refine_display(&mut entry.name, &normalized);
        normalized.key
    }

    /// Resolve a raw condition occurrence, returning its dedup key.
    /// `downcase` is the source-provided lowercase column; the raw name
    /// is the fallback when it is missing.
    pub fn resolve_condition(&mut self, raw: Option<&str>, downcase: Option<&str>) -> String {
        let key_source = downcase
            .filter(|s| !s.trim().is_empty())
            .or(raw)
            .unwrap_or("");
        let key = normalize_condition(key_source).key;
        if key == UNKNOWN_KEY {
            self.unresolved += 1;
        }
        let display = normalize_condition(
            raw.filter(|s| !s.trim().is_empty()).unwrap_or(key_source),
        );
        let entry = self
            .conditions
            .entry(key.clone())
            .or_insert_with(|| ConditionEntity {
                key: key.clone(),
                name: display.display.clone(),
            });
        refine_display(&mut entry.name, &display);
        key
    }

    pub fn organizations(&self) -> impl Iterator<Item = &OrganizationEntity> {
        self.organizations.values()
    }

    pub fn drugs(&self) -> impl Iterator<Item = &DrugEntity> {
        self.drugs.values()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &ConditionEntity> {
        self.conditions.values()
    }
}

fn refine_display(current: &mut String, candidate: &NormalizedName) {
    if !candidate.is_unknown() && prefer_display(current, &candidate.display) {
        *current = candidate.display.clone();
    }
}
