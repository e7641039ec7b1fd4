//! Graph assembly: record batch to change-set
//!
//! Consumes one snapshot batch, runs resolution and extraction, and
//! produces the change-set the loader applies. Per-trial validation
//! failures (missing identifier, multiple lead sponsors) exclude the
//! trial and all of its facts; everything else in the batch still
//! assembles. The output is order-independent by construction.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::extract::{extract_dosage_form, extract_route};
use crate::graph::{ChangeSet, EdgeType, EdgeUpsert, NodeType, NodeUpsert};
use crate::record::{AgencyClass, InterventionType, Phase, RecordBatch, SponsorRole, StatusCategory};
use crate::report::QualityReport;
use crate::resolve::EntityResolver;

/// Change-set plus the data-quality counters gathered while building it.
#[derive(Debug, Default)]
pub struct AssembleOutput {
    pub change_set: ChangeSet,
    pub quality: QualityReport,
}

/// Per-(trial, drug) accumulator for INVESTIGATES edge attributes.
/// Richer-value-wins per field: a present value fills an absent slot;
/// a conflicting present value loses to the first-seen one and is
/// recorded as an anomaly.
#[derive(Debug, Default, Clone)]
struct InvestigatesFacts {
    route: Option<&'static str>,
    dosage_form: Option<&'static str>,
}

fn merge_attribute(
    slot: &mut Option<&'static str>,
    incoming: Option<&'static str>,
    conflicts: &mut usize,
) {
    match (*slot, incoming) {
        (None, Some(value)) => *slot = Some(value),
        (Some(current), Some(value)) if current != value => *conflicts += 1,
        _ => {}
    }
}

/// Assemble one snapshot batch into a change-set.
pub fn assemble(batch: &RecordBatch) -> AssembleOutput {
    let mut quality = QualityReport::default();
    let mut change_set = ChangeSet::new();
    let mut resolver = EntityResolver::new();

    quality.trials_in = batch.studies.len();

    // Lead-sponsor keys per trial, resolved up front so multi-lead
    // validation can compare dedup identities rather than raw strings.
    let mut leads_by_trial: HashMap<&str, Vec<String>> = HashMap::new();
    for sponsor in &batch.sponsors {
        if sponsor.role == SponsorRole::Lead {
            let key = resolver.resolve_organization(
                sponsor.name.as_deref(),
                AgencyClass::parse(sponsor.agency_class.as_deref()),
            );
            leads_by_trial
                .entry(sponsor.nct_id.trim())
                .or_default()
                .push(key);
        }
    }

    // Validate trials and emit their nodes.
    let mut valid_trials: HashSet<&str> = HashSet::new();
    for study in &batch.studies {
        let nct_id = study.nct_id.trim();
        if nct_id.is_empty() {
            quality.trials_rejected += 1;
            warn!("study row without an identifier, skipping");
            continue;
        }
        let distinct_leads: HashSet<&String> = leads_by_trial
            .get(nct_id)
            .map(|keys| keys.iter().collect())
            .unwrap_or_default();
        if distinct_leads.len() > 1 {
            quality.trials_rejected += 1;
            quality.rejected_trials.push(nct_id.to_string());
            warn!(nct_id, leads = distinct_leads.len(), "multiple lead sponsors, rejecting trial");
            continue;
        }
        if !valid_trials.insert(nct_id) {
            // Same identifier twice in one batch: keep the first row.
            quality.duplicate_facts += 1;
            continue;
        }

        let phase = Phase::parse(study.phase.as_deref());
        let status_category = StatusCategory::categorize(study.overall_status.as_deref());
        change_set.upsert_node(
            NodeUpsert::new(NodeType::Trial, nct_id)
                .with_optional("brief_title", study.brief_title.as_deref())
                .with_property("phase", phase.as_str())
                .with_optional("overall_status", study.overall_status.as_deref())
                .with_property("status_category", status_category.as_str())
                .with_optional("enrollment", study.enrollment)
                .with_optional("number_of_arms", study.number_of_arms)
                .with_optional("is_fda_regulated_drug", study.is_fda_regulated_drug),
        );
    }

    // Sponsor links.
    let mut seen_collaborations: HashSet<(String, String)> = HashSet::new();
    for sponsor in &batch.sponsors {
        let nct_id = sponsor.nct_id.trim();
        if !valid_trials.contains(nct_id) {
            quality.orphan_links += 1;
            continue;
        }
        let agency_class = AgencyClass::parse(sponsor.agency_class.as_deref());
        let org_key = resolver.resolve_organization(sponsor.name.as_deref(), agency_class);
        match sponsor.role {
            SponsorRole::Lead => {
                // Cardinality one is already guaranteed by validation;
                // re-upserting the same (type, from, to) is a no-op.
                change_set.upsert_edge(EdgeUpsert::new(EdgeType::SponsoredBy, nct_id, org_key));
            }
            SponsorRole::Collaborator => {
                if !seen_collaborations.insert((nct_id.to_string(), org_key.clone())) {
                    quality.duplicate_facts += 1;
                    continue;
                }
                change_set.upsert_edge(EdgeUpsert::new(
                    EdgeType::CollaboratesWith,
                    nct_id,
                    org_key,
                ));
            }
        }
    }

    // Design-group descriptions, joined per trial, feed route extraction
    // as a lower-priority text source than the intervention description.
    let mut design_descriptions: HashMap<&str, String> = HashMap::new();
    for group in &batch.design_groups {
        if let Some(desc) = group.description.as_deref() {
            if desc.trim().is_empty() {
                continue;
            }
            let joined = design_descriptions.entry(group.nct_id.trim()).or_default();
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(desc);
        }
    }

    // Interventions: resolve drugs and fold per-(trial, drug) facts.
    let mut investigates: HashMap<(String, String), InvestigatesFacts> = HashMap::new();
    for intervention in &batch.interventions {
        let Some(kind) = InterventionType::parse(&intervention.intervention_type) else {
            quality.interventions_skipped += 1;
            continue;
        };
        let nct_id = intervention.nct_id.trim();
        if !valid_trials.contains(nct_id) {
            quality.orphan_links += 1;
            continue;
        }
        quality.interventions_in += 1;

        let drug_key = resolver.resolve_drug(intervention.name.as_deref(), kind);

        let design_desc = design_descriptions.get(nct_id).map(String::as_str);
        let route = extract_route([
            intervention.description.as_deref(),
            design_desc,
            intervention.name.as_deref(),
        ]);
        let dosage_form = extract_dosage_form([
            intervention.description.as_deref(),
            intervention.name.as_deref(),
        ]);
        if route.is_some() {
            quality.routes_extracted += 1;
        }
        if dosage_form.is_some() {
            quality.dosage_forms_extracted += 1;
        }

        let slot = investigates
            .entry((nct_id.to_string(), drug_key))
            .or_default();
        merge_attribute(
            &mut slot.route,
            route.map(|r| r.as_str()),
            &mut quality.attribute_conflicts,
        );
        merge_attribute(
            &mut slot.dosage_form,
            dosage_form.map(|f| f.as_str()),
            &mut quality.attribute_conflicts,
        );
    }
    for ((nct_id, drug_key), facts) in investigates {
        change_set.upsert_edge(
            EdgeUpsert::new(EdgeType::Investigates, nct_id, drug_key)
                .with_optional("route", facts.route)
                .with_optional("dosage_form", facts.dosage_form),
        );
    }

    // Condition links.
    for condition in &batch.conditions {
        let nct_id = condition.nct_id.trim();
        if !valid_trials.contains(nct_id) {
            quality.orphan_links += 1;
            continue;
        }
        let condition_key =
            resolver.resolve_condition(condition.name.as_deref(), condition.downcase_name.as_deref());
        if !change_set.upsert_edge(EdgeUpsert::new(EdgeType::Targets, nct_id, condition_key)) {
            quality.duplicate_facts += 1;
        }
    }

    // Entity nodes, from the consolidated resolver maps.
    for org in resolver.organizations() {
        change_set.upsert_node(
            NodeUpsert::new(NodeType::Organization, org.key.clone())
                .with_property("name", org.name.clone())
                .with_property("agency_class", org.agency_class.as_str()),
        );
    }
    for drug in resolver.drugs() {
        change_set.upsert_node(
            NodeUpsert::new(NodeType::Drug, drug.key.clone())
                .with_property("name", drug.name.clone())
                .with_property("intervention_type", drug.intervention_type.as_str()),
        );
    }
    for condition in resolver.conditions() {
        change_set.upsert_node(
            NodeUpsert::new(NodeType::Condition, condition.key.clone())
                .with_property("name", condition.name.clone()),
        );
    }
    quality.unresolved_names = resolver.unresolved_count() as usize;

    debug!(
        nodes = change_set.node_count(),
        edges = change_set.edge_count(),
        anomalies = quality.anomaly_count(),
        "assembled change-set"
    );

    AssembleOutput {
        change_set,
        quality,
    }
}
