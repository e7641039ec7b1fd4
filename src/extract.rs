//! Attribute extraction from free text
//!
//! Route of administration and dosage form rarely arrive as structured
//! columns; they hide in intervention names, descriptions, and arm
//! descriptions. Extraction scans candidate text fields in priority
//! order against a fixed, ordered rule table. The first field with any
//! match wins, and within a field the first matching rule wins, so rule
//! order is part of the contract: specific patterns ("intravenous") sit
//! above patterns that only imply a value ("tablet" implies oral).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Controlled vocabulary for route of administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Oral,
    Intravenous,
    Intramuscular,
    Subcutaneous,
    Topical,
    Inhalation,
    Ophthalmic,
    Nasal,
    Rectal,
    Transdermal,
    Intrathecal,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oral => "ORAL",
            Self::Intravenous => "INTRAVENOUS",
            Self::Intramuscular => "INTRAMUSCULAR",
            Self::Subcutaneous => "SUBCUTANEOUS",
            Self::Topical => "TOPICAL",
            Self::Inhalation => "INHALATION",
            Self::Ophthalmic => "OPHTHALMIC",
            Self::Nasal => "NASAL",
            Self::Rectal => "RECTAL",
            Self::Transdermal => "TRANSDERMAL",
            Self::Intrathecal => "INTRATHECAL",
        }
    }
}

/// Controlled vocabulary for dosage form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DosageForm {
    Tablet,
    Capsule,
    Injection,
    Solution,
    Suspension,
    Cream,
    Ointment,
    Gel,
    Drops,
    Spray,
    Patch,
    Implant,
    Powder,
    Suppository,
    Inhaler,
    Nebulizer,
    Infusion,
}

impl DosageForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tablet => "TABLET",
            Self::Capsule => "CAPSULE",
            Self::Injection => "INJECTION",
            Self::Solution => "SOLUTION",
            Self::Suspension => "SUSPENSION",
            Self::Cream => "CREAM",
            Self::Ointment => "OINTMENT",
            Self::Gel => "GEL",
            Self::Drops => "DROPS",
            Self::Spray => "SPRAY",
            Self::Patch => "PATCH",
            Self::Implant => "IMPLANT",
            Self::Powder => "POWDER",
            Self::Suppository => "SUPPOSITORY",
            Self::Inhaler => "INHALER",
            Self::Nebulizer => "NEBULIZER",
            Self::Infusion => "INFUSION",
        }
    }
}

fn rule<T: Copy>(pattern: &str, value: T) -> (Regex, T) {
    (
        Regex::new(pattern).expect("extraction pattern is valid"),
        value,
    )
}

// Ordered route rules. Explicit route terms first; form-implied rules
// (a tablet is oral) last so they never shadow an explicit mention.
static ROUTE_RULES: LazyLock<Vec<(Regex, Route)>> = LazyLock::new(|| {
    vec![
        rule(r"(?i)\b(?:intravenous(?:ly)?|i\.v\.|iv|infusion|infused)\b", Route::Intravenous),
        rule(r"(?i)\b(?:intramuscular(?:ly)?|i\.m\.|im)\b", Route::Intramuscular),
        rule(r"(?i)\b(?:subcutaneous(?:ly)?|s\.c\.|subq|sub-q)\b", Route::Subcutaneous),
        rule(r"(?i)\b(?:intrathecal(?:ly)?|spinal)\b", Route::Intrathecal),
        rule(r"(?i)\b(?:ophthalmic|ocular|eye\s*drops?|intravitreal|intraocular)\b", Route::Ophthalmic),
        rule(r"(?i)\b(?:nasal|intranasal|nose\s*spray)\b", Route::Nasal),
        rule(r"(?i)\b(?:rectal(?:ly)?|suppositor(?:y|ies)|enema|per\s*rectum)\b", Route::Rectal),
        rule(r"(?i)\b(?:transdermal|patch(?:es)?)\b", Route::Transdermal),
        rule(r"(?i)\b(?:inhal(?:ation|ed|er|ers)?|nebuliz(?:er|ed|ation)?|aerosol(?:ized)?|puff|metered[\s-]dose)\b", Route::Inhalation),
        rule(r"(?i)\b(?:topical(?:ly)?|cream|ointment|lotion)\b", Route::Topical),
        rule(r"(?i)\b(?:oral(?:ly)?|per\s*os|p\.o\.|by\s*mouth)\b", Route::Oral),
        // Form-implied: these dosage forms are taken by mouth.
        rule(r"(?i)\b(?:tablets?|capsules?|pills?|syrup)\b", Route::Oral),
    ]
});

// Ordered dosage-form rules. Compound phrases ("solution for infusion")
// resolve to the more specific form because INFUSION sits above SOLUTION.
static FORM_RULES: LazyLock<Vec<(Regex, DosageForm)>> = LazyLock::new(|| {
    vec![
        rule(r"(?i)\b(?:suppositor(?:y|ies))\b", DosageForm::Suppository),
        rule(r"(?i)\b(?:inhaler|inhalers|puffer)\b", DosageForm::Inhaler),
        rule(r"(?i)\b(?:nebuliz(?:er|ed)|nebulis(?:er|ed))\b", DosageForm::Nebulizer),
        rule(r"(?i)\b(?:infusions?|iv\s*bag)\b", DosageForm::Infusion),
        rule(r"(?i)\b(?:injections?|injectable|injected)\b", DosageForm::Injection),
        rule(r"(?i)\b(?:tablets?|tabs?)\b", DosageForm::Tablet),
        rule(r"(?i)\b(?:capsules?|caps?)\b", DosageForm::Capsule),
        rule(r"(?i)\b(?:patch(?:es)?)\b", DosageForm::Patch),
        rule(r"(?i)\b(?:creams?)\b", DosageForm::Cream),
        rule(r"(?i)\b(?:ointments?)\b", DosageForm::Ointment),
        rule(r"(?i)\b(?:gels?)\b", DosageForm::Gel),
        rule(r"(?i)\b(?:drops?|eye\s*drops?)\b", DosageForm::Drops),
        rule(r"(?i)\b(?:sprays?|nasal\s*spray)\b", DosageForm::Spray),
        rule(r"(?i)\b(?:implants?)\b", DosageForm::Implant),
        rule(r"(?i)\b(?:powders?)\b", DosageForm::Powder),
        rule(r"(?i)\b(?:suspensions?)\b", DosageForm::Suspension),
        rule(r"(?i)\b(?:solutions?|liquid)\b", DosageForm::Solution),
    ]
});

fn first_match<T: Copy>(
    rules: &[(Regex, T)],
    fields: impl IntoIterator<Item = Option<impl AsRef<str>>>,
) -> Option<T> {
    for field in fields {
        let Some(text) = field else { continue };
        let text = text.as_ref();
        if text.trim().is_empty() {
            continue;
        }
        for (pattern, value) in rules {
            if pattern.is_match(text) {
                return Some(*value);
            }
        }
    }
    None
}

/// Extract a route of administration from candidate text fields, in
/// priority order. Absent is a normal outcome, not an error.
pub fn extract_route(
    fields: impl IntoIterator<Item = Option<impl AsRef<str>>>,
) -> Option<Route> {
    first_match(&ROUTE_RULES, fields)
}

/// Extract a dosage form from candidate text fields, in priority order.
pub fn extract_dosage_form(
    fields: impl IntoIterator<Item = Option<impl AsRef<str>>>,
) -> Option<DosageForm> {
    first_match(&FORM_RULES, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_of(text: &str) -> Option<Route> {
        extract_route([Some(text)])
    }

    fn form_of(text: &str) -> Option<DosageForm> {
        extract_dosage_form([Some(text)])
    }

    #[test]
    fn intravenous_text_extracts() {
        assert_eq!(route_of("administered intravenously"), Some(Route::Intravenous));
        assert_eq!(route_of("given as an IV infusion over 30 minutes"), Some(Route::Intravenous));
    }

    #[test]
    fn oral_tablet_extracts_both_attributes() {
        assert_eq!(route_of("oral tablet"), Some(Route::Oral));
        assert_eq!(form_of("oral tablet"), Some(DosageForm::Tablet));
    }

    #[test]
    fn unrecognized_text_yields_absent() {
        assert_eq!(route_of("a randomized placebo-controlled study"), None);
        assert_eq!(form_of("a randomized placebo-controlled study"), None);
    }

    #[test]
    fn matching_respects_word_boundaries() {
        // "im" inside "imaging" or "oral" inside "behavioral" must not match.
        assert_eq!(route_of("imaging follow-up"), None);
        assert_eq!(route_of("behavioral intervention"), None);
        assert_eq!(route_of("ivermectin follow-up"), None);
    }

    #[test]
    fn specific_routes_beat_form_implied_oral() {
        // A subcutaneously injected solution is not oral even though
        // "solution" appears in the ORAL form-implied vocabulary.
        assert_eq!(
            route_of("subcutaneous injection, supplied as tablets for the comparator arm"),
            Some(Route::Subcutaneous)
        );
    }

    #[test]
    fn first_field_with_a_match_wins() {
        let description = Some("once-daily oral dosing");
        let name = Some("drug X intravenous kit");
        // Description has priority; the name is never consulted.
        assert_eq!(extract_route([description, name]), Some(Route::Oral));
        // Without a description match, the name decides.
        assert_eq!(
            extract_route([Some("dose escalation cohort"), name]),
            Some(Route::Intravenous)
        );
        assert_eq!(extract_route([None::<&str>, name]), Some(Route::Intravenous));
    }

    #[test]
    fn compound_form_phrases_resolve_to_the_specific_form() {
        assert_eq!(form_of("solution for infusion"), Some(DosageForm::Infusion));
        assert_eq!(form_of("powder for oral suspension"), Some(DosageForm::Powder));
    }

    #[test]
    fn route_vocabulary_coverage() {
        assert_eq!(route_of("intramuscular injection"), Some(Route::Intramuscular));
        assert_eq!(route_of("applied topically twice daily"), Some(Route::Topical));
        assert_eq!(route_of("dry powder inhaler"), Some(Route::Inhalation));
        assert_eq!(route_of("intravitreal injection"), Some(Route::Ophthalmic));
        assert_eq!(route_of("intranasal spray"), Some(Route::Nasal));
        assert_eq!(route_of("rectal suppository"), Some(Route::Rectal));
        assert_eq!(route_of("transdermal patch"), Some(Route::Transdermal));
        assert_eq!(route_of("intrathecal administration"), Some(Route::Intrathecal));
    }
}
