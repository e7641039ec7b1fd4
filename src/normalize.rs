//! Key normalization for entity names
//!
//! Raw names are noisy: legal suffixes, stray commas, inconsistent
//! casing, dosage fragments embedded in drug names. Each normalizer is a
//! pure function producing a cleaned display name plus a case-folded
//! dedup key. The key is the merge identity everywhere downstream, so
//! the same raw input must always produce the same key.

use regex::Regex;
use std::sync::LazyLock;

/// Dedup key for empty or unusable names. Real keys are scrubbed down to
/// alphanumerics, spaces, and hyphens, so the underscores here can never
/// collide with one.
pub const UNKNOWN_KEY: &str = "__unknown__";

/// Display name paired with the sentinel key.
pub const UNKNOWN_DISPLAY: &str = "Unknown";

/// A cleaned display name and its dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    /// Cleaned, casing-preserving form for presentation.
    pub display: String,
    /// Case-folded, scrubbed merge identity.
    pub key: String,
}

impl NormalizedName {
    fn unknown() -> Self {
        Self {
            display: UNKNOWN_DISPLAY.to_string(),
            key: UNKNOWN_KEY.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.key == UNKNOWN_KEY
    }
}

// One trailing legal-entity suffix, optionally preceded by a comma.
// Applied repeatedly so stacked suffixes ("X Inc. Ltd.") all strip.
static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i),?\s*\b(?:incorporated|inc|limited|ltd|corporation|corp|l\.l\.c|llc|company|co|p\.l\.c|plc|gmbh|ag|s\.p\.a|s\.a|n\.v|b\.v)\.?$",
    )
    .expect("suffix pattern is valid")
});

// Dosage/strength fragments embedded in drug names: "10 mg", "100/5mg",
// "(250 mg)", "0.5%".
static DOSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*(?:\(\d+(?:\.\d+)?\s*(?:mg|mcg|µg|ml|iu|g|l|u|%)[^)]*\)|\d+(?:\.\d+)?\s*/\s*\d+(?:\.\d+)?\s*(?:mg|mcg|µg|ml|g)\b|\d+(?:\.\d+)?\s*(?:mg|mcg|µg|ml|iu|g|l|u)\b|\d+(?:\.\d+)?\s*%)",
    )
    .expect("dosage pattern is valid")
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("whitespace pattern is valid")
});

static TRAILING_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[,.\-]+$").expect("trailing punctuation pattern is valid")
});

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// Strip legal suffixes until none match, then drop punctuation the
/// removal left dangling.
fn strip_suffixes(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        let next = SUFFIX_RE.replace(&current, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    TRAILING_PUNCT_RE
        .replace(current.trim(), "")
        .trim()
        .to_string()
}

/// Case-fold and scrub a cleaned display name into a dedup key.
/// `keep_hyphens` preserves hyphens, which are significant in drug names
/// (compound identifiers like "AZD-1222").
fn scrub_key(display: &str, keep_hyphens: bool) -> String {
    let lowered = display.to_lowercase();
    let scrubbed: String = lowered
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || *c == ' ' || (keep_hyphens && *c == '-')
        })
        .collect();
    collapse_whitespace(&scrubbed)
}

/// Normalize an organization name.
///
/// Pipeline: collapse whitespace, strip legal suffixes to fixpoint, drop
/// trailing punctuation. The key is the case-folded, scrubbed result.
pub fn normalize_organization(raw: &str) -> NormalizedName {
    let display = strip_suffixes(&collapse_whitespace(raw));
    if display.is_empty() {
        return NormalizedName::unknown();
    }
    let key = scrub_key(&display, false);
    if key.is_empty() {
        return NormalizedName::unknown();
    }
    NormalizedName { display, key }
}

/// Normalize a drug name. Same pipeline as organizations plus removal of
/// embedded dosage fragments, which vary per trial but do not change the
/// drug's identity.
pub fn normalize_drug(raw: &str) -> NormalizedName {
    let collapsed = collapse_whitespace(raw);
    let without_dosage = DOSAGE_RE.replace_all(&collapsed, "");
    let display = TRAILING_PUNCT_RE
        .replace(collapse_whitespace(&without_dosage).as_str(), "")
        .trim()
        .to_string();
    if display.is_empty() {
        return NormalizedName::unknown();
    }
    let key = scrub_key(&display, true);
    if key.is_empty() {
        return NormalizedName::unknown();
    }
    NormalizedName { display, key }
}

/// Normalize a condition name: whitespace collapse and case folding only.
pub fn normalize_condition(raw: &str) -> NormalizedName {
    let display = collapse_whitespace(raw);
    if display.is_empty() {
        return NormalizedName::unknown();
    }
    let key = scrub_key(&display, true);
    if key.is_empty() {
        return NormalizedName::unknown();
    }
    NormalizedName { display, key }
}

/// Display-name quality ordering: a candidate replaces the current name
/// only when it is strictly more informative. Mixed-case beats all-caps,
/// then longer beats shorter. Ties keep the current (first-seen) value,
/// so resolution stays reproducible.
pub fn prefer_display(current: &str, candidate: &str) -> bool {
    if current.is_empty() {
        return !candidate.is_empty();
    }
    if candidate.is_empty() {
        return false;
    }
    display_quality(candidate) > display_quality(current)
}

fn display_quality(s: &str) -> (bool, usize) {
    let has_lower = s.chars().any(|c| c.is_lowercase());
    (has_lower, s.chars().count())
}
