use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use log::debug;
use regex::Regex;

use crate::models::{DraftTransaction, ExistingTransaction};

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Hand-tuned matching thresholds, named so boundary values can be
/// probed explicitly.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub amount_tolerance: f64,
    /// Word overlap over the smaller word set; strict duplicates.
    pub strict_similarity: f64,
    /// Word overlap over the larger word set; loose candidates. Looser
    /// threshold over a stricter denominator, since merge is
    /// user-confirmed rather than automatic.
    pub loose_similarity: f64,
    pub date_window_days: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.01,
            strict_similarity: 0.5,
            loose_similarity: 0.3,
            date_window_days: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Description similarity
// ---------------------------------------------------------------------------

fn installment_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r"\s*\(\d{1,3}/\d{1,3}\)\s*$").expect("static pattern"))
}

/// Lower-case and strip an installment suffix like "(1/12)" so series
/// members compare equal to their root description.
pub fn normalize_description(description: &str) -> String {
    installment_suffix()
        .replace(description, "")
        .trim()
        .to_lowercase()
}

fn word_set(normalized: &str) -> HashSet<&str> {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .collect()
}

fn overlap_counts(a: &str, b: &str) -> (usize, usize, usize) {
    let set_a = word_set(a);
    let set_b = word_set(b);
    let common = set_a.intersection(&set_b).count();
    (common, set_a.len(), set_b.len())
}

/// Word-overlap similarity over the smaller word set. Exact match after
/// normalization is 1.0 regardless of word content.
pub fn strict_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_description(a);
    let nb = normalize_description(b);
    if na == nb && !na.is_empty() {
        return 1.0;
    }
    let (common, len_a, len_b) = overlap_counts(&na, &nb);
    let smaller = len_a.min(len_b);
    if smaller == 0 {
        return 0.0;
    }
    common as f64 / smaller as f64
}

/// Word-overlap similarity over the larger word set.
pub fn loose_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_description(a);
    let nb = normalize_description(b);
    let (common, len_a, len_b) = overlap_counts(&na, &nb);
    let larger = len_a.max(len_b);
    if larger == 0 {
        return 0.0;
    }
    common as f64 / larger as f64
}

// ---------------------------------------------------------------------------
// Duplicate checks
// ---------------------------------------------------------------------------

/// Minimal comparable view of a transaction, so drafts and persisted
/// rows go through the same symmetric comparison.
#[derive(Debug, Clone, Copy)]
pub struct TxKey<'a> {
    pub date: NaiveDate,
    pub description: &'a str,
    pub amount: f64,
}

impl<'a> From<&'a DraftTransaction> for TxKey<'a> {
    fn from(t: &'a DraftTransaction) -> Self {
        Self {
            date: t.date,
            description: &t.description,
            amount: t.amount,
        }
    }
}

impl<'a> From<&'a ExistingTransaction> for TxKey<'a> {
    fn from(t: &'a ExistingTransaction) -> Self {
        Self {
            date: t.date,
            description: &t.description,
            amount: t.amount,
        }
    }
}

/// Inclusive tolerance check. A bare `<=` breaks at the boundary:
/// `100.01 - 100.00` lands just above 0.01 in f64, so an exact
/// one-cent difference would be rejected without the epsilon.
fn amounts_match(config: &MatchConfig, a: f64, b: f64) -> bool {
    (a - b).abs() <= config.amount_tolerance + 1e-9
}

/// Strict duplicate: same calendar month and year (day drift is
/// tolerated for recurring/installment entries), amounts within
/// tolerance, and descriptions similar enough. Symmetric.
pub fn is_strict_duplicate(config: &MatchConfig, a: TxKey, b: TxKey) -> bool {
    if a.date.year() != b.date.year() || a.date.month() != b.date.month() {
        return false;
    }
    if !amounts_match(config, a.amount, b.amount) {
        return false;
    }
    strict_similarity(a.description, b.description) >= config.strict_similarity
}

/// Map of draft index to the id of the first existing transaction it
/// duplicates. The caller decides: discard, force-import, or cancel.
pub fn find_strict_duplicates(
    config: &MatchConfig,
    drafts: &[DraftTransaction],
    existing: &[ExistingTransaction],
) -> HashMap<usize, i64> {
    let mut matches = HashMap::new();
    for (idx, draft) in drafts.iter().enumerate() {
        if let Some(hit) = existing
            .iter()
            .find(|e| is_strict_duplicate(config, draft.into(), (*e).into()))
        {
            debug!("draft #{idx} '{}' duplicates existing #{}", draft.description, hit.id);
            matches.insert(idx, hit.id);
        }
    }
    matches
}

/// Loose candidates for invoice-to-statement merging: amount within
/// tolerance, date within the window, weaker description overlap.
/// Ordered by date closeness, then similarity. Merge is offered, never
/// forced.
pub fn find_loose_candidates<'a>(
    config: &MatchConfig,
    draft: &DraftTransaction,
    existing: &'a [ExistingTransaction],
) -> Vec<&'a ExistingTransaction> {
    let mut candidates: Vec<(&ExistingTransaction, i64, f64)> = existing
        .iter()
        .filter_map(|e| {
            if !amounts_match(config, draft.amount, e.amount) {
                return None;
            }
            let days = (draft.date - e.date).num_days().abs();
            if days > config.date_window_days {
                return None;
            }
            let similarity = loose_similarity(&draft.description, &e.description);
            if similarity < config.loose_similarity {
                return None;
            }
            Some((e, days, similarity))
        })
        .collect();
    candidates.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then(b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal))
    });
    candidates.into_iter().map(|(e, _, _)| e).collect()
}
