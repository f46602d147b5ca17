//! Classification validator: every parsed hunk must appear in exactly one
//! section of the LLM response, with a recognized importance.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{normalize_importance, LlmResponse, ParsedHunk};

/// Outcome of checking an LLM classification against the parsed input hunks.
///
/// `valid` holds iff `missing_ids`, `duplicate_ids` and `invalid_importance`
/// are all empty. `unknown_ids` lists references to ids no parsed hunk has;
/// they are reported for diagnostics and skipped during assembly, but do not
/// make the classification invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    pub valid: bool,
    /// Input ids never referenced, in input order.
    #[serde(rename = "missingIDs")]
    pub missing_ids: Vec<String>,
    /// Ids referenced more than once, in order of first reference.
    #[serde(rename = "duplicateIDs")]
    pub duplicate_ids: Vec<String>,
    /// Ids whose importance does not normalize, in reference order.
    pub invalid_importance: Vec<String>,
    #[serde(rename = "unknownIDs")]
    pub unknown_ids: Vec<String>,
}

impl ClassificationReport {
    /// Whether the partial-proceed path may accept this report: only missing
    /// ids are tolerated.
    pub fn allows_partial(&self) -> bool {
        self.duplicate_ids.is_empty() && self.invalid_importance.is_empty()
    }
}

/// Validates `response` against the parsed input hunks.
pub fn validate(input: &[ParsedHunk], response: &LlmResponse) -> ClassificationReport {
    let in_ids: HashSet<&str> = input.iter().map(|h| h.id.as_str()).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut duplicate_ids = Vec::new();
    let mut invalid_importance = Vec::new();
    let mut unknown_ids = Vec::new();

    for hunk_ref in response.sections.iter().flat_map(|s| s.hunks.iter()) {
        let id = hunk_ref.id.as_str();
        let seen = counts.entry(id).or_insert(0);
        *seen += 1;
        if *seen == 2 {
            duplicate_ids.push(id.to_owned());
        }
        if normalize_importance(&hunk_ref.importance).is_empty() {
            invalid_importance.push(id.to_owned());
        }
        if *seen == 1 && !in_ids.contains(id) {
            unknown_ids.push(id.to_owned());
        }
    }

    let missing_ids: Vec<String> = input
        .iter()
        .filter(|h| !counts.contains_key(h.id.as_str()))
        .map(|h| h.id.clone())
        .collect();

    let valid = missing_ids.is_empty() && duplicate_ids.is_empty() && invalid_importance.is_empty();
    ClassificationReport { valid, missing_ids, duplicate_ids, invalid_importance, unknown_ids }
}
