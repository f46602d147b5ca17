//! Prompt text for the LLM producer.

use std::fmt::Write as _;

use crate::classify::ClassificationReport;
use crate::types::ParsedHunk;

const INSTRUCTIONS: &str = r#"You are reviewing a code change. Group its diff hunks into sections that tell the story of the change, in the order a reviewer should read them.

Respond with a single JSON object and nothing else: no prose, no code fences.

The object has this shape:
{
  "title": "<short title for the whole change>",
  "sections": [
    {
      "id": "<unique section id>",
      "narrative": "<what this group of hunks does and why>",
      "hunks": [
        { "id": "<hunk id from the list below>", "importance": "high" | "medium" | "low" }
      ]
    }
  ]
}

Rules:
- Order sections as a narrative: foundations first, then the code that builds on them.
- Reference every hunk id listed below exactly once, across all sections. Do not invent ids.
- Importance must be exactly one of "high", "medium" or "low".
- Section ids must be unique.
- Refer to hunks only by id. Do not copy, shorten or truncate diff content.
"#;

/// Builds the first-attempt prompt: instructions, the hunk id list, then the
/// raw diff.
pub fn build_prompt(diff: &str, hunks: &[ParsedHunk]) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + diff.len() + hunks.len() * 32);
    prompt.push_str(INSTRUCTIONS);
    push_hunk_list(&mut prompt, hunks);
    prompt.push_str("\nDiff:\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt
}

/// Builds the retry prompt after a classification failed validation. It
/// restates the rule and names what went wrong last time.
pub fn build_retry_prompt(diff: &str, hunks: &[ParsedHunk], report: &ClassificationReport) -> String {
    let mut prompt = build_prompt(diff, hunks);
    prompt.push_str(
        "\nYour previous answer was rejected. Every hunk id must appear exactly once, \
         with importance \"high\", \"medium\" or \"low\".\n",
    );
    push_id_list(&mut prompt, "Hunk ids you left out", &report.missing_ids);
    push_id_list(&mut prompt, "Hunk ids you used more than once", &report.duplicate_ids);
    push_id_list(&mut prompt, "Hunk ids with an invalid importance", &report.invalid_importance);
    push_id_list(&mut prompt, "Ids that do not exist", &report.unknown_ids);
    prompt
}

fn push_hunk_list(prompt: &mut String, hunks: &[ParsedHunk]) {
    let _ = writeln!(prompt, "\nHunk ids ({}):", hunks.len());
    for hunk in hunks {
        let _ = writeln!(prompt, "- {}", hunk.id);
    }
}

fn push_id_list(prompt: &mut String, heading: &str, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    let _ = writeln!(prompt, "{heading}: {}", ids.join(", "));
}
