use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One narrated, importance-tagged diff summary for one working directory.
///
/// The JSON form is identical on the wire (HTTP, MCP) and on disk. Keys are
/// camelCase; `createdAt` is RFC 3339 and optional on read. Mutation is
/// whole-object replacement: a new review for the same directory overwrites
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Canonical absolute path (no trailing separator, symlinks resolved).
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub title: String,
    /// Set by ingest to the clock's "now" when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A narrative paragraph plus an ordered group of hunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Producer-chosen opaque id, unique within the review.
    #[serde(default)]
    pub id: String,
    /// Free prose; multi-line text is preserved verbatim.
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub hunks: Vec<Hunk>,
    /// Optional grouping of sections into chapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
}

/// One contiguous diff region attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunk {
    /// Repository-relative path from the `b/` side of the diff header.
    pub file: String,
    /// 1-based line number on the post-change side.
    pub start_line: u32,
    /// Full unified-diff text for the hunk, `@@` header first. Byte-for-byte.
    pub diff: String,
    /// `high`, `medium` or `low`; empty only on legacy reads.
    #[serde(default)]
    pub importance: String,
}

impl Review {
    /// Iterates every hunk of every section in review order.
    pub fn hunks(&self) -> impl Iterator<Item = &Hunk> {
        self.sections.iter().flat_map(|s| s.hunks.iter())
    }

    /// Total number of hunks across all sections.
    pub fn hunk_count(&self) -> usize {
        self.sections.iter().map(|s| s.hunks.len()).sum()
    }
}

/// The canonical importance vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl Importance {
    /// Canonical lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Importance::High => "high",
            Importance::Medium => "medium",
            Importance::Low => "low",
        }
    }

    /// Parses a raw importance, accepting the alias map case-insensitively.
    ///
    /// `critical|important` → high, `moderate|normal` → medium,
    /// `minor|trivial` → low. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "important" => Some(Importance::High),
            "medium" | "moderate" | "normal" => Some(Importance::Medium),
            "low" | "minor" | "trivial" => Some(Importance::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes an importance string to its canonical form, or `""` when the
/// value is not recognized.
pub fn normalize_importance(raw: &str) -> &'static str {
    Importance::parse(raw).map(Importance::as_str).unwrap_or("")
}

/// An identified hunk parsed from raw unified-diff output.
///
/// Lives only for the duration of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHunk {
    /// `"<file>::<startLine>"`, suffixed `#N` (N ≥ 2) on collision.
    pub id: String,
    pub file: String,
    pub start_line: u32,
    pub diff: String,
}

impl ParsedHunk {
    /// Converts into a stored hunk carrying the given canonical importance.
    pub fn to_hunk(&self, importance: Importance) -> Hunk {
        Hunk {
            file: self.file.clone(),
            start_line: self.start_line,
            diff: self.diff.clone(),
            importance: importance.as_str().to_owned(),
        }
    }
}

/// The JSON object the LLM is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<LlmSection>,
}

/// A section as classified by the LLM: hunks are referenced by id only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub hunks: Vec<LlmHunkRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmHunkRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub importance: String,
}

/// Builds keys of the form `"<file>::<startLine>"` with `#N` suffixes for
/// repeated occurrences, in input order.
///
/// Shared by the diff parser (hunk ids) and the progress database (hunk
/// marks) so both sides agree on identity.
pub struct HunkKeyer {
    seen: std::collections::HashMap<String, u32>,
}

impl HunkKeyer {
    pub fn new() -> Self {
        Self { seen: std::collections::HashMap::new() }
    }

    /// Returns the next key for `(file, start_line)`.
    pub fn key(&mut self, file: &str, start_line: u32) -> String {
        let base = format!("{file}::{start_line}");
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}#{count}")
        }
    }
}

impl Default for HunkKeyer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_aliases_normalize() {
        assert_eq!(normalize_importance("Critical"), "high");
        assert_eq!(normalize_importance("IMPORTANT"), "high");
        assert_eq!(normalize_importance("normal"), "medium");
        assert_eq!(normalize_importance(" moderate "), "medium");
        assert_eq!(normalize_importance("trivial"), "low");
        assert_eq!(normalize_importance("Low"), "low");
        assert_eq!(normalize_importance("urgent"), "");
        assert_eq!(normalize_importance(""), "");
    }

    #[test]
    fn review_json_uses_camel_case_keys() {
        let review = Review {
            working_directory: "/tmp/proj".into(),
            title: "Demo".into(),
            created_at: None,
            sections: vec![Section {
                id: "s1".into(),
                narrative: "line one\nline two".into(),
                hunks: vec![Hunk {
                    file: "main.x".into(),
                    start_line: 10,
                    diff: "@@ -10,1 +10,2 @@\n line\n+hi".into(),
                    importance: "low".into(),
                }],
                chapter_id: None,
            }],
        };
        let json = serde_json::to_string(&review).unwrap();
        assert!(json.contains("\"workingDirectory\":\"/tmp/proj\""));
        assert!(json.contains("\"startLine\":10"));
        assert!(!json.contains("createdAt"));
        assert!(!json.contains("chapterId"));
    }

    #[test]
    fn legacy_hunk_without_importance_reads_as_empty() {
        let hunk: Hunk =
            serde_json::from_str(r#"{"file":"a.rs","startLine":3,"diff":"@@ -1 +3 @@"}"#).unwrap();
        assert_eq!(hunk.importance, "");
    }

    #[test]
    fn keyer_disambiguates_repeats() {
        let mut keys = HunkKeyer::new();
        assert_eq!(keys.key("f", 10), "f::10");
        assert_eq!(keys.key("f", 10), "f::10#2");
        assert_eq!(keys.key("g", 10), "g::10");
        assert_eq!(keys.key("f", 10), "f::10#3");
    }
}
