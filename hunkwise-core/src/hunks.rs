//! Unified-diff hunk parser.
//!
//! Splits `git diff` output into addressable hunks keyed by
//! `"<file>::<startLine>"`. The parser is pure, never fails, and makes one
//! pass over the input: text without any `diff --git ` header yields no hunks.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{HunkKeyer, ParsedHunk};

/// `@@ -a[,b] +c[,d] @@`; count fields may be absent or empty.
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d*)? \+(\d+)(?:,\d*)? @@").expect("hunk header regex is valid")
});

const FILE_HEADER: &str = "diff --git ";

/// Parses raw unified-diff text into identified hunks, in input order.
///
/// Per-file blocks containing a `Binary files` marker are skipped. The file
/// path is the post-image side: the `+++ b/` line, else `rename to`, else
/// the `b/` half of the `diff --git` header. Renames report the new name. Each hunk's `diff` runs from its `@@` header up to
/// the next header or the end of the block, with one trailing newline
/// removed.
pub fn parse_hunks(diff: &str) -> Vec<ParsedHunk> {
    let mut keys = HunkKeyer::new();
    let mut out = Vec::new();
    for block in file_blocks(diff) {
        parse_block(&block, &mut keys, &mut out);
    }
    out
}

/// Groups lines into per-file blocks, each starting at a `diff --git` line.
/// Lines before the first header are discarded.
fn file_blocks(diff: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in diff.split('\n') {
        if line.starts_with(FILE_HEADER) {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }
    blocks
}

fn parse_block(lines: &[&str], keys: &mut HunkKeyer, out: &mut Vec<ParsedHunk>) {
    let Some(header) = lines.first() else { return };
    if lines.iter().any(|l| l.starts_with("Binary files")) {
        return;
    }
    let Some(file) = metadata_path(&lines[1..]).or_else(|| post_image_path(header)) else { return };

    let mut current: Option<(u32, Vec<&str>)> = None;
    for &line in &lines[1..] {
        if let Some(caps) = HUNK_HEADER.captures(line) {
            if let Some((start, body)) = current.take() {
                out.push(finish(keys, &file, start, &body));
            }
            let start = caps[1].parse::<u32>().unwrap_or(0);
            current = Some((start, vec![line]));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((start, body)) = current {
        out.push(finish(keys, &file, start, &body));
    }
}

fn finish(keys: &mut HunkKeyer, file: &str, start_line: u32, body: &[&str]) -> ParsedHunk {
    let mut diff = body.join("\n");
    if diff.ends_with('\n') {
        diff.pop();
    }
    ParsedHunk { id: keys.key(file, start_line), file: file.to_owned(), start_line, diff }
}

/// The post-image path from the extended header lines between `diff --git`
/// and the first `@@`. These lines carry one path each, so a path containing
/// `" b/"` is unambiguous there.
fn metadata_path(lines: &[&str]) -> Option<String> {
    let mut renamed = None;
    for line in lines.iter().take_while(|l| !HUNK_HEADER.is_match(l)) {
        let line = line.trim_end_matches(['\r', '\t']);
        if let Some(path) = line.strip_prefix("+++ ") {
            if let Some(path) = unquote(path).strip_prefix("b/") {
                return Some(path.to_owned());
            }
        } else if let Some(path) = line.strip_prefix("rename to ") {
            renamed = Some(unquote(path).to_owned());
        }
    }
    renamed
}

fn unquote(path: &str) -> &str {
    path.strip_prefix('"').and_then(|p| p.strip_suffix('"')).unwrap_or(path)
}

/// Extracts the `b/` path from `diff --git a/<old> b/<new>`.
///
/// When both sides name the same path the header is split in the middle, so
/// a path containing `" b/"` survives. Quoted paths (`"b/with space"`) have
/// their quotes stripped. Returns `None` when the header carries no `b/` side.
fn post_image_path(header: &str) -> Option<String> {
    let rest = header.strip_prefix(FILE_HEADER)?.trim_end_matches('\r');
    if let Some(idx) = rest.rfind(" \"b/") {
        let quoted = &rest[idx + 1..];
        let inner = quoted.trim_matches('"');
        return inner.strip_prefix("b/").map(str::to_owned);
    }
    if let Some(same) = symmetric_path(rest) {
        return Some(same.to_owned());
    }
    let idx = rest.rfind(" b/")?;
    Some(rest[idx + 3..].to_owned())
}

/// `a/<p> b/<p>` with the same `<p>` on both sides.
fn symmetric_path(rest: &str) -> Option<&str> {
    let len = rest.len().checked_sub(5)?;
    if len % 2 != 0 {
        return None;
    }
    let old = rest.strip_prefix("a/")?.get(..len / 2)?;
    let new = rest.get(len / 2 + 2..)?.strip_prefix(" b/")?;
    (old == new).then_some(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 83db48f..bf269f4 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@
 use std::io;
+use std::fs;

 fn main() {}
@@ -20,2 +21,3 @@ fn helper() {
 let a = 1;
+let b = 2;
 let c = 3;
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -5 +5 @@
-old
+new
";

    #[test]
    fn splits_files_and_hunks() {
        let hunks = parse_hunks(TWO_FILES);
        let ids: Vec<&str> = hunks.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["src/lib.rs::1", "src/lib.rs::21", "README.md::5"]);
        assert_eq!(hunks[0].diff, "@@ -1,3 +1,4 @@\n use std::io;\n+use std::fs;\n\n fn main() {}");
        assert_eq!(hunks[1].start_line, 21);
        assert!(hunks[1].diff.starts_with("@@ -20,2 +21,3 @@ fn helper() {"));
        assert_eq!(hunks[2].diff, "@@ -5 +5 @@\n-old\n+new");
    }

    #[test]
    fn rename_uses_new_name() {
        let diff = "diff --git a/old.x b/new.x\nsimilarity index 80%\nrename from old.x\nrename to new.x\n--- a/old.x\n+++ b/new.x\n@@ -1,3 +1,4 @@\n a\n+b\n c\n d\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].file, "new.x");
        assert_eq!(hunks[0].start_line, 1);
        assert_eq!(hunks[0].id, "new.x::1");
    }

    #[test]
    fn duplicate_start_lines_are_disambiguated() {
        let diff = "diff --git a/file b/file\n--- a/file\n+++ b/file\n@@ -10,3 +10,4 @@\n x\n+y\n@@ -10,3 +10,4 @@\n p\n+q\n";
        let ids: Vec<String> = parse_hunks(diff).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, ["file::10", "file::10#2"]);
    }

    #[test]
    fn binary_blocks_are_skipped() {
        let diff = "diff --git a/img.png b/img.png\nindex 1..2 100644\nBinary files a/img.png and b/img.png differ\ndiff --git a/a.txt b/a.txt\n@@ -1 +1 @@\n-a\n+b\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].file, "a.txt");
    }

    #[test]
    fn input_without_headers_yields_nothing() {
        assert!(parse_hunks("").is_empty());
        assert!(parse_hunks("@@ -1 +1 @@\n-a\n+b\n").is_empty());
        assert!(parse_hunks("random text\nmore").is_empty());
    }

    #[test]
    fn empty_count_fields_are_accepted() {
        let diff = "diff --git a/f b/f\n@@ -3, +7, @@\n+x\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks[0].start_line, 7);
    }

    #[test]
    fn paths_containing_b_slash_are_kept_whole() {
        let diff = "diff --git a/x b/y.rs b/x b/y.rs\n--- a/x b/y.rs\n+++ b/x b/y.rs\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(parse_hunks(diff)[0].file, "x b/y.rs");

        // Without the ---/+++ lines the header alone still splits correctly.
        let bare = "diff --git a/x b/y.rs b/x b/y.rs\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(parse_hunks(bare)[0].file, "x b/y.rs");
    }

    #[test]
    fn rename_to_line_names_the_file() {
        let diff = "diff --git a/p b/q b/r b/s\nrename from p b/q\nrename to r b/s\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(parse_hunks(diff)[0].file, "r b/s");
    }

    #[test]
    fn deleted_file_keeps_its_name() {
        let diff = "diff --git a/gone.rs b/gone.rs\ndeleted file mode 100644\n--- a/gone.rs\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-a\n-b\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks[0].file, "gone.rs");
        assert_eq!(hunks[0].id, "gone.rs::0");
    }

    #[test]
    fn quoted_paths_are_unquoted() {
        let diff = "diff --git \"a/with space.txt\" \"b/with space.txt\"\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(parse_hunks(diff)[0].file, "with space.txt");
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let mut diff = String::from("diff --git a/f b/f\n");
        for _ in 0..5 {
            diff.push_str("@@ -1 +1 @@\n+x\n");
        }
        diff.push_str("diff --git a/f b/f\n@@ -1 +1 @@\n+y\n");
        let hunks = parse_hunks(&diff);
        let mut ids: Vec<&str> = hunks.iter().map(|h| h.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(total, 6);
    }

    #[test]
    fn no_newline_marker_stays_in_hunk() {
        let diff = "diff --git a/f b/f\n@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n\\ No newline at end of file";
        let hunks = parse_hunks(diff);
        assert_eq!(
            hunks[0].diff,
            "@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n\\ No newline at end of file"
        );
    }
}
