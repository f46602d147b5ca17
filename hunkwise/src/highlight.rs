//! Builds the diff panel's lines for one section: narrative first, then each
//! hunk with its caption, importance badge and highlighted diff text.
//!
//! Code is highlighted with syntect by file extension. A removed line that is
//! directly followed by an added line is treated as a pair and re-rendered
//! with word-level emphasis from `similar`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use hunkwise_core::types::{Importance, Section};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use similar::{ChangeTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use crate::theme::Theme;

static PS: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static TS: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const SYNTECT_THEME: &str = "base16-ocean.dark";

/// Lines for one section plus the line index where each hunk's caption sits.
#[derive(Debug, Default)]
pub struct RenderedSection {
    pub lines: Vec<Line<'static>>,
    pub hunk_offsets: Vec<usize>,
}

/// Loads the syntax and theme sets ahead of the first render.
pub fn warm_up() {
    let _ = &*PS;
    let _ = &*TS;
}

/// Renders `section` for the diff panel.
///
/// `keys[i]` is the progress key of `section.hunks[i]`; hunks whose key is in
/// `reviewed` get a checked mark in their caption.
pub fn render_section(
    section: &Section,
    keys: &[String],
    reviewed: &HashSet<String>,
    theme: &Theme,
) -> RenderedSection {
    let mut out = RenderedSection::default();
    let dim = Style::default().fg(theme.border_inactive);

    if let Some(chapter) = &section.chapter_id {
        out.lines.push(Line::styled(
            format!("Chapter {chapter}"),
            dim.add_modifier(Modifier::ITALIC),
        ));
    }
    if section.narrative.trim().is_empty() {
        out.lines.push(Line::styled("(no narrative)", dim));
    } else {
        for text in section.narrative.lines() {
            out.lines.push(Line::styled(text.to_owned(), Style::default().fg(theme.diff_context)));
        }
    }

    for (i, hunk) in section.hunks.iter().enumerate() {
        out.lines.push(Line::default());
        out.hunk_offsets.push(out.lines.len());

        let is_reviewed = keys.get(i).is_some_and(|k| reviewed.contains(k));
        out.lines.push(Line::from(vec![
            review_mark(is_reviewed, theme),
            importance_badge(&hunk.importance, theme),
            Span::raw(" "),
            Span::styled(
                format!("{}:{}", hunk.file, hunk.start_line),
                Style::default().fg(theme.hunk_caption).add_modifier(Modifier::BOLD),
            ),
        ]));
        highlight_hunk(&hunk.diff, &hunk.file, theme, &mut out.lines);
    }

    out
}

/// `[x] ` or `[ ] ` in the progress colors.
pub fn review_mark(reviewed: bool, theme: &Theme) -> Span<'static> {
    if reviewed {
        Span::styled("[x] ", Style::default().fg(theme.reviewed))
    } else {
        Span::styled("[ ] ", Style::default().fg(theme.unreviewed))
    }
}

/// Fixed-width reverse-video badge for a stored importance value.
pub fn importance_badge(raw: &str, theme: &Theme) -> Span<'static> {
    let importance = Importance::parse(raw);
    let label = match importance {
        Some(Importance::High) => " HIGH ",
        Some(Importance::Medium) => " MED  ",
        Some(Importance::Low) => " LOW  ",
        None => " ---- ",
    };
    Span::styled(
        label,
        Style::default()
            .fg(theme.background)
            .bg(theme.importance(importance))
            .add_modifier(Modifier::BOLD),
    )
}

fn syntax_for(path: &str) -> &'static SyntaxReference {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| PS.find_syntax_by_extension(ext))
        .unwrap_or_else(|| PS.find_syntax_plain_text())
}

/// Appends the highlighted lines of one hunk's unified-diff text to `out`.
fn highlight_hunk(diff: &str, path: &str, theme: &Theme, out: &mut Vec<Line<'static>>) {
    let Some(syntect_theme) = TS.themes.get(SYNTECT_THEME).or_else(|| TS.themes.values().next())
    else {
        emit_plain_lines(diff, theme, out);
        return;
    };
    // Fresh highlighter per hunk: hunks are not contiguous in the file.
    let mut h = HighlightLines::new(syntax_for(path), syntect_theme);
    let mut pending_removed: Option<String> = None;

    for raw in diff.lines() {
        if raw.starts_with("@@") {
            flush_removed(&mut pending_removed, &mut h, theme, out);
            out.push(Line::styled(raw.to_owned(), Style::default().fg(theme.diff_hunk_header)));
            continue;
        }
        let (origin, code) = split_origin(raw);
        match origin {
            '-' => {
                flush_removed(&mut pending_removed, &mut h, theme, out);
                pending_removed = Some(code.to_owned());
            }
            '+' => match pending_removed.take() {
                Some(old_code) => {
                    // Keep the highlighter's parse state in step with the text.
                    let _ = build_syntect_spans(&old_code, &mut h);
                    let _ = build_syntect_spans(code, &mut h);
                    let (old_words, new_words) = word_diff_spans(&old_code, code, theme);
                    out.push(prefixed("- ", theme.diff_removed, old_words));
                    out.push(prefixed("+ ", theme.diff_added, new_words));
                }
                None => {
                    let spans = build_syntect_spans(code, &mut h);
                    out.push(prefixed("+ ", theme.diff_added, spans));
                }
            },
            '\\' => {
                flush_removed(&mut pending_removed, &mut h, theme, out);
                out.push(Line::styled(
                    raw.to_owned(),
                    Style::default().fg(theme.border_inactive).add_modifier(Modifier::ITALIC),
                ));
            }
            _ => {
                flush_removed(&mut pending_removed, &mut h, theme, out);
                let spans = build_syntect_spans(code, &mut h);
                out.push(prefixed("  ", theme.diff_context, spans));
            }
        }
    }
    flush_removed(&mut pending_removed, &mut h, theme, out);
}

/// Emits an unpaired removed line.
fn flush_removed(
    pending: &mut Option<String>,
    h: &mut HighlightLines,
    theme: &Theme,
    out: &mut Vec<Line<'static>>,
) {
    if let Some(code) = pending.take() {
        let spans = build_syntect_spans(&code, h);
        out.push(prefixed("- ", theme.diff_removed, spans));
    }
}

/// Splits a diff body line into its origin character and code.
fn split_origin(raw: &str) -> (char, &str) {
    match raw.chars().next() {
        Some(c @ ('+' | '-' | ' ' | '\\')) => (c, &raw[1..]),
        _ => (' ', raw),
    }
}

fn prefixed(prefix: &'static str, color: Color, spans: Vec<Span<'static>>) -> Line<'static> {
    let mut line = vec![Span::styled(prefix, Style::default().fg(color))];
    line.extend(spans);
    Line::from(line)
}

/// Converts a syntect style to ratatui, foreground and font style only so the
/// panel keeps the terminal's background.
fn syntect_to_span(style: syntect::highlighting::Style, content: &str) -> Span<'static> {
    use syntect::highlighting::FontStyle;

    let mut ratatui_style = Style::default();
    let fg = style.foreground;
    if fg.a > 0 {
        ratatui_style = ratatui_style.fg(Color::Rgb(fg.r, fg.g, fg.b));
    }
    if style.font_style.contains(FontStyle::BOLD) {
        ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        ratatui_style = ratatui_style.add_modifier(Modifier::UNDERLINED);
    }
    Span::styled(content.to_owned(), ratatui_style)
}

/// Highlights one line of code. Falls back to a plain span on error.
fn build_syntect_spans(code: &str, h: &mut HighlightLines) -> Vec<Span<'static>> {
    // The newline-aware syntax set expects line terminators.
    let line = format!("{code}\n");
    let spans: Vec<Span<'static>> = h
        .highlight_line(&line, &PS)
        .unwrap_or_default()
        .into_iter()
        .map(|(style, text)| syntect_to_span(style, text.trim_end_matches('\n')))
        .filter(|span| !span.content.is_empty())
        .collect();
    if spans.is_empty() {
        vec![Span::raw(code.to_owned())]
    } else {
        spans
    }
}

/// Computes word-level diff spans for a removed/added line pair.
///
/// Changed words are bold; unchanged words are dimmed.
fn word_diff_spans(
    old_line: &str,
    new_line: &str,
    theme: &Theme,
) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_spans: Vec<Span<'static>> = Vec::new();
    let mut new_spans: Vec<Span<'static>> = Vec::new();
    let unchanged = Style::default().fg(theme.border_inactive);

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                match change.tag() {
                    ChangeTag::Delete => {
                        let mut style = Style::default().fg(theme.diff_removed);
                        if emphasized {
                            style = style.add_modifier(Modifier::BOLD);
                        }
                        old_spans.push(Span::styled(text, style));
                    }
                    ChangeTag::Insert => {
                        let mut style = Style::default().fg(theme.diff_added);
                        if emphasized {
                            style = style.add_modifier(Modifier::BOLD);
                        }
                        new_spans.push(Span::styled(text, style));
                    }
                    ChangeTag::Equal => {
                        old_spans.push(Span::styled(text.clone(), unchanged));
                        new_spans.push(Span::styled(text, unchanged));
                    }
                }
            }
        }
    }
    (old_spans, new_spans)
}

/// Plain fallback used when no syntect theme is available.
fn emit_plain_lines(diff: &str, theme: &Theme, out: &mut Vec<Line<'static>>) {
    for raw in diff.lines() {
        let color = match raw.chars().next() {
            Some('@') => theme.diff_hunk_header,
            Some('+') => theme.diff_added,
            Some('-') => theme.diff_removed,
            _ => theme.diff_context,
        };
        out.push(Line::styled(raw.to_owned(), Style::default().fg(color)));
    }
}
