//! Modal dialogs drawn over the panels: the retry prompt shown after a
//! classification fails validation, and the quit confirmation.

use hunkwise_core::classify::ClassificationReport;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

fn centered(frame: &Frame, width: u16, height: u16) -> Rect {
    frame.area().centered(Constraint::Length(width), Constraint::Length(height))
}

fn draw(frame: &mut Frame, area: Rect, title: &str, body: Text<'static>, theme: &Theme) {
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .title(title.to_owned())
        .border_style(Style::default().fg(theme.status_mode_modal));
    frame.render_widget(
        Paragraph::new(body)
            .block(block)
            .style(Style::default().bg(theme.background))
            .wrap(Wrap { trim: false }),
        area,
    );
}

/// Lines describing what the LLM got wrong and which choices remain.
pub(crate) fn retry_text(report: &ClassificationReport, theme: &Theme) -> Text<'static> {
    let mut lines = vec![
        Line::raw("The LLM's classification does not cover every hunk exactly once."),
        Line::raw(""),
    ];
    let mut list = |label: &'static str, ids: &[String]| {
        if !ids.is_empty() {
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(ids.join(", ")),
            ]));
        }
    };
    list("Missing: ", report.missing_ids.as_slice());
    list("Duplicated: ", report.duplicate_ids.as_slice());
    list("Invalid importance: ", report.invalid_importance.as_slice());
    list("Unknown ids: ", report.unknown_ids.as_slice());

    lines.push(Line::raw(""));
    lines.push(Line::raw("  r   retry with a prompt naming these ids"));
    if report.allows_partial() {
        lines.push(Line::raw("  p   write what was classified; missing hunks go"));
        lines.push(Line::raw("      to an \"unclassified\" section at medium"));
    } else {
        lines.push(Line::styled(
            "  p   unavailable: duplicates or invalid importance",
            Style::default().fg(theme.border_inactive),
        ));
    }
    lines.push(Line::raw("  c   cancel (also Esc)"));
    Text::from(lines)
}

pub fn render_retry_prompt(frame: &mut Frame, report: &ClassificationReport, theme: &Theme) {
    let body = retry_text(report, theme);
    let height = (body.lines.len() as u16).saturating_add(4);
    let area = centered(frame, 72, height);
    draw(frame, area, " Classification incomplete ", body, theme);
}

pub fn render_confirm_quit(frame: &mut Frame, theme: &Theme) {
    let body = Text::from(vec![
        Line::raw("A generation is still running."),
        Line::raw("Quit and cancel it?  y / n"),
    ]);
    let area = centered(frame, 40, 4);
    draw(frame, area, " Quit ", body, theme);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text) -> String {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn lists_ids_and_offers_partial_only_when_allowed() {
        let mut report = ClassificationReport {
            valid: false,
            missing_ids: vec!["a.rs::1".into(), "b.rs::4".into()],
            ..Default::default()
        };
        let text = plain(&retry_text(&report, &Theme::dark()));
        assert!(text.contains("Missing: a.rs::1, b.rs::4"));
        assert!(text.contains("p   write what was classified"));
        assert!(!text.contains("Duplicated"));

        report.duplicate_ids = vec!["a.rs::1".into()];
        let text = plain(&retry_text(&report, &Theme::dark()));
        assert!(text.contains("Duplicated: a.rs::1"));
        assert!(text.contains("p   unavailable"));
    }
}
