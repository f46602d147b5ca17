//! Details panel renderer: review metadata, importance counts and progress.

use chrono::Local;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Wrap},
};

use crate::app::{AppState, PanelFocus};
use crate::ui::layout::{inner_rect, panel_block};

pub fn render_details(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &AppState) {
    let block = panel_block("Details", focus == PanelFocus::Details, &state.theme);
    let inner = inner_rect(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(details_text(state))
        .wrap(Wrap { trim: false })
        .scroll((state.details_scroll, 0));
    frame.render_widget(paragraph, inner);
}

fn field(label: &'static str, value: String, state: &AppState) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(state.theme.border_inactive)),
        Span::raw(value),
    ])
}

/// Builds the panel body. Split out so it can be checked without a terminal.
pub(crate) fn details_text(state: &AppState) -> Text<'static> {
    let theme = &state.theme;
    let mut lines = Vec::new();

    let Some(review) = &state.review else {
        lines.push(field("Directory  ", state.working_directory.clone(), state));
        lines.push(Line::raw(""));
        lines.push(Line::raw("No review loaded."));
        return Text::from(lines);
    };

    let title = if review.title.is_empty() { "(untitled)".to_owned() } else { review.title.clone() };
    lines.push(Line::styled(title, Style::default().add_modifier(Modifier::BOLD)));
    lines.push(Line::raw(""));
    lines.push(field("Directory  ", review.working_directory.clone(), state));
    let created = review
        .created_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_owned());
    lines.push(field("Created    ", created, state));
    lines.push(field("Sections   ", review.sections.len().to_string(), state));
    lines.push(field("Hunks      ", review.hunk_count().to_string(), state));
    lines.push(Line::raw(""));

    let counts = state.importance_counts();
    lines.push(Line::from(vec![
        Span::styled("high ", Style::default().fg(theme.badge_high)),
        Span::raw(format!("{}  ", counts.high)),
        Span::styled("medium ", Style::default().fg(theme.badge_medium)),
        Span::raw(format!("{}  ", counts.medium)),
        Span::styled("low ", Style::default().fg(theme.badge_low)),
        Span::raw(counts.low.to_string()),
    ]));
    if counts.unset > 0 {
        lines.push(Line::from(vec![
            Span::styled("unset ", Style::default().fg(theme.badge_unset)),
            Span::raw(counts.unset.to_string()),
        ]));
    }
    lines.push(Line::raw(""));

    let (done, total) = state.progress();
    let progress = if state.session_id.is_some() {
        format!("{done}/{total} hunks reviewed")
    } else {
        format!("{done}/{total} hunks reviewed (not saved)")
    };
    lines.push(field("Progress   ", progress, state));

    if let Some(port) = state.http_port {
        lines.push(Line::raw(""));
        lines.push(field("Submit     ", format!("POST http://127.0.0.1:{port}/review"), state));
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::loaded;
    use crate::app::AppState;
    use crate::theme::Theme;

    fn plain(text: &Text) -> Vec<String> {
        text.lines.iter().map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect()).collect()
    }

    #[test]
    fn shows_counts_and_progress() {
        let mut state = loaded();
        state.set_marks("s".into(), vec!["b.rs::7".into()]);
        state.http_port = Some(4123);
        let lines = plain(&details_text(&state));

        assert_eq!(lines[0], "Demo");
        assert!(lines.contains(&"Hunks      3".to_owned()));
        assert!(lines.contains(&"high 1  medium 1  low 1".to_owned()));
        assert!(lines.contains(&"Progress   1/3 hunks reviewed".to_owned()));
        assert!(lines.contains(&"Submit     POST http://127.0.0.1:4123/review".to_owned()));
    }

    #[test]
    fn empty_state_names_the_directory() {
        let state = AppState::new(Theme::dark(), "/srv/repo");
        let lines = plain(&details_text(&state));
        assert_eq!(lines[0], "Directory  /srv/repo");
        assert_eq!(lines[2], "No review loaded.");
    }
}
