//! Responsive 3-panel layout engine for hunkwise.
//!
//! Pure layout arithmetic: no mutable application state lives here. It is
//! called inside `terminal.draw()` on every render, so each frame reflects the
//! current terminal size.
//!
//! At `>= 120` columns all three panels are visible with widths driven by
//! `AppState.left_pct / center_pct / right_pct` (defaults 20 / 55 / 25).
//! Below 120 columns both side panels collapse and the diff fills the full width.
//!
//! `Spacing::Overlap(1)` combined with `Block::merge_borders(MergeStrategy::Fuzzy)`
//! makes adjacent panel borders share a single column and merge their junctions.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode};
use crate::theme::Theme;

/// Returns `[left, center, right, status_bar]` panel `Rect`s for the current frame.
///
/// | Terminal width | Layout |
/// |----------------|--------|
/// | `< 120` cols   | Side panels collapsed; diff fills full width |
/// | `>= 120` cols  | 3-panel split using `state.left_pct / center_pct / right_pct` |
pub fn compute_layout(frame: &Frame, state: &AppState) -> [Rect; 4] {
    let term_width = frame.area().width;

    let [main_area, status_bar] =
        frame.area().layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let horizontal = if term_width >= 120 {
        Layout::horizontal([
            Constraint::Percentage(state.left_pct),
            Constraint::Percentage(state.center_pct),
            Constraint::Percentage(state.right_pct),
        ])
        .spacing(Spacing::Overlap(1))
    } else {
        Layout::horizontal([
            Constraint::Length(0),
            Constraint::Fill(1),
            Constraint::Length(0),
        ])
        .spacing(Spacing::Overlap(1))
    };

    let [left, center, right] = main_area.layout(&horizontal);

    [left, center, right, status_bar]
}

/// Returns the inner `Rect` of a panel after removing the 1-cell border on each side.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Builds a bordered `Block` for a panel.
///
/// Focused panels get `BorderType::Thick`, others `BorderType::Plain`.
/// `MergeStrategy::Fuzzy` is required because `Exact` produces wrong junctions
/// when thick and plain borders meet.
///
/// # Arguments
///
/// * `title` — panel title shown in the top border
/// * `is_focused` — `true` when this panel has keyboard focus
/// * `theme` — active color theme (supplies `border_active` / `border_inactive`)
pub fn panel_block<'a>(title: &'a str, is_focused: bool, theme: &'a Theme) -> Block<'a> {
    let border_style = if is_focused {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_focused { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Renders the 1-row status bar at the bottom of the terminal.
///
/// Left to right: mode indicator, generation stage, HTTP endpoint, then the
/// last error (or, failing that, the last notice). Never renders blank.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let (mode_text, mode_fg) = match state.mode {
        Mode::Normal | Mode::HelpOverlay => (" NORMAL ", theme.status_mode_normal),
        Mode::ConfirmQuit => (" QUIT? ", theme.status_mode_modal),
        Mode::RetryPrompt => (" RETRY ", theme.status_mode_modal),
    };

    let http = match state.http_port {
        Some(port) => format!(" http :{port} "),
        None => " http off ".to_owned(),
    };

    let mut spans = vec![
        Span::styled(mode_text, Style::default().fg(mode_fg).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" gen: {} ", state.generation)),
        Span::raw("│"),
        Span::raw(http),
    ];
    if let Some(err) = &state.last_error {
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(err.clone(), Style::default().fg(theme.status_error)));
    } else if let Some(notice) = &state.notice {
        spans.push(Span::raw("│ "));
        spans.push(Span::raw(notice.clone()));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
