//! Help overlay renderer for hunkwise.
//!
//! Draws a centred modal box over the panel layout, using ratatui's `Clear`
//! widget to erase the background first. The overlay is rendered inside the
//! same `terminal.draw()` closure as all other panels.

use ratatui::{
    Frame,
    layout::Constraint,
    style::Style,
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Renders the help overlay as a centred modal on top of the 3-panel layout.
///
/// The paragraph scrolls vertically by `help_scroll` rows so long help text
/// stays reachable on short terminals. Skipped below 60 columns to avoid a
/// zero-height `Rect`.
///
/// # Arguments
///
/// * `frame` — current render frame provided by `terminal.draw()`
/// * `theme` — active color theme (supplies `border_active` for the modal border)
/// * `help_scroll` — vertical scroll offset; j/k in HelpOverlay mode mutate this field
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));

    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Help: j/k scroll, ? or Esc to dismiss ")
        .border_style(Style::default().fg(theme.border_active));

    frame.render_widget(
        Paragraph::new(build_help_text())
            .block(block)
            .style(Style::default().bg(theme.background))
            .wrap(Wrap { trim: false })
            .scroll((help_scroll, 0)),
        overlay_area,
    );
}

/// Builds the help text, grouped by section.
fn build_help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Scroll down / up one line (sections: select)"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Scroll half page down / up"),
        Line::from("  Ctrl-f / b    Scroll full page down / up"),
        Line::from("  H / L         Move panel focus left / right"),
        Line::from(""),
        Line::from("Review"),
        Line::from("  { / }         Previous / next section"),
        Line::from("  [ / ]         Previous / next hunk"),
        Line::from("  x             Toggle reviewed mark of the hunk at the top"),
        Line::from("  < / >         Shrink / grow diff panel by 5%"),
        Line::from(""),
        Line::from("Generation"),
        Line::from("  R             Generate a review with the configured LLM"),
        Line::from("  Ctrl-c        Cancel the running generation"),
        Line::from("  r / p / c     After a failed classification: retry,"),
        Line::from("                proceed with partial, cancel"),
        Line::from(""),
        Line::from("General"),
        Line::from("  ?             Open / close this help overlay"),
        Line::from("  q / Esc       Quit (confirms while a generation is running)"),
    ])
}
