//! Diff panel renderer for hunkwise.
//!
//! Renders the centre panel using a List widget with manual virtual scrolling.
//! Only lines[diff_scroll..diff_scroll+viewport_height] are materialized per
//! frame, so large sections cost O(viewport), not O(total_lines).

use ratatui::{
    Frame,
    layout::Rect,
    text::Line,
    widgets::{List, ListItem},
};

use crate::app::{AppState, PanelFocus};
use crate::ui::layout::{inner_rect, panel_block};

/// Renders the selected section: narrative, then each hunk.
///
/// The panel title carries the section id. With no review loaded the panel
/// explains how one gets there.
pub fn render_diff(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &AppState) {
    let is_focused = focus == PanelFocus::Diff;
    let title = match state.selected_section() {
        Some(section) => format!("Diff: {}", section.id),
        None => "Diff".to_owned(),
    };
    let block = panel_block(&title, is_focused, &state.theme);
    let inner = inner_rect(area);
    let viewport_height = inner.height as usize;

    frame.render_widget(block, area);

    if state.diff_lines.is_empty() {
        let lines = if state.review.is_none() {
            vec![
                Line::raw("No review for this directory yet."),
                Line::raw(""),
                Line::raw("Press R to generate one, or submit one over HTTP or MCP."),
            ]
        } else {
            vec![Line::raw("This review has no sections.")]
        };
        let items: Vec<ListItem> = lines.into_iter().map(ListItem::new).collect();
        frame.render_widget(List::new(items), inner);
        return;
    }

    let total = state.diff_lines.len();
    let visible_start = state.diff_scroll.min(total.saturating_sub(1));
    let visible_end = (visible_start + viewport_height).min(total);

    let items: Vec<ListItem> = state.diff_lines[visible_start..visible_end]
        .iter()
        .map(|l| ListItem::new(l.clone()))
        .collect();

    frame.render_widget(List::new(items), inner);
}
