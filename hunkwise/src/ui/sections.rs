//! Sections panel renderer for hunkwise.
//!
//! Renders the left panel from the review's sections. Each entry shows a
//! progress mark, the highest importance badge among its hunks, the section id
//! and its hunk count. Without a review it shows an empty-state message.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::{highest_importance, AppState, PanelFocus};
use crate::highlight::{importance_badge, review_mark};
use crate::theme::Theme;
use crate::ui::layout::panel_block;

/// Renders the sections list into `area`.
///
/// Uses `render_stateful_widget` so the `ListState` selection highlight is
/// applied. The section count is shown in the title, e.g. "Sections (4)".
pub fn render_sections(frame: &mut Frame, area: Rect, focus: PanelFocus, state: &mut AppState) {
    let is_focused = focus == PanelFocus::Sections;
    let count = state.sections().len();
    let title = if count > 0 { format!("Sections ({count})") } else { "Sections".to_owned() };

    let items: Vec<ListItem<'static>> = if count == 0 {
        let msg = if state.review.is_some() { "Empty review" } else { "No review" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        (0..count).map(|i| section_item(state, i)).collect()
    };

    let selected_style = Style::default()
        .fg(state.theme.border_active)
        .add_modifier(Modifier::REVERSED);
    let list = List::new(items)
        .block(panel_block(&title, is_focused, &state.theme))
        .highlight_style(selected_style);

    frame.render_stateful_widget(list, area, &mut state.section_list_state);
}

/// Format: `[x]  HIGH  intro (3)` once every hunk is reviewed, `[ ] ...` otherwise.
fn section_item(state: &AppState, index: usize) -> ListItem<'static> {
    let theme: &Theme = &state.theme;
    let section = &state.sections()[index];
    let (done, total) = state.section_progress(index);
    let badge = match highest_importance(section) {
        Some(importance) => importance_badge(importance.as_str(), theme),
        None => importance_badge("", theme),
    };
    let id = if section.id.is_empty() { "(untitled)".to_owned() } else { section.id.clone() };

    ListItem::new(Line::from(vec![
        review_mark(total > 0 && done == total, theme),
        badge,
        Span::raw(" "),
        Span::raw(id),
        Span::styled(format!(" ({total})"), Style::default().fg(theme.border_inactive)),
    ]))
}
