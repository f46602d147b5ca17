//! UI rendering module for hunkwise.
//!
//! This is the module root for `ui/`. It exposes `render()` as the single entry
//! point called by the event loop's `terminal.draw()` closure.
//!
//! All layout arithmetic lives in `layout.rs`. The three panels live in
//! `sections.rs`, `diff_view.rs` and `details.rs`; overlays in `help.rs` and
//! `modal.rs`.

mod layout;
pub mod details;
pub mod diff_view;
pub mod help;
pub mod keybindings;
pub mod modal;
pub mod sections;

use ratatui::Frame;

use crate::app::{AppState, Mode};
use layout::{compute_layout, inner_rect, render_status_bar};

/// Renders one complete frame: 3-panel layout, overlays, and status bar.
///
/// Called exactly once per `AppEvent::Render` inside `terminal.draw()`.
///
/// Viewport heights are written back into `state` so that scroll operations
/// triggered by the *next* keypress can compute half-page and full-page
/// distances. The one-frame lag is imperceptible in practice.
pub fn render(frame: &mut Frame, state: &mut AppState) {
    let [left, center, right, status_bar] = compute_layout(frame, state);

    state.sections_viewport_height = inner_rect(left).height;
    state.diff_viewport_height = inner_rect(center).height;
    state.details_viewport_height = inner_rect(right).height;
    state.panel_rects = [left, center, right];

    let focus = state.focus;

    if left.width > 0 {
        sections::render_sections(frame, left, focus, state);
    }
    diff_view::render_diff(frame, center, focus, state);
    if right.width > 0 {
        details::render_details(frame, right, focus, state);
    }

    render_status_bar(frame, status_bar, state);

    // Overlays last so they sit on top.
    match state.mode {
        Mode::HelpOverlay => help::render_help_overlay(frame, &state.theme, state.help_scroll),
        Mode::ConfirmQuit => modal::render_confirm_quit(frame, &state.theme),
        Mode::RetryPrompt => {
            if let Some(ctx) = &state.retry {
                modal::render_retry_prompt(frame, &ctx.report, &state.theme);
            }
        }
        Mode::Normal => {}
    }
}
