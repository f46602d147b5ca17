//! Keybinding dispatcher for hunkwise.
//!
//! Translates raw crossterm `KeyEvent`s into `AppState` mutations and returns a
//! `KeyAction` telling the event loop what else to do. Anything that needs the
//! database or the generator (toggling a mark, starting or steering a
//! generation) is returned as an action rather than performed here, so this
//! module stays synchronous. The dispatcher branches first on `state.mode` so
//! every mode has an isolated handler.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{AppState, Mode, PanelFocus};

/// Follow-up work for the event loop after a key or mouse event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Nothing beyond the state change; request another render.
    Continue,
    /// Exit cleanly.
    Quit,
    /// Flip the reviewed mark of the hunk with this key.
    ToggleReviewed(String),
    /// Start a new generation.
    Generate,
    /// Cancel the running generation.
    CancelGeneration,
    /// Re-ask the LLM with the pending retry context.
    Retry,
    /// Write the pending classification with an "unclassified" section.
    ProceedPartial,
    /// Drop the pending retry context.
    AbandonRetry,
}

/// Dispatches a key event to the handler matching the current mode.
///
/// # Arguments
///
/// * `key`   — the raw crossterm key event (code + modifiers)
/// * `state` — mutable reference to all UI state
pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return handle_interrupt(state);
    }
    match state.mode {
        Mode::HelpOverlay => handle_help(key, state),
        Mode::ConfirmQuit => handle_confirm_quit(key, state),
        Mode::RetryPrompt => handle_retry_prompt(key, state),
        Mode::Normal => handle_normal(key, state),
    }
}

/// Ctrl-c cancels a running generation; otherwise it quits.
fn handle_interrupt(state: &mut AppState) -> KeyAction {
    if state.generating {
        if state.mode == Mode::ConfirmQuit {
            state.mode = Mode::Normal;
        }
        KeyAction::CancelGeneration
    } else {
        KeyAction::Quit
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_scroll_key(key, state) {
        return action;
    }

    match key.code {
        KeyCode::Char('H') => {
            state.focus = state.focus.prev();
            KeyAction::Continue
        }
        KeyCode::Char('L') => {
            state.focus = state.focus.next();
            KeyAction::Continue
        }

        KeyCode::Char('{') => { state.prev_section(); KeyAction::Continue }
        KeyCode::Char('}') => { state.next_section(); KeyAction::Continue }
        KeyCode::Enter if state.focus == PanelFocus::Sections => {
            state.focus = PanelFocus::Diff;
            KeyAction::Continue
        }

        KeyCode::Char('[') => { state.prev_hunk(); KeyAction::Continue }
        KeyCode::Char(']') => { state.next_hunk(); KeyAction::Continue }

        KeyCode::Char('<') => { state.shrink_diff_panel(); KeyAction::Continue }
        KeyCode::Char('>') => { state.grow_diff_panel(); KeyAction::Continue }

        KeyCode::Char('x') => match state.current_hunk_key() {
            Some(hunk_key) => KeyAction::ToggleReviewed(hunk_key),
            None => KeyAction::Continue,
        },

        KeyCode::Char('R') => {
            if state.generating {
                state.notice = Some("a generation is already running".to_owned());
                KeyAction::Continue
            } else {
                KeyAction::Generate
            }
        }

        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
            KeyAction::Continue
        }

        KeyCode::Char('q') | KeyCode::Esc => {
            if state.generating {
                state.mode = Mode::ConfirmQuit;
                KeyAction::Continue
            } else {
                KeyAction::Quit
            }
        }

        _ => KeyAction::Continue,
    }
}

/// Handles scroll-related keys in Normal mode: j / k / g / G and Ctrl combos.
///
/// Returns `Some(KeyAction)` when the key was consumed, `None` when the key
/// should fall through to the rest of the Normal handler.
fn handle_scroll_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => state.scroll_top(),
        KeyCode::Char('G') | KeyCode::End => state.scroll_bottom(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        KeyCode::Char('f') if ctrl => state.full_page_down(),
        KeyCode::Char('b') if ctrl => state.full_page_up(),
        KeyCode::PageDown => state.full_page_down(),
        KeyCode::PageUp => state.full_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

fn handle_help(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') => state.help_scroll = state.help_scroll.saturating_add(1),
        KeyCode::Char('k') => state.help_scroll = state.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('G') => state.help_scroll = u16::MAX,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

/// `y` quits (the event loop cancels the generation on the way out);
/// `n` / `Esc` returns to Normal mode.
fn handle_confirm_quit(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Quit,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.mode = Mode::Normal;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

/// `r` retry, `p` proceed with partial (only when the report allows it),
/// `c` / `Esc` cancel.
fn handle_retry_prompt(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let allows_partial = state.retry.as_ref().is_some_and(|ctx| ctx.report.allows_partial());
    match key.code {
        KeyCode::Char('r') => {
            state.mode = Mode::Normal;
            KeyAction::Retry
        }
        KeyCode::Char('p') if allows_partial => {
            state.mode = Mode::Normal;
            KeyAction::ProceedPartial
        }
        KeyCode::Char('c') | KeyCode::Esc => {
            state.mode = Mode::Normal;
            state.retry = None;
            KeyAction::AbandonRetry
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Handles a mouse event: click-to-focus and scroll-wheel.
///
/// Scroll wheel moves the focused panel by 3 lines; in HelpOverlay mode it
/// scrolls the overlay instead.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if state.mode == Mode::Normal => {
            focus_at(mouse.column, mouse.row, state);
        }
        MouseEventKind::ScrollUp => {
            if state.mode == Mode::HelpOverlay {
                state.help_scroll = state.help_scroll.saturating_sub(3);
            } else if state.mode == Mode::Normal {
                state.scroll_up(3);
            }
        }
        MouseEventKind::ScrollDown => {
            if state.mode == Mode::HelpOverlay {
                state.help_scroll = state.help_scroll.saturating_add(3);
            } else if state.mode == Mode::Normal {
                state.scroll_down(3);
            }
        }
        _ => {}
    }
    KeyAction::Continue
}

/// Sets panel focus from the clicked position; collapsed panels are skipped.
fn focus_at(col: u16, row: u16, state: &mut AppState) {
    let pos = Position { x: col, y: row };
    let [left, center, right] = state.panel_rects;

    if left.width > 0 && left.contains(pos) {
        state.focus = PanelFocus::Sections;
    } else if center.contains(pos) {
        state.focus = PanelFocus::Diff;
    } else if right.width > 0 && right.contains(pos) {
        state.focus = PanelFocus::Details;
    }
}
