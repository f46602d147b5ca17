//! Central application state for hunkwise.
//!
//! This module owns all mutable UI state: the review being shown, which section
//! and panel are selected, per-panel scroll offsets and viewport heights, panel
//! width percentages, review progress and the generator's status. No rendering
//! logic lives here: `app.rs` is read by the `ui` module and mutated by the
//! keybinding dispatcher and the event loop.

use std::collections::HashSet;

use hunkwise_core::generator::{GenerateError, GenerationOutcome, GenerationState, RetryContext};
use hunkwise_core::types::{HunkKeyer, Importance, Review, Section};
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::ListState;

use crate::highlight;
use crate::theme::Theme;

/// Which keybinding set is active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Vim-style navigation (default).
    #[default]
    Normal,
    /// Full-screen help overlay is shown above all panels.
    HelpOverlay,
    /// Quit-confirmation dialog shown while a generation is running.
    ConfirmQuit,
    /// A classification failed validation: retry, proceed partially, or cancel.
    RetryPrompt,
}

/// Which panel currently has keyboard focus.
///
/// Navigation cycles Sections → Diff → Details → Sections via `next()` and in
/// reverse via `prev()`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Left panel listing the review's sections.
    #[default]
    Sections,
    /// Centre panel with the selected section's narrative and hunks.
    Diff,
    /// Right panel with review metadata and progress.
    Details,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::Sections => PanelFocus::Details,
            PanelFocus::Diff => PanelFocus::Sections,
            PanelFocus::Details => PanelFocus::Diff,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::Sections => PanelFocus::Diff,
            PanelFocus::Diff => PanelFocus::Details,
            PanelFocus::Details => PanelFocus::Sections,
        }
    }
}

/// Per-importance hunk counts for the details panel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportanceCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unset: usize,
}

/// All mutable UI state passed through every render cycle.
pub struct AppState {
    pub theme: Theme,
    /// Canonical directory whose review is shown.
    pub working_directory: String,

    pub mode: Mode,
    pub focus: PanelFocus,

    /// The latest review from the watcher; `None` before the first one or
    /// after the file was removed.
    pub review: Option<Review>,
    /// Progress key of every hunk, indexed `[section][hunk]`.
    pub hunk_keys: Vec<Vec<String>>,
    /// Keys of hunks marked reviewed in the current session.
    pub reviewed: HashSet<String>,
    /// Progress session of the current review, when the database is available.
    pub session_id: Option<String>,

    /// Stateful list widget backing the sections panel (left).
    pub section_list_state: ListState,

    /// Vertical scroll offset for the diff panel (centre).
    /// usize supports >65535 line sections; clamped by the renderer.
    pub diff_scroll: usize,
    /// Vertical scroll offset for the details `Paragraph` (right).
    pub details_scroll: u16,
    /// Vertical scroll offset of the help overlay.
    pub help_scroll: u16,

    /// Inner heights after borders, cached after each render for half-page
    /// and full-page scrolling.
    pub sections_viewport_height: u16,
    pub diff_viewport_height: u16,
    pub details_viewport_height: u16,

    /// Panel rects of the last frame, for click-to-focus.
    pub panel_rects: [Rect; 3],

    /// Width percentage of the left panel. Default: 20.
    pub left_pct: u16,
    /// Width percentage of the centre panel. Default: 55.
    pub center_pct: u16,
    /// Width percentage of the right panel. Default: 25.
    pub right_pct: u16,

    /// Highlighted lines of the selected section.
    pub diff_lines: Vec<Line<'static>>,
    /// Line indices of each hunk caption within `diff_lines`.
    pub hunk_offsets: Vec<usize>,

    /// Last stage published by the generator.
    pub generation: GenerationState,
    /// True from the moment a generation task is spawned until it reports back.
    pub generating: bool,
    /// Pending classification awaiting a retry/partial/cancel decision.
    pub retry: Option<Box<RetryContext>>,

    /// Port of the HTTP ingest endpoint, `None` when disabled.
    pub http_port: Option<u16>,
    /// Last watcher, database or generation error, shown in the status bar.
    pub last_error: Option<String>,
    /// Last informational message, shown when there is no error.
    pub notice: Option<String>,
}

impl AppState {
    /// Constructs `AppState` for `working_directory` with nothing loaded.
    ///
    /// Panel percentages are 20 / 55 / 25 (left / centre / right).
    pub fn new(theme: Theme, working_directory: impl Into<String>) -> Self {
        Self {
            theme,
            working_directory: working_directory.into(),
            mode: Mode::default(),
            focus: PanelFocus::default(),
            review: None,
            hunk_keys: Vec::new(),
            reviewed: HashSet::new(),
            session_id: None,
            section_list_state: ListState::default(),
            diff_scroll: 0,
            details_scroll: 0,
            help_scroll: 0,
            sections_viewport_height: 0,
            diff_viewport_height: 0,
            details_viewport_height: 0,
            panel_rects: [Rect::default(); 3],
            left_pct: 20,
            center_pct: 55,
            right_pct: 25,
            diff_lines: Vec::new(),
            hunk_offsets: Vec::new(),
            generation: GenerationState::Idle,
            generating: false,
            retry: None,
            http_port: None,
            last_error: None,
            notice: None,
        }
    }

    // ------------------------------------------------------------------
    // Review content
    // ------------------------------------------------------------------

    /// Replaces the shown review.
    ///
    /// The selected section is kept when it still exists. Progress marks are
    /// dropped until the event loop loads the new session's marks.
    pub fn set_review(&mut self, review: Review) {
        let mut keyer = HunkKeyer::new();
        self.hunk_keys = review
            .sections
            .iter()
            .map(|s| s.hunks.iter().map(|h| keyer.key(&h.file, h.start_line)).collect())
            .collect();

        let count = review.sections.len();
        let keep = self.section_list_state.selected().filter(|&i| i < count);
        self.review = Some(review);
        self.reviewed.clear();
        self.session_id = None;
        self.details_scroll = 0;

        match keep {
            Some(i) => {
                self.section_list_state.select(Some(i));
                self.rebuild_diff();
            }
            None => self.select_section(0),
        }
    }

    /// Shows the empty state after the review file was removed.
    pub fn clear_review(&mut self) {
        self.review = None;
        self.hunk_keys.clear();
        self.reviewed.clear();
        self.session_id = None;
        self.section_list_state.select(None);
        self.diff_lines.clear();
        self.hunk_offsets.clear();
        self.diff_scroll = 0;
        self.details_scroll = 0;
    }

    /// Installs the progress session and its marks for the current review.
    pub fn set_marks(&mut self, session_id: String, marks: Vec<String>) {
        self.session_id = Some(session_id);
        self.reviewed = marks.into_iter().collect();
        self.rebuild_diff();
    }

    /// Records the new reviewed state of one hunk.
    pub fn apply_mark(&mut self, key: &str, reviewed: bool) {
        if reviewed {
            self.reviewed.insert(key.to_owned());
        } else {
            self.reviewed.remove(key);
        }
        self.rebuild_diff();
    }

    pub fn sections(&self) -> &[Section] {
        self.review.as_ref().map(|r| r.sections.as_slice()).unwrap_or(&[])
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.section_list_state.selected().filter(|&i| i < self.sections().len())
    }

    pub fn selected_section(&self) -> Option<&Section> {
        self.selected_index().and_then(|i| self.sections().get(i))
    }

    /// Selects section `index` (clamped) and shows it from the top.
    pub fn select_section(&mut self, index: usize) {
        let count = self.sections().len();
        if count == 0 {
            self.section_list_state.select(None);
        } else {
            self.section_list_state.select(Some(index.min(count - 1)));
        }
        self.diff_scroll = 0;
        self.rebuild_diff();
    }

    pub fn prev_section(&mut self) {
        if let Some(i) = self.selected_index() {
            self.select_section(i.saturating_sub(1));
        }
    }

    pub fn next_section(&mut self) {
        if let Some(i) = self.selected_index() {
            self.select_section(i + 1);
        }
    }

    /// Re-renders the selected section's lines and hunk offsets.
    fn rebuild_diff(&mut self) {
        let rendered = match self.selected_index() {
            Some(i) => highlight::render_section(
                &self.sections()[i],
                self.hunk_keys.get(i).map(Vec::as_slice).unwrap_or(&[]),
                &self.reviewed,
                &self.theme,
            ),
            None => highlight::RenderedSection::default(),
        };
        self.diff_lines = rendered.lines;
        self.hunk_offsets = rendered.hunk_offsets;
    }

    /// Index within the selected section of the hunk at the top of the diff
    /// viewport: the last hunk whose caption is at or above the scroll
    /// position, or the first hunk while the narrative is showing.
    pub fn hunk_under_cursor(&self) -> Option<usize> {
        if self.hunk_offsets.is_empty() {
            return None;
        }
        let passed = self.hunk_offsets.partition_point(|&o| o <= self.diff_scroll);
        Some(passed.saturating_sub(1))
    }

    /// Progress key of the hunk under the cursor.
    pub fn current_hunk_key(&self) -> Option<String> {
        let section = self.selected_index()?;
        let hunk = self.hunk_under_cursor()?;
        self.hunk_keys.get(section)?.get(hunk).cloned()
    }

    /// `(reviewed, total)` over the whole review.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.hunk_keys.iter().map(Vec::len).sum();
        let done = self.hunk_keys.iter().flatten().filter(|k| self.reviewed.contains(*k)).count();
        (done, total)
    }

    /// `(reviewed, total)` for section `index`.
    pub fn section_progress(&self, index: usize) -> (usize, usize) {
        self.hunk_keys
            .get(index)
            .map(|keys| (keys.iter().filter(|k| self.reviewed.contains(*k)).count(), keys.len()))
            .unwrap_or((0, 0))
    }

    pub fn importance_counts(&self) -> ImportanceCounts {
        let mut counts = ImportanceCounts::default();
        for hunk in self.review.iter().flat_map(|r| r.hunks()) {
            match Importance::parse(&hunk.importance) {
                Some(Importance::High) => counts.high += 1,
                Some(Importance::Medium) => counts.medium += 1,
                Some(Importance::Low) => counts.low += 1,
                None => counts.unset += 1,
            }
        }
        counts
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Marks a generation task as spawned.
    pub fn begin_generation(&mut self) {
        self.generating = true;
        self.notice = None;
    }

    /// Applies the result of a generation, retry or partial proceed.
    pub fn finish_generation(&mut self, result: Result<GenerationOutcome, GenerateError>) {
        self.generating = false;
        match result {
            Ok(GenerationOutcome::Written(written)) => {
                self.last_error = None;
                self.notice = Some(format!("review written to {}", written.file_path.display()));
            }
            Ok(GenerationOutcome::NeedsRetry(ctx)) => {
                self.retry = Some(ctx);
                self.mode = Mode::RetryPrompt;
            }
            Err(GenerateError::Cancelled) => {
                self.notice = Some("generation cancelled".to_owned());
            }
            Err(GenerateError::NoChanges) => {
                self.notice = Some("no changes to review".to_owned());
            }
            Err(e) => {
                self.last_error = Some(format!("generation failed: {e}"));
            }
        }
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    /// Scrolls the focused panel down by `lines` rows.
    ///
    /// For `Sections`: moves the selection down by `lines` sections.
    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Sections => {
                if let Some(i) = self.selected_index() {
                    self.select_section(i.saturating_add(lines as usize));
                }
            }
            PanelFocus::Diff => {
                self.diff_scroll = self.diff_scroll.saturating_add(lines as usize);
            }
            PanelFocus::Details => {
                self.details_scroll = self.details_scroll.saturating_add(lines);
            }
        }
    }

    /// Scrolls the focused panel up by `lines` rows.
    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Sections => {
                if let Some(i) = self.selected_index() {
                    self.select_section(i.saturating_sub(lines as usize));
                }
            }
            PanelFocus::Diff => {
                self.diff_scroll = self.diff_scroll.saturating_sub(lines as usize);
            }
            PanelFocus::Details => {
                self.details_scroll = self.details_scroll.saturating_sub(lines);
            }
        }
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::Sections => self.select_section(0),
            PanelFocus::Diff => self.diff_scroll = 0,
            PanelFocus::Details => self.details_scroll = 0,
        }
    }

    /// For `Details`: sets the offset to u16::MAX (the renderer clamps).
    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::Sections => self.select_section(usize::MAX),
            PanelFocus::Diff => self.diff_scroll = self.diff_lines.len().saturating_sub(1),
            PanelFocus::Details => self.details_scroll = u16::MAX,
        }
    }

    fn focused_viewport_height(&self) -> u16 {
        match self.focus {
            PanelFocus::Sections => self.sections_viewport_height,
            PanelFocus::Diff => self.diff_viewport_height,
            PanelFocus::Details => self.details_viewport_height,
        }
    }

    /// Uses the viewport height cached from the previous render; scrolls by 1
    /// on the first frame.
    pub fn half_page_down(&mut self) {
        self.scroll_down((self.focused_viewport_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.focused_viewport_height() / 2).max(1));
    }

    pub fn full_page_down(&mut self) {
        self.scroll_down(self.focused_viewport_height().max(1));
    }

    pub fn full_page_up(&mut self) {
        self.scroll_up(self.focused_viewport_height().max(1));
    }

    /// Jumps to the previous hunk caption above the scroll position.
    pub fn prev_hunk(&mut self) {
        if let Some(&offset) = self.hunk_offsets.iter().rev().find(|&&o| o < self.diff_scroll) {
            self.diff_scroll = offset;
        }
    }

    /// Jumps to the next hunk caption below the scroll position.
    pub fn next_hunk(&mut self) {
        if let Some(&offset) = self.hunk_offsets.iter().find(|&&o| o > self.diff_scroll) {
            self.diff_scroll = offset;
        }
    }

    // ------------------------------------------------------------------
    // Panel geometry
    // ------------------------------------------------------------------

    /// Shrinks the diff (centre) panel by transferring 5% to the side panels.
    ///
    /// The centre panel will not shrink below 20%.
    pub fn shrink_diff_panel(&mut self) {
        const MIN_CENTER: u16 = 20;
        const STEP: u16 = 5;
        if self.center_pct <= MIN_CENTER {
            return;
        }
        let transfer = STEP.min(self.center_pct - MIN_CENTER);
        self.center_pct -= transfer;
        let left_gain = transfer / 2;
        let right_gain = transfer - left_gain;
        self.left_pct = self.left_pct.saturating_add(left_gain);
        self.right_pct = self.right_pct.saturating_add(right_gain);
    }

    /// Grows the diff (centre) panel by pulling 5% from the side panels.
    ///
    /// The centre panel will not grow above 80%; side panels keep at least 5%.
    pub fn grow_diff_panel(&mut self) {
        const MAX_CENTER: u16 = 80;
        const MIN_SIDE: u16 = 5;
        const STEP: u16 = 5;
        if self.center_pct >= MAX_CENTER {
            return;
        }
        let transfer = STEP.min(MAX_CENTER - self.center_pct);
        let left_give = (transfer / 2).min(self.left_pct.saturating_sub(MIN_SIDE));
        let right_give = (transfer - transfer / 2).min(self.right_pct.saturating_sub(MIN_SIDE));
        self.left_pct -= left_give;
        self.right_pct -= right_give;
        self.center_pct += left_give + right_give;
    }
}

/// Highest importance among a section's hunks, for its list badge.
pub fn highest_importance(section: &Section) -> Option<Importance> {
    section.hunks.iter().filter_map(|h| Importance::parse(&h.importance)).max()
}
