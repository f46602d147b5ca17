//! Color theme system for hunkwise.
//!
//! A `Theme` holds named `ratatui::style::Color` fields covering every UI surface
//! the viewer renders. Two built-in themes are provided:
//!
//! - `dark` uses ANSI 16 colors (`Color::Reset`, `Color::DarkGray`, etc.) so it
//!   works on any terminal including 256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha` uses the Catppuccin Mocha palette in RGB; requires truecolor.

use hunkwise_core::types::Importance;
use ratatui::style::Color;
use tracing::warn;

/// All color values used across the viewer's UI surfaces.
///
/// Every field is a `ratatui::style::Color`. Callers use `theme.field` directly
/// inside `Style::default().fg(theme.border_active)`.
#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    /// Border color for the currently focused panel.
    pub border_active: Color,
    /// Border color for unfocused panels.
    pub border_inactive: Color,

    // Diff view
    /// Foreground for added lines (`+`).
    pub diff_added: Color,
    /// Foreground for removed lines (`-`).
    pub diff_removed: Color,
    /// Color for unchanged context lines and narrative text.
    pub diff_context: Color,
    /// Color for hunk header lines (`@@ ... @@`).
    pub diff_hunk_header: Color,
    /// Color for the `file:line` caption above each hunk.
    pub hunk_caption: Color,

    // Importance badges
    pub badge_high: Color,
    pub badge_medium: Color,
    pub badge_low: Color,
    /// Legacy reviews carry an empty importance.
    pub badge_unset: Color,

    // Review progress
    /// Mark color for hunks the reader has checked off.
    pub reviewed: Color,
    /// Mark color for hunks still to read.
    pub unreviewed: Color,

    // Status bar
    /// Status bar background.
    pub status_bar_bg: Color,
    /// Status bar foreground (general text).
    pub status_bar_fg: Color,
    /// Mode indicator color when in NORMAL mode.
    pub status_mode_normal: Color,
    /// Mode indicator color while a modal (retry, confirm) is open.
    pub status_mode_modal: Color,
    /// Color of the last watcher or generation error.
    pub status_error: Color,

    // General
    /// Application background (used for clearing areas).
    pub background: Color,
}

impl Theme {
    /// Returns the built-in dark theme using ANSI 16 colors.
    ///
    /// Works on all terminals: 16-color, 256-color, and truecolor.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            diff_added: Color::Green,
            diff_removed: Color::Red,
            diff_context: Color::Reset,
            diff_hunk_header: Color::Cyan,
            hunk_caption: Color::White,

            badge_high: Color::Red,
            badge_medium: Color::Yellow,
            badge_low: Color::Blue,
            badge_unset: Color::DarkGray,

            reviewed: Color::Green,
            unreviewed: Color::DarkGray,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode_normal: Color::Cyan,
            status_mode_modal: Color::Yellow,
            status_error: Color::LightRed,

            background: Color::Reset,
        }
    }

    /// Returns the Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// On non-truecolor terminals ratatui degrades the colors to the nearest
    /// ANSI 256-color approximation. Use `dark()` on SSH or 256-color terminals.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        // Catppuccin Mocha palette (selected subset)
        let green = Color::Rgb(166, 227, 161);    // #a6e3a1
        let red = Color::Rgb(243, 139, 168);      // #f38ba8
        let yellow = Color::Rgb(249, 226, 175);   // #f9e2af
        let blue = Color::Rgb(137, 180, 250);     // #89b4fa
        let teal = Color::Rgb(148, 226, 213);     // #94e2d5
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface1 = Color::Rgb(69, 71, 90);    // #45475a
        let base = Color::Rgb(30, 30, 46);        // #1e1e2e
        let text = Color::Rgb(205, 214, 244);     // #cdd6f4
        let peach = Color::Rgb(250, 179, 135);    // #fab387
        let mauve = Color::Rgb(203, 166, 247);    // #cba6f7

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            diff_added: green,
            diff_removed: red,
            diff_context: text,
            diff_hunk_header: teal,
            hunk_caption: mauve,

            badge_high: red,
            badge_medium: peach,
            badge_low: blue,
            badge_unset: overlay1,

            reviewed: green,
            unreviewed: overlay1,

            status_bar_bg: surface1,
            status_bar_fg: text,
            status_mode_normal: lavender,
            status_mode_modal: yellow,
            status_error: red,

            background: base,
        }
    }

    /// Resolves a theme name string to the corresponding built-in theme.
    ///
    /// Unknown names fall back to `dark()` so a typo in config never prevents
    /// startup. The fallback is logged, not a hard error.
    ///
    /// # Arguments
    ///
    /// * `name` — theme name from config, e.g. `"dark"` or `"catppuccin-mocha"`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                warn!(theme = %other, "unknown theme, falling back to 'dark'");
                Self::dark()
            }
        }
    }

    /// Badge color for a stored importance value (`None` for legacy reviews).
    pub fn importance(&self, importance: Option<Importance>) -> Color {
        match importance {
            Some(Importance::High) => self.badge_high,
            Some(Importance::Medium) => self.badge_medium,
            Some(Importance::Low) => self.badge_low,
            None => self.badge_unset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back_to_dark() {
        assert_eq!(Theme::from_name("solarized").border_active, Theme::dark().border_active);
        assert_eq!(
            Theme::from_name("catppuccin_mocha").border_active,
            Theme::catppuccin_mocha().border_active
        );
    }

    #[test]
    fn badges_follow_importance() {
        let theme = Theme::dark();
        assert_eq!(theme.importance(Some(Importance::High)), Color::Red);
        assert_eq!(theme.importance(None), theme.badge_unset);
    }
}
