//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips these escapes when the
//! stream is not a terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Semantic colors for CLI output
pub trait Stylize: Display + Sized {
    /// De-emphasized text
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    /// Success messages
    fn success(&self) -> String {
        self.green().to_string()
    }

    /// Errors
    fn error(&self) -> String {
        self.red().to_string()
    }
}

impl<T: Display> Stylize for T {}

/// Spinner style: the stack view above a spinner line
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix}{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}
