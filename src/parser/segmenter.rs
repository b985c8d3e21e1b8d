//! Splits raw response text into logical lines.

use crate::domain::report::Section;

/// Iterate the lines of `raw`, stripping `\n` / `\r\n` terminators.
pub fn segment(raw: &str) -> std::str::Lines<'_> {
    raw.lines()
}

/// Whether a line reaches the classifier given the currently open section.
///
/// Whitespace-only lines are kept only once the open section holds content.
pub fn keeps(line: &str, open: Option<&Section>) -> bool {
    if !line.trim().is_empty() {
        return true;
    }
    open.is_some_and(|section| !section.items.is_empty())
}
