//! Survey report parser.
//!
//! Converts a free-form model response into a [`ParseResult`]:
//! - `segmenter` splits the text into lines
//! - `classifier` types each line
//! - `builder` folds the lines into sections
//! - `projection` groups a parsed report for display
//!
//! Parsing is pure and total: every input, including the empty string,
//! yields a (possibly empty) list of sections.

pub mod builder;
pub mod classifier;
pub mod projection;
pub mod segmenter;

pub use builder::SectionBuilder;
pub use projection::{project, render_markdown, ReportView};

use crate::domain::report::ParseResult;

/// Parse a raw model response into ordered sections.
pub fn parse_report(raw: &str) -> ParseResult {
    segmenter::segment(raw)
        .fold(SectionBuilder::default(), SectionBuilder::accept)
        .finish()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::report::{same_structure, CAUTION_HEADING};
    use proptest::prelude::*;

    /// Lines that can never open a section
    fn body_line() -> impl Strategy<Value = String> {
        "[ a-z0-9.:\\-構造種類階数木造注意点]{0,24}".prop_filter("opens a section", |line| {
            !line.starts_with(|c: char| c.is_ascii_digit()) && line.trim() != CAUTION_HEADING
        })
    }

    fn any_line() -> impl Strategy<Value = String> {
        prop_oneof![
            "[0-9]{1,3}\\.[ \t][^\n\r]{0,12}",
            Just(CAUTION_HEADING.to_string()),
            "(構造|種類|延床面積|階数|備考): ?[^\n\r]{0,12}",
            "[ \t]*-[ \t]?[^\n\r]{0,12}",
            body_line(),
            "[ \t]{0,3}",
        ]
    }

    proptest! {
        #[test]
        fn text_without_headings_has_no_sections(
            lines in prop::collection::vec(body_line(), 0..12)
        ) {
            prop_assert!(parse_report(&lines.join("\n")).is_empty());
        }

        #[test]
        fn reparsing_mixed_lines_is_stable(
            lines in prop::collection::vec(any_line(), 0..16),
            crlf in any::<bool>(),
        ) {
            let text = lines.join(if crlf { "\r\n" } else { "\n" });
            let first = parse_report(&text);
            prop_assert!(same_structure(&first, &parse_report(&text)));
            render_markdown(&project(&text, &first));
        }

        #[test]
        fn arbitrary_text_parses_and_renders(text in any::<String>()) {
            let sections = parse_report(&text);
            prop_assert!(same_structure(&sections, &parse_report(&text)));
            render_markdown(&project(&text, &sections));
        }
    }
}
