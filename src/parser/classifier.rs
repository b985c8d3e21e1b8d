//! Line classification.
//!
//! Patterns are tried in a fixed priority order; the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::report::{Section, CAUTION_HEADING, OVERVIEW_KEYS};

/// `1. Title`
static HEADING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)\.\s(.+)").unwrap());

/// `key: value`, split at the first colon
static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):\s(.+)").unwrap());

/// `- item`, optionally indented
static BULLET_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-\s(.+)").unwrap());

/// Outcome of classifying a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Close the open section and open `section-<number>`.
    Heading { number: String, title: String },
    /// Close the open section and open the caution section.
    CautionHeading,
    /// Content before the first heading; not represented.
    Orphan,
    Field { key: String, value: String },
    Bullet(String),
    Paragraph(String),
    Blank,
}

pub fn classify(line: &str, open: Option<&Section>) -> LineClass {
    if let Some(caps) = HEADING_REGEX.captures(line) {
        return LineClass::Heading {
            number: caps[1].to_string(),
            title: caps[2].trim().to_string(),
        };
    }

    let trimmed = line.trim();
    if trimmed == CAUTION_HEADING {
        return LineClass::CautionHeading;
    }

    let Some(section) = open else {
        return LineClass::Orphan;
    };

    if section.accepts_fields() {
        if let Some(caps) = FIELD_REGEX.captures(line) {
            let key = caps[1].trim();
            if OVERVIEW_KEYS.contains(&key) {
                return LineClass::Field {
                    key: key.to_string(),
                    value: caps[2].trim().to_string(),
                };
            }
        }
    }

    if let Some(caps) = BULLET_REGEX.captures(line) {
        return LineClass::Bullet(caps[1].trim().to_string());
    }

    if trimmed.is_empty() {
        LineClass::Blank
    } else {
        LineClass::Paragraph(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn overview() -> Section {
        Section::numbered("1", "建物概要")
    }

    fn heading(number: &str, title: &str) -> LineClass {
        LineClass::Heading {
            number: number.into(),
            title: title.into(),
        }
    }

    fn field(key: &str, value: &str) -> LineClass {
        LineClass::Field {
            key: key.into(),
            value: value.into(),
        }
    }

    #[rstest]
    #[case("1. 建物概要", heading("1", "建物概要"))]
    #[case("12. 解体工事の流れ  ", heading("12", "解体工事の流れ"))]
    #[case("3.  余白付き", heading("3", "余白付き"))]
    #[case("1.建物概要", LineClass::Orphan)]
    #[case(" 1. 字下げ", LineClass::Orphan)]
    #[case("１. 全角数字", LineClass::Orphan)]
    fn numbered_headings(#[case] line: &str, #[case] expected: LineClass) {
        assert_eq!(classify(line, None), expected);
    }

    #[test]
    fn heading_wins_over_other_patterns() {
        let open = overview();
        assert_eq!(classify("2. 構造: 木造", Some(&open)), heading("2", "構造: 木造"));
    }

    #[rstest]
    #[case("写真から読み取れる注意点・追加費用のリスク")]
    #[case("  写真から読み取れる注意点・追加費用のリスク \t")]
    fn caution_heading_matches_trimmed_literal(#[case] line: &str) {
        assert_eq!(classify(line, None), LineClass::CautionHeading);
        assert_eq!(classify(line, Some(&overview())), LineClass::CautionHeading);
    }

    #[test]
    fn caution_heading_needs_exact_text() {
        let line = "写真から読み取れる注意点・追加費用のリスク:";
        assert_eq!(classify(line, None), LineClass::Orphan);
    }

    #[test]
    fn lines_before_any_heading_are_orphans() {
        assert_eq!(classify("構造: 木造", None), LineClass::Orphan);
        assert_eq!(classify("- 箇条", None), LineClass::Orphan);
        assert_eq!(classify("", None), LineClass::Orphan);
    }

    #[rstest]
    #[case("構造: 木造", field("構造", "木造"))]
    #[case("種類: 戸建住宅", field("種類", "戸建住宅"))]
    #[case("延床面積: 約120㎡ ", field("延床面積", "約120㎡"))]
    #[case(" 階数 : 2階", field("階数", "2階"))]
    #[case("構造: 時刻 10:30 撮影", field("構造", "時刻 10:30 撮影"))]
    fn whitelisted_fields_in_overview(#[case] line: &str, #[case] expected: LineClass) {
        assert_eq!(classify(line, Some(&overview())), expected);
    }

    #[rstest]
    #[case("用途: 住宅", LineClass::Paragraph("用途: 住宅".into()))]
    #[case("構造:木造", LineClass::Paragraph("構造:木造".into()))]
    #[case("構造：木造", LineClass::Paragraph("構造：木造".into()))]
    #[case("- 構造: 木造", LineClass::Bullet("構造: 木造".into()))]
    fn non_fields_in_overview_fall_through(#[case] line: &str, #[case] expected: LineClass) {
        assert_eq!(classify(line, Some(&overview())), expected);
    }

    #[test]
    fn fields_only_recognized_in_overview() {
        let other = Section::numbered("2", "周辺環境");
        assert_eq!(
            classify("構造: 木造", Some(&other)),
            LineClass::Paragraph("構造: 木造".into())
        );
        assert_eq!(
            classify("構造: 木造", Some(&Section::caution())),
            LineClass::Paragraph("構造: 木造".into())
        );
    }

    #[rstest]
    #[case("- 屋根に瓦使用", "屋根に瓦使用")]
    #[case("    - 字下げ項目  ", "字下げ項目")]
    #[case("\t- タブ", "タブ")]
    fn bullets(#[case] line: &str, #[case] content: &str) {
        let open = Section::numbered("2", "工事");
        assert_eq!(classify(line, Some(&open)), LineClass::Bullet(content.into()));
    }

    #[test]
    fn dash_without_space_is_paragraph() {
        let open = Section::numbered("2", "工事");
        assert_eq!(
            classify("-詰めた項目", Some(&open)),
            LineClass::Paragraph("-詰めた項目".into())
        );
    }

    #[test]
    fn blank_and_paragraph_lines() {
        let open = Section::numbered("2", "工事");
        assert_eq!(classify("   ", Some(&open)), LineClass::Blank);
        assert_eq!(
            classify("  老朽化が見られる。 ", Some(&open)),
            LineClass::Paragraph("老朽化が見られる。".into())
        );
    }
}
