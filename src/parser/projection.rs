//! Display projection of a parsed report.
//!
//! Items of a section are regrouped by kind. Fields come first, then
//! bullets, then paragraphs, each group keeping encounter order.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::report::{ItemKind, Section};

pub const EMPTY_RESPONSE_MESSAGE: &str = "AIからの応答が空でした。";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub id: Uuid,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextView {
    pub id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub is_caution: bool,
    pub fields: Vec<FieldView>,
    pub bullets: Vec<TextView>,
    pub paragraphs: Vec<TextView>,
}

impl From<&Section> for SectionView {
    fn from(section: &Section) -> Self {
        let mut view = SectionView {
            id: section.id.clone(),
            title: section.title.clone(),
            is_caution: section.is_caution,
            fields: Vec::new(),
            bullets: Vec::new(),
            paragraphs: Vec::new(),
        };

        for item in &section.items {
            match &item.kind {
                ItemKind::KeyValue { key, value } => view.fields.push(FieldView {
                    id: item.id,
                    key: key.clone(),
                    value: value.clone(),
                }),
                ItemKind::Bullet { content } => view.bullets.push(TextView {
                    id: item.id,
                    content: content.clone(),
                }),
                ItemKind::Paragraph { content } => view.paragraphs.push(TextView {
                    id: item.id,
                    content: content.clone(),
                }),
            }
        }

        view
    }
}

/// What a client should display for one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReportView {
    /// The response was empty or whitespace-only.
    Empty { message: String },
    /// No headings were found; show the raw text line by line.
    Unstructured { lines: Vec<String> },
    Structured { sections: Vec<SectionView> },
}

/// Build the display view for `raw` and its parsed sections.
pub fn project(raw: &str, sections: &[Section]) -> ReportView {
    if raw.trim().is_empty() {
        return ReportView::Empty {
            message: EMPTY_RESPONSE_MESSAGE.to_string(),
        };
    }

    if sections.is_empty() {
        return ReportView::Unstructured {
            lines: raw.lines().map(str::to_string).collect(),
        };
    }

    ReportView::Structured {
        sections: sections.iter().map(SectionView::from).collect(),
    }
}

/// Render a view as Markdown.
pub fn render_markdown(view: &ReportView) -> String {
    match view {
        ReportView::Empty { message } => format!("{}\n", message),
        // Two trailing spaces keep the line breaks as hard breaks
        ReportView::Unstructured { lines } => {
            let mut out = lines.join("  \n");
            out.push('\n');
            out
        }
        ReportView::Structured { sections } => {
            let blocks: Vec<String> = sections.iter().map(render_section).collect();
            blocks.join("\n")
        }
    }
}

fn render_section(section: &SectionView) -> String {
    let mut out = if section.is_caution {
        format!("## ⚠️ {}\n", section.title)
    } else {
        format!("## {}\n", section.title)
    };

    if !section.fields.is_empty() {
        out.push('\n');
        for field in &section.fields {
            out.push_str(&format!("- **{}**: {}\n", field.key, field.value));
        }
    }

    if !section.bullets.is_empty() {
        out.push('\n');
        for bullet in &section.bullets {
            out.push_str(&format!("- {}\n", bullet.content));
        }
    }

    for paragraph in &section.paragraphs {
        out.push('\n');
        out.push_str(&paragraph.content.replace('\n', "  \n"));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_report;

    fn structured(view: ReportView) -> Vec<SectionView> {
        match view {
            ReportView::Structured { sections } => sections,
            other => panic!("expected structured view, got {:?}", other),
        }
    }

    #[test]
    fn empty_text_shows_empty_state() {
        for raw in ["", " \n\t "] {
            let view = project(raw, &parse_report(raw));
            assert!(matches!(view, ReportView::Empty { .. }));
        }
    }

    #[test]
    fn unparsable_text_falls_back_to_raw_lines() {
        let raw = "見出しがありません\n\n二行目";
        let view = project(raw, &parse_report(raw));
        assert_eq!(
            view,
            ReportView::Unstructured {
                lines: vec!["見出しがありません".into(), "".into(), "二行目".into()],
            }
        );
    }

    #[test]
    fn groups_are_ordered_fields_bullets_paragraphs() {
        let raw = "1. 建物概要\n所見です。\n- 箇条一\n構造: 木造\n- 箇条二\n階数: 3階";
        let sections = structured(project(raw, &parse_report(raw)));
        let overview = &sections[0];

        let fields: Vec<_> = overview
            .fields
            .iter()
            .map(|f| (f.key.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(fields, vec![("構造", "木造"), ("階数", "3階")]);

        let bullets: Vec<_> = overview.bullets.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(bullets, vec!["箇条一", "箇条二"]);

        let paragraphs: Vec<_> = overview
            .paragraphs
            .iter()
            .map(|p| p.content.as_str())
            .collect();
        assert_eq!(paragraphs, vec!["所見です。"]);
    }

    #[test]
    fn caution_flag_is_carried() {
        let raw = "2. 工事\n- 足場\n写真から読み取れる注意点・追加費用のリスク\n- 地中埋設物";
        let sections = structured(project(raw, &parse_report(raw)));
        assert!(!sections[0].is_caution);
        assert!(sections[1].is_caution);
    }

    #[test]
    fn markdown_rendering() {
        let raw = "1. 建物概要\n- 瓦屋根\n構造: 木造\n老朽化あり\n写真から読み取れる注意点・追加費用のリスク\n- アスベスト";
        let markdown = render_markdown(&project(raw, &parse_report(raw)));
        let expected = "## 建物概要\n\n- **構造**: 木造\n\n- 瓦屋根\n\n老朽化あり\n\n## ⚠️ 写真から読み取れる注意点・追加費用のリスク\n\n- アスベスト\n";
        assert_eq!(markdown, expected);
    }

    #[test]
    fn markdown_for_fallback_states() {
        let raw = "一行目\n二行目";
        let markdown = render_markdown(&project(raw, &parse_report(raw)));
        assert_eq!(markdown, "一行目  \n二行目\n");

        let markdown = render_markdown(&project("", &[]));
        assert_eq!(markdown, format!("{}\n", EMPTY_RESPONSE_MESSAGE));
    }
}
