//! Structured survey report types.
//!
//! A report is the structured form of one free-text model response: an
//! ordered list of sections, each holding an ordered list of typed items.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the caution section.
pub const CAUTION_SECTION_ID: &str = "section-cautions";

/// Heading text that opens the caution section.
pub const CAUTION_HEADING: &str = "写真から読み取れる注意点・追加費用のリスク";

/// Identifier of the only section where key-value fields are recognized.
pub const OVERVIEW_SECTION_ID: &str = "section-1";

/// Labels recognized as key-value fields inside the overview section.
pub const OVERVIEW_KEYS: [&str; 4] = ["構造", "種類", "延床面積", "階数"];

/// One heading-delimited grouping of the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub items: Vec<Item>,
    pub is_caution: bool,
}

impl Section {
    pub fn numbered(number: &str, title: &str) -> Self {
        Self {
            id: format!("section-{}", number),
            title: title.to_string(),
            items: Vec::new(),
            is_caution: false,
        }
    }

    pub fn caution() -> Self {
        Self {
            id: CAUTION_SECTION_ID.to_string(),
            title: CAUTION_HEADING.to_string(),
            items: Vec::new(),
            is_caution: true,
        }
    }

    /// Whether key-value fields are recognized in this section.
    pub fn accepts_fields(&self) -> bool {
        self.id == OVERVIEW_SECTION_ID
    }

    /// Append a paragraph line, continuing the last item if it is a paragraph.
    pub fn push_paragraph(&mut self, line: String) {
        if let Some(Item {
            kind: ItemKind::Paragraph { content },
            ..
        }) = self.items.last_mut()
        {
            content.push('\n');
            content.push_str(&line);
            return;
        }
        self.items.push(Item::new(ItemKind::Paragraph { content: line }));
    }

    #[cfg(test)]
    pub fn kinds(&self) -> impl Iterator<Item = &ItemKind> {
        self.items.iter().map(|item| &item.kind)
    }
}

/// One classified content unit within a section.
///
/// The `id` only serves as a stable rendering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    KeyValue { key: String, value: String },
    Bullet { content: String },
    Paragraph { content: String },
}

/// Complete ordered output of parsing one response.
pub type ParseResult = Vec<Section>;

/// Structural equality of two parse results, ignoring item identifiers.
#[cfg(test)]
pub fn same_structure(a: &[Section], b: &[Section]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.id == y.id
                && x.title == y.title
                && x.is_caution == y.is_caution
                && x.kinds().eq(y.kinds())
        })
}
