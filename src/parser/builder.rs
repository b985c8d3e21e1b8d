//! Section accumulation.
//!
//! The builder is folded over the segmented lines; each step consumes the
//! previous state and returns the next one.

use crate::domain::report::{Item, ItemKind, ParseResult, Section};

use super::classifier::{classify, LineClass};
use super::segmenter::keeps;

#[derive(Debug, Default)]
pub struct SectionBuilder {
    closed: Vec<Section>,
    open: Option<Section>,
}

impl SectionBuilder {
    /// Feed one line and return the updated state.
    pub fn accept(mut self, line: &str) -> Self {
        if !keeps(line, self.open.as_ref()) {
            return self;
        }

        match classify(line, self.open.as_ref()) {
            LineClass::Heading { number, title } => {
                self.open_section(Section::numbered(&number, &title))
            }
            LineClass::CautionHeading => self.open_section(Section::caution()),
            LineClass::Orphan | LineClass::Blank => {}
            LineClass::Field { key, value } => self.push(ItemKind::KeyValue { key, value }),
            LineClass::Bullet(content) => self.push(ItemKind::Bullet { content }),
            LineClass::Paragraph(content) => {
                if let Some(section) = self.open.as_mut() {
                    section.push_paragraph(content);
                }
            }
        }
        self
    }

    /// Close the open section, if any, and return every section in order.
    pub fn finish(mut self) -> ParseResult {
        self.closed.extend(self.open.take());
        self.closed
    }

    fn open_section(&mut self, section: Section) {
        if let Some(previous) = self.open.replace(section) {
            self.closed.push(previous);
        }
    }

    fn push(&mut self, kind: ItemKind) {
        if let Some(section) = self.open.as_mut() {
            section.items.push(Item::new(kind));
        }
    }
}
