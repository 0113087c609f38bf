pub mod body;
pub mod parser;
pub mod section;
pub mod slug;
pub mod toc;

use crate::body::Body;
use crate::section::{CodeBlock, Section};
use crate::toc::TocEntry;

/// A parsed documentation topic file.
#[derive(Debug, Clone)]
pub struct Document {
    /// First level-1 heading title, or the origin file stem.
    pub title: String,
    /// Where the source came from (usually a file path).
    pub origin: String,
    /// Content that precedes the first heading.
    pub preamble: Body,
    /// Heading-delimited sections, in source order.
    pub sections: Vec<Section>,
    /// Declared table-of-contents entries, in source order.
    pub toc: Vec<TocEntry>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    /// Find the section carrying the given generated anchor.
    pub fn section_by_anchor(&self, anchor: &str) -> Option<(usize, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, section)| section.anchor == anchor)
    }

    /// Every code block in the document, in source order.
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut blocks = self.preamble.code_blocks();
        for section in &self.sections {
            blocks.extend(section.code_blocks());
        }
        blocks
    }
}
