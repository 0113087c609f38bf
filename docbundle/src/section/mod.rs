use std::ops::Range;

use crate::body::{Body, InlineNode, Inlines};

/// A heading-delimited unit of a document.
#[derive(Debug, Clone)]
pub struct Section {
    /// Heading level: 1 = `#`, 6 = `######`.
    pub level: u8,
    /// Heading text, whitespace-normalized.
    pub title: String,
    /// Heading content with its inline markup, as written.
    pub heading: Vec<InlineNode>,
    /// Generated anchor, unique within the document.
    pub anchor: String,
    /// Slug of the title before any collision suffix was applied.
    pub slug: String,
    /// Everything between this heading and the next one.
    pub body: Body,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

impl Section {
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        self.body.code_blocks()
    }

    /// The heading as a single ATX line, e.g. ``## Using `_private_` names``.
    pub fn heading_markdown(&self) -> String {
        let inlines: Vec<InlineNode> = self
            .heading
            .iter()
            .map(|inline| match inline {
                InlineNode::SoftBreak | InlineNode::HardBreak => InlineNode::Text(" ".to_string()),
                other => other.clone(),
            })
            .collect();
        format!("{} {}", "#".repeat(self.level as usize), Inlines(&inlines))
    }

    /// True when the anchor was disambiguated with a numeric suffix.
    pub fn is_suffixed(&self) -> bool {
        self.anchor != self.slug
    }
}

/// An embedded example snippet. The content is opaque and never reformatted.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// Info string of the opening fence; empty for indented blocks.
    pub language: String,
    /// Raw text between the fences.
    pub content: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, content: impl Into<String>) -> Self {
        CodeBlock {
            language: language.into(),
            content: content.into(),
        }
    }
}
