pub mod error;
mod structural;

pub use error::ParseError;

use std::path::Path;

use tracing::debug;

use crate::Document;

/// Parser entry point.
pub struct Parser {
    origin: String,
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(origin: impl Into<String>, source: String, file_id: usize) -> Self {
        let source = if source.starts_with('\u{feff}') {
            strip_bom(&source).to_string()
        } else {
            source
        };
        Parser {
            origin: origin.into(),
            source,
            file_id,
        }
    }

    /// Parse the source Markdown into a complete Document.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        let parsed = structural::parse_document(&self.source, &self.origin, self.file_id)?;

        let title = parsed
            .sections
            .iter()
            .find(|section| section.level == 1)
            .map(|section| section.title.clone())
            .unwrap_or_else(|| fallback_title(&self.origin));

        debug!(
            document = %self.origin,
            sections = parsed.sections.len(),
            toc_entries = parsed.toc.len(),
            "parsed document"
        );

        Ok(Document {
            title,
            origin: self.origin.clone(),
            preamble: parsed.preamble,
            sections: parsed.sections,
            toc: parsed.toc,
            source_id: self.file_id,
        })
    }
}

/// Drop a leading UTF-8 byte-order mark. Spans reported by the parser
/// are offsets into the text this returns.
pub fn strip_bom(source: &str) -> &str {
    source.strip_prefix('\u{feff}').unwrap_or(source)
}

fn fallback_title(origin: &str) -> String {
    Path::new(origin)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.strip_suffix(".test").unwrap_or(stem).to_string())
        .unwrap_or_else(|| origin.to_string())
}
