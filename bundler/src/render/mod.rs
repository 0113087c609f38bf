mod html;
mod markdown;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use docbundle::Document;
use tracing::debug;

use crate::error::RenderError;
use crate::linker::LinkReport;

/// A document that parsed and linked, ready to render.
#[derive(Debug, Clone)]
pub struct LinkedDocument {
    pub document: Document,
    pub report: LinkReport,
}

/// Output format of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Markdown,
    Html,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Html => "html",
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Format::Markdown),
            "html" => Ok(Format::Html),
            other => Err(format!("unknown format `{}` (expected markdown or html)", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Markdown => write!(f, "markdown"),
            Format::Html => write!(f, "html"),
        }
    }
}

/// Render a single document as a standalone artifact.
pub fn render_document<W: Write>(
    doc: &LinkedDocument,
    format: Format,
    out: &mut W,
) -> Result<(), RenderError> {
    let result = match format {
        Format::Markdown => markdown::write_document(&doc.document, out),
        Format::Html => html::write_page(&doc.document.title, std::slice::from_ref(doc), false, out),
    };
    result
        .and_then(|_| out.flush())
        .map_err(|e| RenderError::new(format!("`{}` output", doc.document.origin), e))?;
    debug!(document = %doc.document.origin, %format, "rendered document");
    Ok(())
}

/// Render several documents, in order, into one artifact.
pub fn render_bundle<W: Write>(
    title: &str,
    docs: &[LinkedDocument],
    format: Format,
    out: &mut W,
) -> Result<(), RenderError> {
    let result = match format {
        Format::Markdown => markdown::write_bundle(docs, out),
        Format::Html => html::write_page(title, docs, true, out),
    };
    result
        .and_then(|_| out.flush())
        .map_err(|e| RenderError::new("bundle output", e))?;
    debug!(documents = docs.len(), %format, "rendered bundle");
    Ok(())
}
