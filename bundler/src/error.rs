use std::fmt;
use std::io;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use docbundle::parser::ParseError;

/// A fatal linking problem within one document.
#[derive(Debug, Clone)]
pub enum LinkError {
    /// Different section titles slugified to the same anchor.
    AmbiguousAnchor {
        document: String,
        file_id: usize,
        slug: String,
        /// `(title, span)` of every section sharing the slug, in source order.
        sections: Vec<(String, Range<usize>)>,
    },
}

impl LinkError {
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        match self {
            LinkError::AmbiguousAnchor {
                file_id,
                slug,
                sections,
                ..
            } => {
                let labels = sections
                    .iter()
                    .enumerate()
                    .map(|(i, (title, span))| {
                        let label = if i == 0 {
                            Label::primary(*file_id, span.clone())
                        } else {
                            Label::secondary(*file_id, span.clone())
                        };
                        label.with_message(format!("`{}` slugifies to `{}`", title, slug))
                    })
                    .collect();
                Diagnostic::error()
                    .with_message(self.to_string())
                    .with_labels(labels)
                    .with_notes(vec!["rename one of the sections so their anchors differ".into()])
            }
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::AmbiguousAnchor {
                document,
                slug,
                sections,
                ..
            } => {
                let titles: Vec<String> = sections.iter().map(|(t, _)| format!("`{}`", t)).collect();
                write!(
                    f,
                    "ambiguous anchor `#{}` in {}: sections {} share it",
                    slug,
                    document,
                    titles.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// A table-of-contents entry whose target matches no section anchor.
/// Reported as a warning; it does not stop rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedTocEntry {
    pub document: String,
    pub file_id: usize,
    /// Index into the document's `toc`.
    pub entry: usize,
    pub label: String,
    pub target: String,
    pub span: Range<usize>,
    /// An existing anchor the entry most likely meant.
    pub suggestion: Option<String>,
}

impl UnresolvedTocEntry {
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut notes = Vec::new();
        if let Some(suggestion) = &self.suggestion {
            notes.push(format!("did you mean `#{}`?", suggestion));
        }
        Diagnostic::warning()
            .with_message(self.to_string())
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone())
                    .with_message("no section has this anchor"),
            ])
            .with_notes(notes)
    }
}

impl fmt::Display for UnresolvedTocEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unresolved table-of-contents entry `{}` -> `#{}` in {}",
            self.label, self.target, self.document
        )
    }
}

/// I/O failure at the output boundary.
#[derive(Debug)]
pub struct RenderError {
    /// The output path or stream that failed.
    pub target: String,
    pub source: io::Error,
}

impl RenderError {
    pub fn new(target: impl Into<String>, source: io::Error) -> Self {
        RenderError {
            target: target.into(),
            source,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot write {}: {}", self.target, self.source)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Why a document was left out of the bundle.
#[derive(Debug, Clone)]
pub enum DocumentFailure {
    /// The file could not be read as UTF-8 text.
    Io {
        origin: String,
        message: String,
    },
    Parse {
        origin: String,
        errors: Vec<ParseError>,
    },
    Link {
        origin: String,
        errors: Vec<LinkError>,
    },
}

impl DocumentFailure {
    pub fn origin(&self) -> &str {
        match self {
            DocumentFailure::Io { origin, .. }
            | DocumentFailure::Parse { origin, .. }
            | DocumentFailure::Link { origin, .. } => origin,
        }
    }

    pub fn to_diagnostics(&self) -> Vec<Diagnostic<usize>> {
        match self {
            DocumentFailure::Io { .. } => {
                vec![Diagnostic::error().with_message(self.messages().join("; "))]
            }
            DocumentFailure::Parse { errors, .. } => {
                errors.iter().map(ParseError::to_diagnostic).collect()
            }
            DocumentFailure::Link { errors, .. } => {
                errors.iter().map(LinkError::to_diagnostic).collect()
            }
        }
    }

    /// One line per underlying error.
    pub fn messages(&self) -> Vec<String> {
        match self {
            DocumentFailure::Io { origin, message } => {
                vec![format!("cannot read '{}': {}", origin, message)]
            }
            DocumentFailure::Parse { errors, .. } => errors.iter().map(|e| e.to_string()).collect(),
            DocumentFailure::Link { errors, .. } => errors.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}
