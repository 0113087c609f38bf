use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use docbundle::parser::{Parser, strip_bom};
use docbundle::slug::AnchorAllocator;

use crate::error::{DocumentFailure, RenderError, UnresolvedTocEntry};
use crate::linker;
use crate::render::{self, Format, LinkedDocument};

/// One input file, already read.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub origin: String,
    pub source: String,
    /// ID in the caller's codespan file database.
    pub file_id: usize,
}

/// Per-document outcome of parsing and linking a set of inputs.
#[derive(Debug, Default)]
pub struct BundleReport {
    /// Documents that parsed and linked, in input order.
    pub documents: Vec<LinkedDocument>,
    /// Documents that could not be read, or failed with a parse or link error.
    pub failures: Vec<DocumentFailure>,
}

impl BundleReport {
    pub fn warnings(&self) -> Vec<&UnresolvedTocEntry> {
        self.documents
            .iter()
            .flat_map(|doc| doc.report.unresolved())
            .collect()
    }

    /// A run fails on any parse or ambiguity error, and under `strict`
    /// also on unresolved TOC entries.
    pub fn is_success(&self, strict: bool) -> bool {
        self.failures.is_empty() && (!strict || self.warnings().is_empty())
    }
}

/// Read one input as UTF-8, dropping any byte-order mark.
pub fn read_input(path: &Path) -> Result<String, DocumentFailure> {
    fs::read_to_string(path)
        .map(|text| strip_bom(&text).to_string())
        .map_err(|e| DocumentFailure::Io {
            origin: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Read, parse and link every path. `register` adds each readable file to
/// the caller's diagnostics database and returns its id. Unreadable files
/// are reported as failures without stopping the others.
pub fn process_paths(
    paths: &[PathBuf],
    mut register: impl FnMut(&str, &str) -> usize,
) -> BundleReport {
    let mut sources = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in paths {
        match read_input(path) {
            Ok(source) => {
                let origin = path.display().to_string();
                let file_id = register(&origin, &source);
                sources.push(SourceFile {
                    origin,
                    source,
                    file_id,
                });
            }
            Err(failure) => {
                warn!(document = %path.display(), "read failed");
                unreadable.push(failure);
            }
        }
    }

    let mut report = process(&sources);
    report.failures.extend(unreadable);
    report
}

/// Parse and link every source independently.
pub fn process(sources: &[SourceFile]) -> BundleReport {
    let mut report = BundleReport::default();

    for file in sources {
        let parser = Parser::new(file.origin.clone(), file.source.clone(), file.file_id);
        let document = match parser.parse() {
            Ok(doc) => doc,
            Err(errors) => {
                warn!(document = %file.origin, errors = errors.len(), "parse failed");
                report.failures.push(DocumentFailure::Parse {
                    origin: file.origin.clone(),
                    errors,
                });
                continue;
            }
        };

        match linker::link(&document) {
            Ok(link_report) => report.documents.push(LinkedDocument {
                document,
                report: link_report,
            }),
            Err(errors) => {
                warn!(document = %file.origin, errors = errors.len(), "link failed");
                report.failures.push(DocumentFailure::Link {
                    origin: file.origin.clone(),
                    errors,
                });
            }
        }
    }

    report
}

/// How rendered documents are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// All documents concatenated into one file.
    #[default]
    Single,
    /// One file per document inside an output directory.
    PerDocument,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Layout::Single),
            "per-document" => Ok(Layout::PerDocument),
            other => Err(format!(
                "unknown layout `{}` (expected single or per-document)",
                other
            )),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Single => write!(f, "single"),
            Layout::PerDocument => write!(f, "per-document"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub title: String,
    pub format: Format,
    pub layout: Layout,
    /// Output file for `Single`, output directory for `PerDocument`.
    pub path: PathBuf,
}

/// Render `docs` to the filesystem. Returns the files written.
pub fn write_output(
    docs: &[LinkedDocument],
    options: &OutputOptions,
) -> Result<Vec<PathBuf>, RenderError> {
    match options.layout {
        Layout::Single => {
            let path = &options.path;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| path_error(parent, e))?;
            }
            let mut out = BufWriter::new(File::create(path).map_err(|e| path_error(path, e))?);
            render::render_bundle(&options.title, docs, options.format, &mut out)
                .map_err(|e| path_error(path, e.source))?;
            info!(path = %path.display(), documents = docs.len(), "wrote bundle");
            Ok(vec![path.clone()])
        }
        Layout::PerDocument => {
            let dir = &options.path;
            fs::create_dir_all(dir).map_err(|e| path_error(dir, e))?;

            let mut stems = AnchorAllocator::new();
            let mut written = Vec::with_capacity(docs.len());
            for doc in docs {
                let stem = stems.allocate(&file_stem(&doc.document.origin));
                let path = dir.join(format!("{}.{}", stem, options.format.extension()));
                let mut out =
                    BufWriter::new(File::create(&path).map_err(|e| path_error(&path, e))?);
                render::render_document(doc, options.format, &mut out)
                    .map_err(|e| path_error(&path, e.source))?;
                debug!(path = %path.display(), "wrote document");
                written.push(path);
            }
            info!(dir = %dir.display(), documents = docs.len(), "wrote documents");
            Ok(written)
        }
    }
}

fn path_error(path: &Path, source: io::Error) -> RenderError {
    RenderError::new(format!("`{}`", path.display()), source)
}

fn file_stem(origin: &str) -> String {
    Path::new(origin)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_string()
}

/// Expand files and directories into the markdown inputs they name.
/// Directories are walked recursively; `.test.md` fixtures are skipped.
/// Files named explicitly are always kept. Results are sorted per directory.
pub fn discover_inputs(paths: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            collect_markdown(path, &mut found)?;
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".md") && !name.ends_with(".test.md") {
                out.push(path);
            }
        }
    }
    Ok(())
}
