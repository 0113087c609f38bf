use std::ops::Range;

use tracing::debug;

use docbundle::Document;
use docbundle::slug::slugify;

use crate::error::{LinkError, UnresolvedTocEntry};

/// How one table-of-contents entry was linked.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved { entry: usize, section: usize },
    Unresolved(UnresolvedTocEntry),
}

/// Outcome of linking a document's table of contents. Holds exactly one
/// resolution per TOC entry, in entry order.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub resolutions: Vec<Resolution>,
}

impl LinkReport {
    /// `(entry index, section index)` pairs for resolved entries.
    pub fn resolved(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.resolutions.iter().filter_map(|r| match r {
            Resolution::Resolved { entry, section } => Some((*entry, *section)),
            Resolution::Unresolved(_) => None,
        })
    }

    pub fn unresolved(&self) -> Vec<&UnresolvedTocEntry> {
        self.resolutions
            .iter()
            .filter_map(|r| match r {
                Resolution::Unresolved(u) => Some(u),
                Resolution::Resolved { .. } => None,
            })
            .collect()
    }

    /// True when every entry resolved.
    pub fn is_valid(&self) -> bool {
        self.resolutions
            .iter()
            .all(|r| matches!(r, Resolution::Resolved { .. }))
    }
}

/// Check every TOC entry of `doc` against the generated section anchors.
///
/// Unresolved entries are collected in the report. Sections whose distinct
/// titles produced the same slug make the whole document fail with
/// [`LinkError::AmbiguousAnchor`]; repeated identical titles do not.
pub fn link(doc: &Document) -> Result<LinkReport, Vec<LinkError>> {
    let errors = find_ambiguous_anchors(doc);
    if !errors.is_empty() {
        return Err(errors);
    }

    let resolutions: Vec<Resolution> = doc
        .toc
        .iter()
        .enumerate()
        .map(|(index, entry)| match doc.section_by_anchor(&entry.target) {
            Some((section, _)) => Resolution::Resolved {
                entry: index,
                section,
            },
            None => Resolution::Unresolved(UnresolvedTocEntry {
                document: doc.origin.clone(),
                file_id: doc.source_id,
                entry: index,
                label: entry.label.clone(),
                target: entry.target.clone(),
                span: entry.span.clone(),
                suggestion: suggest_anchor(doc, &entry.label, &entry.target),
            }),
        })
        .collect();

    let report = LinkReport { resolutions };
    debug!(
        document = %doc.origin,
        entries = doc.toc.len(),
        unresolved = report.unresolved().len(),
        "linked table of contents"
    );
    Ok(report)
}

fn find_ambiguous_anchors(doc: &Document) -> Vec<LinkError> {
    // slug -> sections sharing it, in order of first occurrence
    let mut groups: Vec<(&str, Vec<(&str, Range<usize>)>)> = Vec::new();
    for section in &doc.sections {
        match groups.iter_mut().find(|(slug, _)| *slug == section.slug) {
            Some((_, members)) => members.push((section.title.as_str(), section.span.clone())),
            None => groups.push((
                section.slug.as_str(),
                vec![(section.title.as_str(), section.span.clone())],
            )),
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| {
            members
                .iter()
                .any(|(title, _)| *title != members[0].0)
        })
        .map(|(slug, members)| LinkError::AmbiguousAnchor {
            document: doc.origin.clone(),
            file_id: doc.source_id,
            slug: slug.to_string(),
            sections: members
                .into_iter()
                .map(|(title, span)| (title.to_string(), span))
                .collect(),
        })
        .collect()
}

/// Propose an existing anchor for a dangling entry: the slug of its label,
/// or its target lower-cased.
fn suggest_anchor(doc: &Document, label: &str, target: &str) -> Option<String> {
    [slugify(label), target.to_lowercase()]
        .into_iter()
        .find(|candidate| candidate != target && doc.section_by_anchor(candidate).is_some())
}
