use std::ops::Range;

/// A declared table-of-contents link: `- [Label](#target)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Link text as displayed.
    pub label: String,
    /// Fragment target without the leading `#`.
    pub target: String,
    /// List nesting depth, 0 for a top-level list.
    pub depth: usize,
    /// Byte span of the list item in source.
    pub span: Range<usize>,
}

impl TocEntry {
    /// Parse a link destination into a fragment target, if it is one.
    /// Only pure in-document fragments (`#anchor`) count.
    pub fn fragment(dest: &str) -> Option<&str> {
        let target = dest.strip_prefix('#')?;
        if target.is_empty() { None } else { Some(target) }
    }
}
