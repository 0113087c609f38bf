use std::ops::Range;

use pulldown_cmark::{
    CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd,
};

use crate::body::{Body, BodyNode, ColumnAlignment, InlineNode, inline_text};
use crate::parser::error::{ParseError, byte_offset_to_line};
use crate::section::{CodeBlock, Section};
use crate::slug::{AnchorAllocator, slugify};
use crate::toc::TocEntry;

type Events<'e> = [(Event<'e>, Range<usize>)];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub(crate) struct ParsedDocument {
    pub preamble: Body,
    pub sections: Vec<Section>,
    pub toc: Vec<TocEntry>,
}

/// Parse Markdown source text into sections, preamble and declared TOC.
pub(crate) fn parse_document(
    source: &str,
    origin: &str,
    file_id: usize,
) -> Result<ParsedDocument, Vec<ParseError>> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(source, origin, file_id);
    state.process_events(&events);
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    origin: &'a str,
    file_id: usize,
    anchors: AnchorAllocator,
    /// Levels of the open heading chain, outermost first.
    open_levels: Vec<u8>,
    current: Option<SectionBuilder>,
    preamble: Vec<BodyNode>,
    sections: Vec<Section>,
    toc: Vec<TocEntry>,
    list_depth: usize,
    errors: Vec<ParseError>,
}

struct SectionBuilder {
    level: u8,
    title: String,
    heading: Vec<InlineNode>,
    slug: String,
    anchor: String,
    nodes: Vec<BodyNode>,
    span_start: usize,
}

impl SectionBuilder {
    fn into_section(self, span_end: usize) -> Section {
        Section {
            level: self.level,
            title: self.title,
            heading: self.heading,
            anchor: self.anchor,
            slug: self.slug,
            body: Body { nodes: self.nodes },
            span: self.span_start..span_end,
        }
    }
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, origin: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            origin,
            file_id,
            anchors: AnchorAllocator::new(),
            open_levels: Vec::new(),
            current: None,
            preamble: Vec::new(),
            sections: Vec::new(),
            toc: Vec::new(),
            list_depth: 0,
            errors: Vec::new(),
        }
    }

    fn error_at(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(message, span, self.file_id).located(self.origin, self.source)
    }

    fn process_events(&mut self, events: &Events<'_>) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::Heading { level, .. }) => {
                    let level = heading_level_to_u8(level);
                    i += 1;
                    let heading =
                        self.collect_inlines(events, &mut i, &|e| matches!(e, TagEnd::Heading(_)));
                    self.open_section(level, heading, range.clone());
                }
                _ => {
                    if let Some(node) = self.collect_block(events, &mut i) {
                        self.push_node(node);
                    }
                }
            }
        }
    }

    fn push_node(&mut self, node: BodyNode) {
        match self.current.as_mut() {
            Some(builder) => builder.nodes.push(node),
            None => self.preamble.push(node),
        }
    }

    /// Validate a heading, close the previous section and start a new one.
    fn open_section(&mut self, level: u8, heading: Vec<InlineNode>, span: Range<usize>) {
        let title = normalize_title(&inline_text(&heading));
        let slug = slugify(&title);

        if title.is_empty() {
            let err = self.error_at("heading has no title", span.clone());
            self.errors.push(err);
        } else if slug.is_empty() {
            let err = self
                .error_at(
                    format!("heading `{}` has no characters usable in an anchor", title),
                    span.clone(),
                )
                .with_note("anchors keep letters, digits, `-` and `_`");
            self.errors.push(err);
        }

        while self.open_levels.last().is_some_and(|&open| open >= level) {
            self.open_levels.pop();
        }
        if let Some(&parent) = self.open_levels.last() {
            if level > parent + 1 {
                let err = self
                    .error_at(
                        format!(
                            "heading `{}` skips from level {} to level {}",
                            title, parent, level
                        ),
                        span.clone(),
                    )
                    .with_note(format!(
                        "add a level-{} heading in between, or use {}",
                        parent + 1,
                        "#".repeat(parent as usize + 1)
                    ));
                self.errors.push(err);
            }
        }
        self.open_levels.push(level);

        if let Some(builder) = self.current.take() {
            self.sections.push(builder.into_section(span.start));
        }

        let anchor = if slug.is_empty() {
            String::new()
        } else {
            self.anchors.allocate(&slug)
        };

        self.current = Some(SectionBuilder {
            level,
            title,
            heading,
            slug,
            anchor,
            nodes: Vec::new(),
            span_start: span.start,
        });
    }

    /// Collect one block-level node starting at `events[*i]`.
    /// Always advances `i`; returns `None` for events that carry no content.
    fn collect_block(&mut self, events: &Events<'_>, i: &mut usize) -> Option<BodyNode> {
        let (ref ev, ref range) = events[*i];

        match ev {
            Event::Start(Tag::Paragraph) => {
                *i += 1;
                let inlines = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Paragraph));
                Some(BodyNode::Paragraph(inlines))
            }

            // Headings nested in lists or quotes do not open sections
            Event::Start(Tag::Heading { .. }) => {
                *i += 1;
                let inlines =
                    self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Heading(_)));
                Some(BodyNode::Paragraph(vec![InlineNode::Strong(inlines)]))
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let raw = &self.source[range.clone()];
                        if !fence_is_closed(raw) {
                            let line = byte_offset_to_line(self.source, range.start);
                            let opening_end = raw.find('\n').map_or(range.end, |n| range.start + n);
                            let err = self
                                .error_at(
                                    format!(
                                        "unterminated code fence in `{}` opened on line {}",
                                        self.origin, line
                                    ),
                                    range.start..opening_end,
                                )
                                .with_note("close the block with a matching fence");
                            self.errors.push(err);
                        }
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                *i += 1;
                let content = collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                Some(BodyNode::CodeBlock(CodeBlock::new(language, content)))
            }

            Event::Start(Tag::List(start)) => {
                let start = *start;
                *i += 1;
                Some(self.collect_list(events, i, start))
            }

            Event::Start(Tag::BlockQuote(_)) => {
                *i += 1;
                let inner = self.collect_body(events, i, &|e| matches!(e, TagEnd::BlockQuote(_)));
                Some(BodyNode::Blockquote(inner))
            }

            Event::Start(Tag::Table(alignments)) => {
                let alignments: Vec<ColumnAlignment> = alignments
                    .iter()
                    .map(|a| match a {
                        pulldown_cmark::Alignment::None => ColumnAlignment::None,
                        pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                        pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                        pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                    })
                    .collect();
                *i += 1;
                let (headers, rows) = self.collect_table(events, i);
                Some(BodyNode::Table {
                    alignments,
                    headers,
                    rows,
                })
            }

            Event::Start(Tag::HtmlBlock) => {
                *i += 1;
                let html = collect_text_until(events, i, |e| matches!(e, TagEnd::HtmlBlock));
                Some(BodyNode::Html(html))
            }

            Event::Rule => {
                *i += 1;
                Some(BodyNode::HorizontalRule)
            }

            _ => {
                // Tight list items carry inline events without a paragraph
                if let Some(first) = self.next_inline(events, i) {
                    let mut inlines = vec![first];
                    while let Some(inline) = self.next_inline(events, i) {
                        inlines.push(inline);
                    }
                    return Some(BodyNode::Paragraph(inlines));
                }
                *i += 1;
                None
            }
        }
    }

    /// Collect block nodes until a matching End tag.
    fn collect_body(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<BodyNode> {
        let mut nodes = Vec::new();

        while *i < events.len() {
            if let Event::End(tag_end) = &events[*i].0 {
                if is_end(tag_end) {
                    *i += 1;
                    break;
                }
            }
            if let Some(node) = self.collect_block(events, i) {
                nodes.push(node);
            }
        }

        nodes
    }

    /// Collect list items. Items that open with a fragment link are
    /// recorded as table-of-contents entries before their children.
    fn collect_list(&mut self, events: &Events<'_>, i: &mut usize, start: Option<u64>) -> BodyNode {
        let mut items = Vec::new();
        self.list_depth += 1;

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(TagEnd::List(_)) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::Item) => {
                    *i += 1;
                    if let Some(entry) = self.peek_toc_entry(events, *i) {
                        self.toc.push(entry);
                    }
                    let item = self.collect_body(events, i, &|e| matches!(e, TagEnd::Item));
                    items.push(item);
                }
                _ => {
                    *i += 1;
                }
            }
        }

        self.list_depth -= 1;
        BodyNode::List { start, items }
    }

    fn peek_toc_entry(&self, events: &Events<'_>, mut j: usize) -> Option<TocEntry> {
        if matches!(events.get(j), Some((Event::Start(Tag::Paragraph), _))) {
            j += 1;
        }
        let (Event::Start(Tag::Link { dest_url, .. }), span) = events.get(j)? else {
            return None;
        };
        let target = TocEntry::fragment(dest_url)?.to_string();

        j += 1;
        let label = collect_text_until(events, &mut j, |e| matches!(e, TagEnd::Link));

        Some(TocEntry {
            label: normalize_title(&label),
            target,
            depth: self.list_depth.saturating_sub(1),
            span: span.clone(),
        })
    }

    /// Consume a single inline node at `events[*i]`, or return `None`
    /// without advancing if the event does not start one.
    fn next_inline(&self, events: &Events<'_>, i: &mut usize) -> Option<InlineNode> {
        let (ev, _) = events.get(*i)?;
        let node = match ev {
            Event::Text(s) => {
                *i += 1;
                InlineNode::Text(s.to_string())
            }
            Event::Code(s) => {
                *i += 1;
                InlineNode::CodeSpan(s.to_string())
            }
            Event::InlineHtml(s) => {
                *i += 1;
                InlineNode::Html(s.to_string())
            }
            Event::SoftBreak => {
                *i += 1;
                InlineNode::SoftBreak
            }
            Event::HardBreak => {
                *i += 1;
                InlineNode::HardBreak
            }
            Event::Start(Tag::Strong) => {
                *i += 1;
                InlineNode::Strong(self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong)))
            }
            Event::Start(Tag::Emphasis) => {
                *i += 1;
                InlineNode::Emphasis(self.collect_inlines(events, i, &|e| {
                    matches!(e, TagEnd::Emphasis)
                }))
            }
            Event::Start(Tag::Strikethrough) => {
                *i += 1;
                InlineNode::Strikethrough(self.collect_inlines(events, i, &|e| {
                    matches!(e, TagEnd::Strikethrough)
                }))
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                let dest = dest_url.to_string();
                let title = title.to_string();
                *i += 1;
                let content = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
                InlineNode::Link {
                    dest,
                    title,
                    content,
                }
            }
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let dest = dest_url.to_string();
                let title = title.to_string();
                *i += 1;
                let alt = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Image));
                InlineNode::Image { dest, title, alt }
            }
            _ => return None,
        };
        Some(node)
    }

    /// Collect inline nodes until a matching End tag.
    fn collect_inlines(
        &self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<InlineNode> {
        let mut inlines = Vec::new();

        while *i < events.len() {
            if let Event::End(tag_end) = &events[*i].0 {
                if is_end(tag_end) {
                    *i += 1;
                    break;
                }
            }
            match self.next_inline(events, i) {
                Some(inline) => inlines.push(inline),
                None => *i += 1,
            }
        }

        inlines
    }

    /// Collect table headers and rows.
    fn collect_table(
        &self,
        events: &Events<'_>,
        i: &mut usize,
    ) -> (Vec<Vec<InlineNode>>, Vec<Vec<Vec<InlineNode>>>) {
        let mut headers: Vec<Vec<InlineNode>> = Vec::new();
        let mut rows: Vec<Vec<Vec<InlineNode>>> = Vec::new();
        let mut in_head = false;
        let mut current_row: Vec<Vec<InlineNode>> = Vec::new();

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(TagEnd::Table) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::TableHead) => {
                    in_head = true;
                    *i += 1;
                }
                Event::End(TagEnd::TableHead) => {
                    in_head = false;
                    headers = std::mem::take(&mut current_row);
                    *i += 1;
                }
                Event::Start(Tag::TableRow) => {
                    current_row = Vec::new();
                    *i += 1;
                }
                Event::End(TagEnd::TableRow) => {
                    if !in_head {
                        rows.push(std::mem::take(&mut current_row));
                    }
                    *i += 1;
                }
                Event::Start(Tag::TableCell) => {
                    *i += 1;
                    let cell = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::TableCell));
                    current_row.push(cell);
                }
                _ => {
                    *i += 1;
                }
            }
        }

        (headers, rows)
    }

    fn finalize(mut self) -> Result<ParsedDocument, Vec<ParseError>> {
        if let Some(builder) = self.current.take() {
            self.sections.push(builder.into_section(self.source.len()));
        }

        if self.errors.is_empty() {
            Ok(ParsedDocument {
                preamble: Body {
                    nodes: self.preamble,
                },
                sections: self.sections,
                toc: self.toc,
            })
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Strip leading/trailing whitespace and collapse interior whitespace.
fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collect all literal text until a matching End tag.
fn collect_text_until(events: &Events<'_>, i: &mut usize, is_end: impl Fn(&TagEnd) -> bool) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Code(s) | Event::Html(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Whether the raw source of a fenced code block ends with a closing fence.
/// An unclosed fence runs to the end of its container, so its last line is
/// content rather than a run of fence characters at least as long as the opener.
fn fence_is_closed(raw: &str) -> bool {
    let strip = |line: &str| -> String {
        line.trim_start_matches(|c: char| c == '>' || c.is_whitespace())
            .trim_end()
            .to_string()
    };

    let mut lines = raw.lines();
    let Some(opening) = lines.next().map(strip) else {
        return false;
    };
    let Some(fence_char) = opening.chars().next().filter(|c| *c == '`' || *c == '~') else {
        return true;
    };
    let width = opening.chars().take_while(|c| *c == fence_char).count();

    match lines.last().map(strip) {
        Some(closing) => {
            closing.chars().count() >= width && closing.chars().all(|c| c == fence_char)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::fence_is_closed;

    #[test]
    fn closed_fences() {
        assert!(fence_is_closed("```swift\nlet x = 1\n```\n"));
        assert!(fence_is_closed("~~~~\ncode\n~~~~~"));
        assert!(fence_is_closed("> ```\n> quoted\n> ```\n"));
    }

    #[test]
    fn unclosed_fences() {
        assert!(!fence_is_closed("```swift\nlet x = 1\n"));
        assert!(!fence_is_closed("````\ncode\n```\n"));
        assert!(!fence_is_closed("```\n"));
    }
}
