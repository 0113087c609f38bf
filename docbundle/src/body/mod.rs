use std::fmt;

use crate::section::CodeBlock;

/// The prose and code between two headings, kept as a small Markdown AST.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub nodes: Vec<BodyNode>,
}

impl Body {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Code blocks in source order, including those nested in lists and quotes.
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut out = Vec::new();
        collect_code_blocks(&self.nodes, &mut out);
        out
    }
}

fn collect_code_blocks<'a>(nodes: &'a [BodyNode], out: &mut Vec<&'a CodeBlock>) {
    for node in nodes {
        match node {
            BodyNode::CodeBlock(block) => out.push(block),
            BodyNode::Blockquote(inner) => collect_code_blocks(inner, out),
            BodyNode::List { items, .. } => {
                for item in items {
                    collect_code_blocks(item, out);
                }
            }
            _ => {}
        }
    }
}

/// A single block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyNode {
    Paragraph(Vec<InlineNode>),
    CodeBlock(CodeBlock),
    Blockquote(Vec<BodyNode>),
    Table {
        alignments: Vec<ColumnAlignment>,
        headers: Vec<Vec<InlineNode>>,
        rows: Vec<Vec<Vec<InlineNode>>>,
    },
    /// `start` is `Some` for ordered lists.
    List {
        start: Option<u64>,
        items: Vec<Vec<BodyNode>>,
    },
    /// Raw HTML block, passed through untouched.
    Html(String),
    HorizontalRule,
}

/// Inline elements that appear within a line of text.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineNode {
    Text(String),
    Strong(Vec<InlineNode>),
    Emphasis(Vec<InlineNode>),
    Strikethrough(Vec<InlineNode>),
    CodeSpan(String),
    Link {
        dest: String,
        title: String,
        content: Vec<InlineNode>,
    },
    Image {
        dest: String,
        title: String,
        alt: Vec<InlineNode>,
    },
    Html(String),
    SoftBreak,
    HardBreak,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// Flatten inline nodes into their visible text.
pub fn inline_text(inlines: &[InlineNode]) -> String {
    let mut out = String::new();
    push_inline_text(inlines, &mut out);
    out
}

fn push_inline_text(inlines: &[InlineNode], out: &mut String) {
    for inline in inlines {
        match inline {
            InlineNode::Text(s) | InlineNode::CodeSpan(s) => out.push_str(s),
            InlineNode::Strong(children)
            | InlineNode::Emphasis(children)
            | InlineNode::Strikethrough(children)
            | InlineNode::Link {
                content: children, ..
            }
            | InlineNode::Image { alt: children, .. } => push_inline_text(children, out),
            InlineNode::SoftBreak | InlineNode::HardBreak => out.push(' '),
            InlineNode::Html(_) => {}
        }
    }
}

/// Opening/closing fence long enough that no line of `content` can close it.
pub fn fence_for(content: &str) -> String {
    let mut longest = 0usize;
    let mut run = 0usize;
    for ch in content.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Backslash-escape `text` so it reads back as the same literal text.
/// At the start of a line, list and setext markers are neutralized as well.
pub fn escape_text(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;

    if line_start {
        let digits = text.bytes().take_while(|b| b.is_ascii_digit()).count();
        if (1..=9).contains(&digits) && matches!(text.as_bytes().get(digits), Some(b'.' | b')')) {
            out.push_str(&text[..digits]);
            out.push('\\');
            rest = &text[digits..];
        } else if text.starts_with(['+', '-', '=']) {
            out.push('\\');
        }
    }

    for ch in rest.chars() {
        if matches!(
            ch,
            '\\' | '`' | '*' | '_' | '[' | ']' | '#' | '<' | '>' | '|' | '~' | '&'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Inline nodes written as Markdown, escaping literal text.
pub struct Inlines<'a>(pub &'a [InlineNode]);

impl fmt::Display for Inlines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_inlines(f, self.0, true)
    }
}

/// Adjacent text nodes are escaped as one run so that a marker split
/// across them (`1` then `. x`) is still caught at the start of a line.
fn write_inlines(
    f: &mut fmt::Formatter<'_>,
    inlines: &[InlineNode],
    mut line_start: bool,
) -> fmt::Result {
    let mut i = 0;
    while i < inlines.len() {
        match &inlines[i] {
            InlineNode::Text(_) => {
                let mut run = String::new();
                while let Some(InlineNode::Text(s)) = inlines.get(i) {
                    run.push_str(s);
                    i += 1;
                }
                let mut escaped = escape_text(&run, line_start);
                if escaped.ends_with('!') && matches!(inlines.get(i), Some(InlineNode::Link { .. })) {
                    escaped.insert(escaped.len() - 1, '\\');
                }
                f.write_str(&escaped)?;
                line_start = false;
            }
            other => {
                write!(f, "{}", other)?;
                line_start = matches!(other, InlineNode::SoftBreak | InlineNode::HardBreak);
                i += 1;
            }
        }
    }
    Ok(())
}

fn write_destination(f: &mut fmt::Formatter<'_>, dest: &str, title: &str) -> fmt::Result {
    write!(f, "(")?;
    let bracketed = dest.is_empty()
        || dest.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'));
    if bracketed {
        write!(f, "<")?;
    }
    for ch in dest.chars() {
        if ch == '\\' || (bracketed && matches!(ch, '<' | '>')) {
            write!(f, "\\")?;
        }
        write!(f, "{}", ch)?;
    }
    if bracketed {
        write!(f, ">")?;
    }
    if !title.is_empty() {
        write!(f, " \"")?;
        for ch in title.chars() {
            if matches!(ch, '"' | '\\') {
                write!(f, "\\")?;
            }
            write!(f, "{}", ch)?;
        }
        write!(f, "\"")?;
    }
    write!(f, ")")
}

/// Prefix every line of `text`: `first` on line one, `rest` afterwards.
/// Empty lines get `rest` trimmed of trailing spaces.
fn prefix_lines(text: &str, first: &str, rest: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split_inclusive('\n').enumerate() {
        let prefix = if i == 0 { first } else { rest };
        if line == "\n" {
            out.push_str(prefix.trim_end());
        } else {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[BodyNode]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}

struct Nodes<'a>(&'a [BodyNode]);

impl fmt::Display for Nodes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, self.0)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes)
    }
}

impl fmt::Display for BodyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyNode::Paragraph(inlines) => {
                write_inlines(f, inlines, true)?;
                writeln!(f)
            }
            BodyNode::CodeBlock(block) => {
                let fence = fence_for(&block.content);
                writeln!(f, "{}{}", fence, block.language)?;
                write!(f, "{}", block.content)?;
                if !block.content.is_empty() && !block.content.ends_with('\n') {
                    writeln!(f)?;
                }
                writeln!(f, "{}", fence)
            }
            BodyNode::Blockquote(inner) => {
                let text = Nodes(inner).to_string();
                write!(f, "{}", prefix_lines(&text, "> ", "> "))
            }
            BodyNode::Table {
                alignments,
                headers,
                rows,
            } => {
                write!(f, "|")?;
                for header in headers {
                    write!(f, " ")?;
                    write_inlines(f, header, false)?;
                    write!(f, " |")?;
                }
                writeln!(f)?;
                write!(f, "|")?;
                for i in 0..headers.len() {
                    let marker = match alignments.get(i).copied().unwrap_or(ColumnAlignment::None) {
                        ColumnAlignment::None => "---",
                        ColumnAlignment::Left => ":--",
                        ColumnAlignment::Center => ":-:",
                        ColumnAlignment::Right => "--:",
                    };
                    write!(f, "{}|", marker)?;
                }
                writeln!(f)?;
                for row in rows {
                    write!(f, "|")?;
                    for cell in row {
                        write!(f, " ")?;
                        write_inlines(f, cell, false)?;
                        write!(f, " |")?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            BodyNode::List { start, items } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = match start {
                        Some(n) => format!("{}. ", n + i as u64),
                        None => "- ".to_string(),
                    };
                    let indent = " ".repeat(marker.len());
                    let text = Nodes(item).to_string();
                    if text.is_empty() {
                        writeln!(f, "{}", marker.trim_end())?;
                    } else {
                        write!(f, "{}", prefix_lines(&text, &marker, &indent))?;
                    }
                }
                Ok(())
            }
            BodyNode::Html(html) => {
                write!(f, "{}", html)?;
                if !html.ends_with('\n') {
                    writeln!(f)?;
                }
                Ok(())
            }
            BodyNode::HorizontalRule => writeln!(f, "---"),
        }
    }
}

impl fmt::Display for InlineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineNode::Text(s) => f.write_str(&escape_text(s, false)),
            InlineNode::Strong(children) => {
                write!(f, "**")?;
                write_inlines(f, children, false)?;
                write!(f, "**")
            }
            InlineNode::Emphasis(children) => {
                write!(f, "*")?;
                write_inlines(f, children, false)?;
                write!(f, "*")
            }
            InlineNode::Strikethrough(children) => {
                write!(f, "~~")?;
                write_inlines(f, children, false)?;
                write!(f, "~~")
            }
            InlineNode::CodeSpan(code) => {
                if code.contains('`') {
                    write!(f, "`` {} ``", code)
                } else {
                    write!(f, "`{}`", code)
                }
            }
            InlineNode::Link {
                dest,
                title,
                content,
            } => {
                write!(f, "[")?;
                write_inlines(f, content, false)?;
                write!(f, "]")?;
                write_destination(f, dest, title)
            }
            InlineNode::Image { dest, title, alt } => {
                write!(f, "![")?;
                write_inlines(f, alt, false)?;
                write!(f, "]")?;
                write_destination(f, dest, title)
            }
            InlineNode::Html(html) => write!(f, "{}", html),
            InlineNode::SoftBreak => writeln!(f),
            InlineNode::HardBreak => writeln!(f, "\\"),
        }
    }
}
