use std::io::{self, Write};

use docbundle::Document;
use docbundle::body::{BodyNode, ColumnAlignment, InlineNode};
use docbundle::section::CodeBlock;
use docbundle::slug::{AnchorAllocator, slugify};
use docbundle::toc::TocEntry;

use super::LinkedDocument;

/// Write a complete HTML page. With `scoped`, every document becomes an
/// `<article>` whose ids are prefixed with the document's slug, and a
/// navigation list links to each article.
pub(super) fn write_page<W: Write>(
    title: &str,
    docs: &[LinkedDocument],
    scoped: bool,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{}</title>", escape(title))?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;

    if scoped {
        let mut ids = AnchorAllocator::new();
        let scopes: Vec<String> = docs
            .iter()
            .map(|doc| ids.allocate(&document_slug(&doc.document)))
            .collect();

        writeln!(out, "<nav class=\"bundle-nav\">")?;
        writeln!(out, "<h1>{}</h1>", escape(title))?;
        writeln!(out, "<ul>")?;
        for (doc, scope) in docs.iter().zip(&scopes) {
            writeln!(
                out,
                "<li><a href=\"#{}\">{}</a></li>",
                escape(scope),
                escape(&doc.document.title)
            )?;
        }
        writeln!(out, "</ul>")?;
        writeln!(out, "</nav>")?;

        for (doc, scope) in docs.iter().zip(&scopes) {
            writeln!(out, "<article id=\"{}\">", escape(scope))?;
            let prefix = format!("{}--", scope);
            DocumentWriter::new(&doc.document, &prefix, out).write()?;
            writeln!(out, "</article>")?;
        }
    } else {
        for doc in docs {
            DocumentWriter::new(&doc.document, "", out).write()?;
        }
    }

    writeln!(out, "</body>")?;
    writeln!(out, "</html>")
}

fn document_slug(doc: &Document) -> String {
    let slug = slugify(&doc.title);
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

struct DocumentWriter<'a, W: Write> {
    doc: &'a Document,
    prefix: &'a str,
    out: &'a mut W,
}

impl<'a, W: Write> DocumentWriter<'a, W> {
    fn new(doc: &'a Document, prefix: &'a str, out: &'a mut W) -> Self {
        DocumentWriter { doc, prefix, out }
    }

    fn write(&mut self) -> io::Result<()> {
        let doc = self.doc;
        self.write_nodes(&doc.preamble.nodes)?;
        for section in &doc.sections {
            write!(
                self.out,
                "<h{level} id=\"{prefix}{anchor}\">",
                level = section.level,
                prefix = escape(self.prefix),
                anchor = escape(&section.anchor),
            )?;
            self.write_inlines(&section.heading)?;
            writeln!(self.out, "</h{}>", section.level)?;
            self.write_nodes(&section.body.nodes)?;
        }
        Ok(())
    }

    fn write_nodes(&mut self, nodes: &[BodyNode]) -> io::Result<()> {
        for node in nodes {
            self.write_node(node)?;
        }
        Ok(())
    }

    fn write_node(&mut self, node: &BodyNode) -> io::Result<()> {
        match node {
            BodyNode::Paragraph(inlines) => {
                write!(self.out, "<p>")?;
                self.write_inlines(inlines)?;
                writeln!(self.out, "</p>")
            }
            BodyNode::CodeBlock(block) => self.write_code_block(block),
            BodyNode::Blockquote(inner) => {
                writeln!(self.out, "<blockquote>")?;
                self.write_nodes(inner)?;
                writeln!(self.out, "</blockquote>")
            }
            BodyNode::Table {
                alignments,
                headers,
                rows,
            } => {
                writeln!(self.out, "<table>")?;
                writeln!(self.out, "<thead><tr>")?;
                for (i, header) in headers.iter().enumerate() {
                    write!(self.out, "<th{}>", align_attr(alignments.get(i)))?;
                    self.write_inlines(header)?;
                    writeln!(self.out, "</th>")?;
                }
                writeln!(self.out, "</tr></thead>")?;
                writeln!(self.out, "<tbody>")?;
                for row in rows {
                    writeln!(self.out, "<tr>")?;
                    for (i, cell) in row.iter().enumerate() {
                        write!(self.out, "<td{}>", align_attr(alignments.get(i)))?;
                        self.write_inlines(cell)?;
                        writeln!(self.out, "</td>")?;
                    }
                    writeln!(self.out, "</tr>")?;
                }
                writeln!(self.out, "</tbody>")?;
                writeln!(self.out, "</table>")
            }
            BodyNode::List { start, items } => {
                match start {
                    Some(1) => writeln!(self.out, "<ol>")?,
                    Some(n) => writeln!(self.out, "<ol start=\"{}\">", n)?,
                    None => writeln!(self.out, "<ul>")?,
                }
                for item in items {
                    write!(self.out, "<li>")?;
                    self.write_nodes(item)?;
                    writeln!(self.out, "</li>")?;
                }
                match start {
                    Some(_) => writeln!(self.out, "</ol>"),
                    None => writeln!(self.out, "</ul>"),
                }
            }
            BodyNode::Html(html) => write!(self.out, "{}", html),
            BodyNode::HorizontalRule => writeln!(self.out, "<hr>"),
        }
    }

    /// Content is escaped and otherwise written untouched.
    fn write_code_block(&mut self, block: &CodeBlock) -> io::Result<()> {
        if block.language.is_empty() {
            write!(self.out, "<pre><code>")?;
        } else {
            write!(
                self.out,
                "<pre><code class=\"language-{}\">",
                escape(&block.language)
            )?;
        }
        write!(self.out, "{}", escape(&block.content))?;
        writeln!(self.out, "</code></pre>")
    }

    fn write_inlines(&mut self, inlines: &[InlineNode]) -> io::Result<()> {
        for inline in inlines {
            self.write_inline(inline)?;
        }
        Ok(())
    }

    fn write_inline(&mut self, inline: &InlineNode) -> io::Result<()> {
        match inline {
            InlineNode::Text(s) => write!(self.out, "{}", escape(s)),
            InlineNode::Strong(children) => {
                write!(self.out, "<strong>")?;
                self.write_inlines(children)?;
                write!(self.out, "</strong>")
            }
            InlineNode::Emphasis(children) => {
                write!(self.out, "<em>")?;
                self.write_inlines(children)?;
                write!(self.out, "</em>")
            }
            InlineNode::Strikethrough(children) => {
                write!(self.out, "<del>")?;
                self.write_inlines(children)?;
                write!(self.out, "</del>")
            }
            InlineNode::CodeSpan(code) => write!(self.out, "<code>{}</code>", escape(code)),
            InlineNode::Link {
                dest,
                title,
                content,
            } => {
                let href = self.resolve_href(dest);
                write!(self.out, "<a href=\"{}\"", escape(&href))?;
                if !title.is_empty() {
                    write!(self.out, " title=\"{}\"", escape(title))?;
                }
                write!(self.out, ">")?;
                self.write_inlines(content)?;
                write!(self.out, "</a>")
            }
            InlineNode::Image { dest, title, alt } => {
                let alt = docbundle::body::inline_text(alt);
                write!(
                    self.out,
                    "<img src=\"{}\" alt=\"{}\"",
                    escape(dest),
                    escape(&alt)
                )?;
                if !title.is_empty() {
                    write!(self.out, " title=\"{}\"", escape(title))?;
                }
                write!(self.out, ">")
            }
            InlineNode::Html(html) => write!(self.out, "{}", html),
            InlineNode::SoftBreak => writeln!(self.out),
            InlineNode::HardBreak => writeln!(self.out, "<br>"),
        }
    }

    /// Fragment links that resolve inside the document follow the id scope.
    fn resolve_href(&self, dest: &str) -> String {
        match TocEntry::fragment(dest) {
            Some(target) if self.doc.section_by_anchor(target).is_some() => {
                format!("#{}{}", self.prefix, target)
            }
            _ => dest.to_string(),
        }
    }
}

fn align_attr(alignment: Option<&ColumnAlignment>) -> &'static str {
    match alignment {
        Some(ColumnAlignment::Left) => " style=\"text-align: left\"",
        Some(ColumnAlignment::Center) => " style=\"text-align: center\"",
        Some(ColumnAlignment::Right) => " style=\"text-align: right\"",
        Some(ColumnAlignment::None) | None => "",
    }
}

/// Escape the HTML metacharacters `& < > "`; nothing else changes.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
