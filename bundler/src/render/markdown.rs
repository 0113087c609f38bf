use std::io::{self, Write};

use docbundle::Document;

use super::LinkedDocument;

pub(super) fn write_document<W: Write>(doc: &Document, out: &mut W) -> io::Result<()> {
    let mut first = true;

    if !doc.preamble.is_empty() {
        write!(out, "{}", doc.preamble)?;
        first = false;
    }

    for section in &doc.sections {
        if !first {
            writeln!(out)?;
        }
        first = false;
        writeln!(out, "{}", section.heading_markdown())?;
        if !section.body.is_empty() {
            writeln!(out)?;
            write!(out, "{}", section.body)?;
        }
    }

    Ok(())
}

pub(super) fn write_bundle<W: Write>(docs: &[LinkedDocument], out: &mut W) -> io::Result<()> {
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            write!(out, "\n---\n\n")?;
        }
        write_document(&doc.document, out)?;
    }
    Ok(())
}
