use std::fs;

use bundler::{
    Format, Layout, LinkError, LinkedDocument, OutputOptions, Resolution, SourceFile,
    discover_inputs, link, process, process_paths, render_bundle, render_document, write_output,
};
use docbundle::Document;
use docbundle::body::{Body, BodyNode, InlineNode, inline_text};
use docbundle::parser::Parser;

fn parse(source: &str) -> Document {
    Parser::new("topic.md", source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn linked(origin: &str, source: &str) -> LinkedDocument {
    let document = Parser::new(origin, source.to_string(), 0)
        .parse()
        .expect("parse failed");
    let report = link(&document).expect("link failed");
    LinkedDocument { document, report }
}

fn render_to_string(doc: &LinkedDocument, format: Format) -> String {
    let mut out = Vec::new();
    render_document(doc, format, &mut out).expect("render failed");
    String::from_utf8(out).unwrap()
}

fn paragraph_texts(body: &Body) -> Vec<String> {
    body.nodes
        .iter()
        .filter_map(|node| match node {
            BodyNode::Paragraph(inlines) => Some(inline_text(inlines)),
            _ => None,
        })
        .collect()
}

fn unescape(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

const TOUR: &str = "# Language Tour

- [Named Parameters](#named-arguments)
- [Closures](#closures)

## Named Parameters

Labels make calls read like prose.

```swift
func greet(person: String, from hometown: String) -> String {
    return \"Hello \\(person)! Glad you could visit from \\(hometown).\"
}
```

## Closures

```swift
let sorted = names.sorted { $0 < $1 && $0 != \"\" }
```
";

// ---------------------------------------------------------------------------
// Linker
// ---------------------------------------------------------------------------

#[test]
fn mismatched_toc_anchor_is_reported_once() {
    let doc = parse(TOUR);
    let report = link(&doc).expect("link failed");

    let unresolved = report.unresolved();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].target, "named-arguments");
    assert_eq!(unresolved[0].label, "Named Parameters");
    assert_eq!(unresolved[0].suggestion.as_deref(), Some("named-parameters"));
    assert!(!report.is_valid());

    let resolved: Vec<(usize, usize)> = report.resolved().collect();
    assert_eq!(resolved, vec![(1, 2)]);
}

#[test]
fn every_entry_is_resolved_or_unresolved_never_both() {
    let doc = parse(
        "# T\n\n- [A](#a)\n- [B](#nope)\n- [A again](#a)\n\n## A\n\n## B\n",
    );
    let report = link(&doc).expect("link failed");
    assert_eq!(report.resolutions.len(), doc.toc.len());

    for (index, resolution) in report.resolutions.iter().enumerate() {
        match resolution {
            Resolution::Resolved { entry, section } => {
                assert_eq!(*entry, index);
                assert_eq!(doc.sections[*section].anchor, doc.toc[index].target);
            }
            Resolution::Unresolved(u) => {
                assert_eq!(u.entry, index);
                assert!(doc.section_by_anchor(&u.target).is_none());
            }
        }
    }
    assert_eq!(report.unresolved().len(), 1);
}

#[test]
fn repeated_titles_are_not_ambiguous() {
    let doc = parse("# Overview\n\n- [Second](#overview-1)\n\n# Overview\n");
    let report = link(&doc).expect("suffixed duplicates must link");
    assert!(report.is_valid());
    assert_eq!(report.resolved().next(), Some((0, 1)));
}

#[test]
fn different_titles_with_same_slug_are_ambiguous() {
    let doc = parse("# Setup\n\n## Setup!\n");
    let errors = link(&doc).expect_err("expected ambiguous anchor");
    assert_eq!(errors.len(), 1);
    let LinkError::AmbiguousAnchor { slug, sections, .. } = &errors[0];
    assert_eq!(slug, "setup");
    let titles: Vec<&str> = sections.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(titles, vec!["Setup", "Setup!"]);
    assert!(errors[0].to_string().contains("ambiguous anchor `#setup`"));
}

#[test]
fn case_only_difference_is_ambiguous() {
    let doc = parse("# Enums\n\n## enums\n");
    assert!(link(&doc).is_err());
}

#[test]
fn document_without_toc_is_valid() {
    let doc = parse("# Solo\n\ntext\n");
    let report = link(&doc).expect("link failed");
    assert!(report.resolutions.is_empty());
    assert!(report.is_valid());
}

#[test]
fn lowercase_target_is_suggested() {
    let doc = parse("# T\n\n- [Intro](#Closures)\n\n## Closures\n");
    let report = link(&doc).expect("link failed");
    assert_eq!(report.unresolved()[0].suggestion.as_deref(), Some("closures"));
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

#[test]
fn markdown_render_preserves_code_blocks_byte_for_byte() {
    let doc = linked("tour.md", TOUR);
    let rendered = render_to_string(&doc, Format::Markdown);

    for block in doc.document.code_blocks() {
        assert!(
            rendered.contains(&block.content),
            "missing code block:\n{}",
            block.content
        );
    }
}

#[test]
fn markdown_render_reparses_to_same_code_and_anchors() {
    let source = "Preamble.\n\n# Guide\n\n1. first\n\n   ```\n   nested `code`\n       indented\n   ```\n\n> ```\n> quoted\n> ```\n\n## Overview\n\n## Overview\n\n```\n```` inner fence\n```\n";
    let doc = linked("guide.md", source);
    let rendered = render_to_string(&doc, Format::Markdown);
    let reparsed = parse(&rendered);

    assert_eq!(reparsed.code_blocks(), doc.document.code_blocks());
    let before: Vec<&str> = doc.document.sections.iter().map(|s| s.anchor.as_str()).collect();
    let after: Vec<&str> = reparsed.sections.iter().map(|s| s.anchor.as_str()).collect();
    assert_eq!(before, after);
}

#[test]
fn markdown_render_keeps_escaped_text_literal() {
    let source = "# Operators\n\n\\# is not a heading here\n\n1\\. not a list\n\n\\- nor this\nline two\n\\===\n\nsnake_case, a < b & c | d, *stars* and [brackets]\n";
    let doc = linked("operators.md", source);
    let rendered = render_to_string(&doc, Format::Markdown);
    let reparsed = parse(&rendered);

    let anchors: Vec<&str> = reparsed.sections.iter().map(|s| s.anchor.as_str()).collect();
    assert_eq!(anchors, vec!["operators"]);
    assert_eq!(
        paragraph_texts(&reparsed.sections[0].body),
        vec![
            "# is not a heading here",
            "1. not a list",
            "- nor this line two ===",
            "snake_case, a < b & c | d, stars and [brackets]",
        ]
    );
    let reparsed = linked("operators.md", &rendered);
    assert_eq!(render_to_string(&reparsed, Format::Markdown), rendered);
}

#[test]
fn markdown_render_keeps_code_spans_in_headings() {
    let source = "# Names\n\n- [Private](#using-_private_-names)\n\n## Using `_private_` names\n";
    let doc = linked("names.md", source);
    let rendered = render_to_string(&doc, Format::Markdown);
    assert!(rendered.contains("## Using `_private_` names\n"));

    let reparsed = parse(&rendered);
    let anchors: Vec<&str> = reparsed.sections.iter().map(|s| s.anchor.as_str()).collect();
    assert_eq!(anchors, vec!["names", "using-_private_-names"]);
    let report = link(&reparsed).expect("link failed");
    assert!(report.is_valid());
}

#[test]
fn markdown_render_keeps_link_destinations_and_titles() {
    let source = "# Links\n\nSee [the notes](<docs/my notes (v2).md> \"Release notes\") and ![logo](img/logo.png \"Logo\").\n";
    let doc = linked("links.md", source);
    let rendered = render_to_string(&doc, Format::Markdown);
    let reparsed = parse(&rendered);
    let BodyNode::Paragraph(inlines) = &reparsed.sections[0].body.nodes[0] else {
        panic!("expected paragraph");
    };
    let targets: Vec<(&str, &str)> = inlines
        .iter()
        .filter_map(|inline| match inline {
            InlineNode::Link { dest, title, .. } | InlineNode::Image { dest, title, .. } => {
                Some((dest.as_str(), title.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![("docs/my notes (v2).md", "Release notes"), ("img/logo.png", "Logo")]
    );
}

#[test]
fn markdown_render_preserves_section_order() {
    let doc = linked("tour.md", TOUR);
    let rendered = render_to_string(&doc, Format::Markdown);
    let tour = rendered.find("# Language Tour").unwrap();
    let named = rendered.find("## Named Parameters").unwrap();
    let closures = rendered.find("## Closures").unwrap();
    assert!(tour < named && named < closures);
}

#[test]
fn html_render_escapes_and_preserves_code() {
    let doc = linked("tour.md", TOUR);
    let html = render_to_string(&doc, Format::Html);

    assert!(html.contains("<h2 id=\"named-parameters\">Named Parameters</h2>"));
    assert!(html.contains("<code class=\"language-swift\">"));
    assert!(html.contains("$0 &lt; $1 &amp;&amp;"));
    for block in doc.document.code_blocks() {
        assert!(unescape(&html).contains(&block.content));
    }
}

#[test]
fn html_headings_keep_inline_markup() {
    let doc = linked("names.md", "# Using `_private_` & *friends*\n");
    let html = render_to_string(&doc, Format::Html);
    assert!(html.contains(
        "<h1 id=\"using-_private_-friends\">Using <code>_private_</code> &amp; <em>friends</em></h1>"
    ));
}

#[test]
fn html_render_succeeds_with_unresolved_entries() {
    let doc = linked("tour.md", TOUR);
    assert_eq!(doc.report.unresolved().len(), 1);
    let html = render_to_string(&doc, Format::Html);
    assert!(html.contains("href=\"#named-arguments\""));
    assert!(html.contains("href=\"#closures\""));
}

#[test]
fn html_bundle_scopes_ids_per_document() {
    let a = linked("a.md", "# Alpha\n\n- [Overview](#overview)\n\n## Overview\n");
    let b = linked("b.md", "# Beta\n\n## Overview\n");
    let mut out = Vec::new();
    render_bundle("Tour", &[a, b], Format::Html, &mut out).expect("render failed");
    let html = String::from_utf8(out).unwrap();

    assert!(html.contains("<title>Tour</title>"));
    assert!(html.contains("<li><a href=\"#alpha\">Alpha</a></li>"));
    assert!(html.contains("<article id=\"alpha\">"));
    assert!(html.contains("id=\"alpha--overview\""));
    assert!(html.contains("id=\"beta--overview\""));
    assert!(html.contains("href=\"#alpha--overview\""));
    assert!(html.find("alpha--overview").unwrap() < html.find("beta--overview").unwrap());
}

#[test]
fn markdown_bundle_keeps_input_order() {
    let a = linked("a.md", "# First\n");
    let b = linked("b.md", "# Second\n");
    let mut out = Vec::new();
    render_bundle("ignored", &[a, b], Format::Markdown, &mut out).expect("render failed");
    assert_eq!(String::from_utf8(out).unwrap(), "# First\n\n---\n\n# Second\n");
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn source(origin: &str, text: &str, file_id: usize) -> SourceFile {
    SourceFile {
        origin: origin.to_string(),
        source: text.to_string(),
        file_id,
    }
}

#[test]
fn failing_documents_do_not_block_others() {
    let report = process(&[
        source("good.md", TOUR, 0),
        source("broken.md", "# B\n\n```\nnever closed\n", 1),
        source("ambiguous.md", "# Setup\n\n## setup\n", 2),
    ]);

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].document.origin, "good.md");
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].origin(), "broken.md");
    assert!(report.failures[0].to_string().contains("unterminated code fence"));
    assert_eq!(report.failures[1].origin(), "ambiguous.md");
    assert!(!report.is_success(false));
}

#[test]
fn unreadable_input_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.md");
    let binary = dir.path().join("binary.md");
    fs::write(&good, "\u{feff}# Good\n\ntext\n").unwrap();
    fs::write(&binary, [0x23, 0x20, 0xff, 0xfe, 0x0a]).unwrap();

    let mut registered = Vec::new();
    let report = process_paths(&[binary.clone(), good.clone()], |origin, text| {
        registered.push((origin.to_string(), text.to_string()));
        registered.len() - 1
    });

    assert_eq!(registered, vec![(good.display().to_string(), "# Good\n\ntext\n".to_string())]);
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].document.title, "Good");
    assert_eq!(report.documents[0].document.source_id, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].origin(), binary.display().to_string());
    assert!(report.failures[0].to_string().starts_with("cannot read"));
    assert_eq!(report.failures[0].to_diagnostics().len(), 1);
    assert!(!report.is_success(false));
}

#[test]
fn unresolved_entries_fail_only_in_strict_mode() {
    let report = process(&[source("tour.md", TOUR, 0)]);
    assert_eq!(report.warnings().len(), 1);
    assert!(report.is_success(false));
    assert!(!report.is_success(true));
}

#[test]
fn writes_single_bundle_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("book.html");
    let report = process(&[source("tour.md", TOUR, 0)]);

    let written = write_output(
        &report.documents,
        &OutputOptions {
            title: "Tour".to_string(),
            format: Format::Html,
            layout: Layout::Single,
            path: path.clone(),
        },
    )
    .expect("write failed");

    assert_eq!(written, vec![path.clone()]);
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains("<article id=\"language-tour\">"));
}

#[test]
fn writes_one_file_per_document_with_unique_names() {
    let dir = tempfile::tempdir().unwrap();
    let report = process(&[
        source("one/intro.md", "# One\n", 0),
        source("two/intro.md", "# Two\n", 1),
    ]);

    let written = write_output(
        &report.documents,
        &OutputOptions {
            title: "Docs".to_string(),
            format: Format::Markdown,
            layout: Layout::PerDocument,
            path: dir.path().to_path_buf(),
        },
    )
    .expect("write failed");

    assert_eq!(
        written,
        vec![dir.path().join("intro.md"), dir.path().join("intro-1.md")]
    );
    assert_eq!(fs::read_to_string(&written[1]).unwrap(), "# Two\n");
}

#[test]
fn unwritable_destination_is_a_render_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, "not a directory").unwrap();
    let report = process(&[source("tour.md", TOUR, 0)]);

    let err = write_output(
        &report.documents,
        &OutputOptions {
            title: "Tour".to_string(),
            format: Format::Markdown,
            layout: Layout::Single,
            path: blocker.join("out.md"),
        },
    )
    .expect_err("expected render error");

    assert!(err.to_string().starts_with("cannot write"));
}

#[test]
fn discovers_markdown_recursively_skipping_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("b.md"), "# B\n").unwrap();
    fs::write(dir.path().join("a.md"), "# A\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "x").unwrap();
    fs::write(dir.path().join("case.test.md"), "---\n---\n").unwrap();
    fs::write(dir.path().join("sub").join("c.md"), "# C\n").unwrap();

    let inputs = discover_inputs(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(
        inputs,
        vec![
            dir.path().join("a.md"),
            dir.path().join("b.md"),
            dir.path().join("sub").join("c.md"),
        ]
    );
}

#[test]
fn format_and_layout_parse_from_strings() {
    assert_eq!("html".parse::<Format>(), Ok(Format::Html));
    assert_eq!("MD".parse::<Format>(), Ok(Format::Markdown));
    assert!("pdf".parse::<Format>().is_err());
    assert_eq!("per-document".parse::<Layout>(), Ok(Layout::PerDocument));
    assert_eq!("Single".parse::<Layout>(), Ok(Layout::Single));
    assert_eq!("PER-DOCUMENT".parse::<Layout>(), Ok(Layout::PerDocument));
    assert!("split".parse::<Layout>().is_err());
}
