use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use bundler::LinkReport;
use docbundle::Document;
use docbundle::parser::Parser;

/// Frontmatter of a `.test.md` fixture.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureConfig {
    /// Human-readable fixture description.
    #[serde(default)]
    pub description: Option<String>,

    /// The document must fail to parse.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Some parse or link error message must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Linking must fail with an ambiguous anchor.
    #[serde(default)]
    pub expect_ambiguous: bool,

    /// Generated section anchors, in order.
    #[serde(default)]
    pub expect_anchors: Option<Vec<String>>,

    /// Targets of unresolved table-of-contents entries, in order.
    #[serde(default)]
    pub expect_unresolved: Option<Vec<String>>,

    /// Total number of code blocks in the document.
    #[serde(default)]
    pub expect_code_blocks: Option<usize>,
}

/// Split a fixture into its TOML frontmatter and markdown document.
fn split_fixture(content: &str) -> Result<(FixtureConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    // An empty frontmatter block closes immediately.
    let (toml_str, rest) = if let Some(rest) = after_open.strip_prefix("---") {
        ("", rest)
    } else {
        let close = after_open
            .find("\n---")
            .ok_or("missing closing --- frontmatter delimiter")?;
        (after_open[..close].trim_end_matches('\r'), &after_open[close + 4..])
    };

    let document = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: FixtureConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, document))
}

pub enum Outcome {
    Pass,
    Fail(String),
}

pub struct FixtureResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: Outcome,
}

impl FixtureResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(".test.md"))
                .unwrap_or("?")
        })
    }
}

fn run_fixture(path: &Path) -> FixtureResult {
    let fail = |description: Option<String>, reason: String| FixtureResult {
        path: path.to_path_buf(),
        description,
        outcome: Outcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };
    let (config, source) = match split_fixture(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();
    let origin = path.display().to_string();
    let outcome = match check_fixture(&config, &origin, source) {
        Ok(()) => Outcome::Pass,
        Err(reasons) => Outcome::Fail(reasons.join("\n")),
    };

    FixtureResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Run the pipeline on a fixture document and compare against its
/// expectations. Returns every mismatch found.
fn check_fixture(config: &FixtureConfig, origin: &str, source: &str) -> Result<(), Vec<String>> {
    let parsed = Parser::new(origin, source.to_string(), 0).parse();

    let document = match (parsed, config.expect_parse_error) {
        (Err(errors), true) => {
            let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            return expect_error_message(config, &messages);
        }
        (Ok(_), true) => return Err(vec!["expected parse error, but parsing succeeded".into()]),
        (Err(errors), false) => {
            let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            return Err(vec![format!("unexpected parse error: {}", messages.join("; "))]);
        }
        (Ok(doc), false) => doc,
    };

    let report = match (bundler::link(&document), config.expect_ambiguous) {
        (Err(errors), true) => {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return expect_error_message(config, &messages);
        }
        (Ok(_), true) => return Err(vec!["expected ambiguous anchor, but linking succeeded".into()]),
        (Err(errors), false) => {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(vec![format!("unexpected link error: {}", messages.join("; "))]);
        }
        (Ok(report), false) => report,
    };

    let mut reasons = Vec::new();
    if let Some(expected) = &config.expect_error {
        reasons.push(format!(
            "expected an error containing \"{}\", but the document is valid",
            expected
        ));
    }
    check_document(config, &document, &report, &mut reasons);

    if reasons.is_empty() { Ok(()) } else { Err(reasons) }
}

fn expect_error_message(config: &FixtureConfig, messages: &[String]) -> Result<(), Vec<String>> {
    match &config.expect_error {
        Some(expected) if !messages.iter().any(|m| m.contains(expected.as_str())) => {
            Err(vec![format!(
                "expected an error containing \"{}\", got: {}",
                expected,
                messages.join("; ")
            )])
        }
        _ => Ok(()),
    }
}

fn check_document(
    config: &FixtureConfig,
    document: &Document,
    report: &LinkReport,
    reasons: &mut Vec<String>,
) {
    if let Some(expected) = &config.expect_anchors {
        let actual: Vec<&str> = document.sections.iter().map(|s| s.anchor.as_str()).collect();
        if actual != *expected {
            reasons.push(format!(
                "anchor mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = &config.expect_unresolved {
        let actual: Vec<&str> = report
            .unresolved()
            .iter()
            .map(|u| u.target.as_str())
            .collect();
        if actual != *expected {
            reasons.push(format!(
                "unresolved entries mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = config.expect_code_blocks {
        let actual = document.code_blocks().len();
        if actual != expected {
            reasons.push(format!("expected {} code block(s), found {}", expected, actual));
        }
    }
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_fixtures(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_fixtures(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_fixtures(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given fixture path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} fixtures)", category_label(category), files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Keep only the requested categories (and their subcategories).
fn filter_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let matching: Vec<&String> = all
            .keys()
            .filter(|cat| *cat == request || cat.starts_with(&format!("{}/", request)))
            .collect();
        if matching.is_empty() {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
        for category in matching {
            selected.insert(category.clone(), all[category].clone());
        }
    }
    selected
}

/// Run all `.test.md` files under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        filter_categories(all, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<FixtureResult> = Vec::new();

    for (category, files) in &selected {
        eprintln!();
        eprintln!("{}", paint(category_label(category), "1", no_color));

        for file in files {
            let result = run_fixture(file);
            if matches!(result.outcome, Outcome::Pass) {
                passed += 1;
                eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
            } else {
                eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let Outcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_from_document() {
        let (config, doc) =
            split_fixture("---\ndescription = \"d\"\nexpect_code_blocks = 2\n---\n# Title\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.expect_code_blocks, Some(2));
        assert_eq!(doc, "# Title\n");
    }

    #[test]
    fn empty_frontmatter_is_allowed() {
        let (config, doc) = split_fixture("---\n---\n# T\n").unwrap();
        assert!(!config.expect_parse_error);
        assert_eq!(doc, "# T\n");
    }

    #[test]
    fn missing_frontmatter_is_an_error() {
        assert!(split_fixture("# no frontmatter\n").is_err());
        assert!(split_fixture("---\ndescription = \"x\"\n").is_err());
    }

    #[test]
    fn unknown_expectation_is_rejected() {
        let err = split_fixture("---\nexpect_output = \"x\"\n---\n").err().unwrap();
        assert!(err.starts_with("TOML parse error"));
    }

    #[test]
    fn check_reports_anchor_mismatch() {
        let config = FixtureConfig {
            expect_anchors: Some(vec!["a".to_string(), "b".to_string()]),
            ..FixtureConfig::default()
        };
        let reasons = check_fixture(&config, "t.md", "# A\n\n# C\n").unwrap_err();
        assert!(reasons[0].starts_with("anchor mismatch"));
    }

    #[test]
    fn check_matches_expected_parse_error() {
        let config = FixtureConfig {
            expect_parse_error: true,
            expect_error: Some("unterminated".to_string()),
            ..FixtureConfig::default()
        };
        assert!(check_fixture(&config, "t.md", "# A\n\n```\nx\n").is_ok());
    }

    #[test]
    fn expected_error_on_valid_document_fails() {
        let config = FixtureConfig {
            expect_error: Some("anything".to_string()),
            ..FixtureConfig::default()
        };
        assert!(check_fixture(&config, "t.md", "# A\n").is_err());
    }

    #[test]
    fn bundled_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        assert_eq!(run_tests(&fixtures, true, &[]), 0);
    }

    #[test]
    fn category_filter_selects_subtrees() {
        let all = BTreeMap::from([
            ("anchors".to_string(), vec![PathBuf::from("a")]),
            ("toc".to_string(), vec![PathBuf::from("b")]),
            ("toc/nested".to_string(), vec![PathBuf::from("c")]),
        ]);
        let selected = filter_categories(all, &["toc".to_string()]);
        let keys: Vec<&str> = selected.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["toc", "toc/nested"]);
    }
}
