mod config;
mod diagnostics;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bundler::BundleReport;
use docbundle::section::Section;

use crate::config::{BundleConfig, Overrides};
use crate::diagnostics::Reporter;

#[derive(Parser)]
#[command(name = "docbundle", version, about = "Validate and bundle markdown topic files")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log pipeline progress to stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and link documents, reporting problems
    Check(CheckArgs),

    /// Render documents into a bundle
    Build(BuildArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Markdown files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Fail on unresolved table-of-contents entries
    #[arg(long)]
    strict: bool,

    /// Print each document's section tree with anchors
    #[arg(long)]
    outline: bool,

    /// Dump parsed documents
    #[arg(long)]
    ast: bool,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Markdown files or directories (defaults to `inputs` from the config)
    inputs: Vec<PathBuf>,

    /// Output file (single layout) or directory (per-document layout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: markdown or html
    #[arg(short, long)]
    format: Option<String>,

    /// Output layout: single or per-document
    #[arg(short, long)]
    layout: Option<String>,

    /// Bundle title
    #[arg(long)]
    title: Option<String>,

    /// Fail on unresolved table-of-contents entries
    #[arg(long)]
    strict: bool,

    /// Config file (defaults to ./docbundle.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Build(args) => do_build(args, cli.no_color),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                0
            } else {
                test_runner::run_tests(path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::new(format!("docbundle={0},bundler={0}", level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Discover, read, parse and link every input. Diagnostics are emitted
/// as a side effect; `None` means no inputs could be listed.
fn run_pipeline(reporter: &mut Reporter, inputs: &[PathBuf]) -> Option<BundleReport> {
    let paths = match bundler::discover_inputs(inputs) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("error: cannot list inputs: {}", e);
            return None;
        }
    };
    if paths.is_empty() {
        eprintln!("error: no markdown files found");
        return None;
    }

    info!(inputs = paths.len(), "processing documents");

    let report = bundler::process_paths(&paths, |origin, source| reporter.register(origin, source));
    reporter.emit_report(&report);
    Some(report)
}

fn summarize(report: &BundleReport) {
    let checked = report.documents.len() + report.failures.len();
    eprintln!(
        "{} document(s): {} ok, {} failed, {} unresolved table-of-contents entr{}",
        checked,
        report.documents.len(),
        report.failures.len(),
        report.warnings().len(),
        if report.warnings().len() == 1 { "y" } else { "ies" }
    );
}

fn do_check(args: CheckArgs, no_color: bool) -> i32 {
    let mut reporter = Reporter::new(no_color);
    let Some(report) = run_pipeline(&mut reporter, &args.inputs) else {
        return 1;
    };

    if args.ast {
        for doc in &report.documents {
            println!("{:#?}", doc.document);
        }
    }

    if args.outline {
        for doc in &report.documents {
            println!("{} ({})", doc.document.title, doc.document.origin);
            print_outline(&doc.document.sections);
        }
    }

    summarize(&report);
    if report.is_success(args.strict) { 0 } else { 1 }
}

fn print_outline(sections: &[Section]) {
    for section in sections {
        let pad = "  ".repeat(section.level.saturating_sub(1) as usize);
        let code = section.code_blocks().len();
        let code_note = if code == 0 {
            String::new()
        } else {
            format!(" [{} code block(s)]", code)
        };
        println!(
            "{}{} {}  #{}{}",
            pad,
            "#".repeat(section.level as usize),
            section.title,
            section.anchor,
            code_note
        );
    }
}

fn do_build(args: BuildArgs, no_color: bool) -> i32 {
    let config = match BundleConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let overrides = Overrides {
        inputs: args.inputs,
        output: args.output,
        format: args.format,
        layout: args.layout,
        title: args.title,
        strict: args.strict,
    };
    let settings = match config::resolve(config, overrides) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    let mut reporter = Reporter::new(no_color);
    let Some(report) = run_pipeline(&mut reporter, &settings.inputs) else {
        return 1;
    };

    if !report.documents.is_empty() {
        match bundler::write_output(&report.documents, &settings.output) {
            Ok(written) => {
                for path in written {
                    eprintln!("wrote {}", path.display());
                }
            }
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    }

    summarize(&report);
    if report.is_success(settings.strict) { 0 } else { 1 }
}
