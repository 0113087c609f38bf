use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use bundler::BundleReport;

/// Owns the codespan file database and the stderr stream diagnostics go to.
pub struct Reporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl Reporter {
    pub fn new(no_color: bool) -> Self {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Reporter {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(color_choice),
            config: term::Config::default(),
        }
    }

    /// Register a source text and return its file id.
    pub fn register(&mut self, origin: &str, source: &str) -> usize {
        self.files.add(origin.to_string(), source.to_string())
    }

    pub fn emit(&self, diagnostic: &Diagnostic<usize>) {
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            diagnostic,
        );
    }

    /// Emit every failure and warning in the report.
    pub fn emit_report(&self, report: &BundleReport) {
        for failure in &report.failures {
            for diagnostic in failure.to_diagnostics() {
                self.emit(&diagnostic);
            }
        }
        for warning in report.warnings() {
            self.emit(&warning.to_diagnostic());
        }
    }
}
