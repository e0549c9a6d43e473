//! Error types and diagnostic reporting

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use thiserror::Error;
use super::logger::{self, Severity};
use super::Span;

/// Compile error with source location
///
/// Recoverable language errors are logged instead; these stop the pipeline.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("compilation of module {module} failed with {errors} error(s)")]
    Analysis { module: String, errors: usize },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn analysis(module: impl Into<String>, errors: usize) -> Self {
        Self::Analysis {
            module: module.into(),
            errors,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Diagnostic reporter for pretty error output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    pub fn report_error(&self, file_id: usize, error: &CompileError) {
        let diagnostic = match error {
            CompileError::Lexer { message, span } => Diagnostic::error()
                .with_message("Lexer error")
                .with_labels(vec![
                    Label::primary(file_id, span.range()).with_message(message)
                ]),

            CompileError::Analysis { .. } | CompileError::Internal { .. } => {
                Diagnostic::error().with_message(error.to_string())
            }

            CompileError::Io(err) => {
                Diagnostic::error().with_message(format!("IO error: {}", err))
            }
        };

        let _ = term::emit(&mut self.writer.lock(), &self.config, &self.files, &diagnostic);
    }

    /// Render a logged diagnostic; debug and info messages stay in the trace log
    pub fn report(&self, file_id: usize, diagnostic: &logger::Diagnostic) {
        let base = match diagnostic.severity {
            Severity::Error => Diagnostic::error(),
            Severity::Warning => Diagnostic::warning(),
            Severity::Debug | Severity::Info => return,
        };
        let rendered = base
            .with_message(diagnostic.message.clone())
            .with_labels(vec![Label::primary(file_id, diagnostic.span.range())]);
        let _ = term::emit(&mut self.writer.lock(), &self.config, &self.files, &rendered);
    }

    pub fn report_all<'a>(
        &self,
        file_id: usize,
        diagnostics: impl IntoIterator<Item = &'a logger::Diagnostic>,
    ) {
        for diagnostic in diagnostics {
            self.report(file_id, diagnostic);
        }
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = CompileError::analysis("Test", 2);
        assert_eq!(err.to_string(), "compilation of module Test failed with 2 error(s)");
    }
}
