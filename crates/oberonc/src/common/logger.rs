//! Diagnostics sink shared by the parser, analyzer and lifter
//!
//! Every message is recorded with its severity and span so the driver can
//! decide whether to continue and render the accumulated diagnostics later.
//! Messages are mirrored to `tracing` at the matching level.

use super::Span;
use std::fmt;

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Default)]
pub struct Logger {
    diagnostics: Vec<Diagnostic>,
    counts: [usize; 4],
    warnings_as_errors: bool,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote every warning to an error
    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    pub fn debug(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(start = span.start, "{}", message);
        self.record(Severity::Debug, message, span);
    }

    pub fn info(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(start = span.start, "{}", message);
        self.record(Severity::Info, message, span);
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        if self.warnings_as_errors {
            tracing::error!(start = span.start, "{}", message);
            self.record(Severity::Error, message, span);
        } else {
            tracing::warn!(start = span.start, "{}", message);
            self.record(Severity::Warning, message, span);
        }
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(start = span.start, "{}", message);
        self.record(Severity::Error, message, span);
    }

    fn record(&mut self, severity: Severity, message: String, span: Span) {
        self.counts[severity.index()] += 1;
        self.diagnostics.push(Diagnostic { severity, message, span });
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics at or above `severity`, in the order they were logged
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity >= severity)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
