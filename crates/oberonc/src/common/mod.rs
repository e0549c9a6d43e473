//! Common infrastructure shared by every compiler stage

mod error;
mod logger;
mod span;

pub use error::{CompileError, CompileResult, DiagnosticReporter};
pub use logger::{Diagnostic, Logger, Severity};
pub use span::Span;
