//! Oberon frontend
//!
//! The frontend is responsible for:
//! 1. Lexing source code into tokens
//! 2. Parsing tokens while driving the semantic analyzer
//! 3. Handing the resolved module, its arena and the diagnostics to the driver

pub mod lexer;
pub mod parser;

use crate::ast::{Arena, Module};
use crate::common::{CompileResult, Logger};
use crate::interface::SymbolImporter;
use crate::sema::Analyzer;
use lexer::OberonLexer;
use parser::Parser;

/// Configuration options passed to the frontend and the later stages
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub dump_tokens: bool,
    pub dump_ast: bool,
    pub verbose: bool,
    /// Allow `...` as the last formal parameter
    pub enable_varargs: bool,
    /// Allow `PROCEDURE ["C"] ...; EXTERNAL ["name"]` declarations
    pub enable_extern: bool,
    pub warnings_as_errors: bool,
    /// Run the lambda lifter after analysis
    pub lift: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dump_tokens: false,
            dump_ast: false,
            verbose: false,
            enable_varargs: false,
            enable_extern: false,
            warnings_as_errors: false,
            lift: true,
        }
    }
}

/// Result of analyzing one source text
#[derive(Debug)]
pub struct FrontendOutput {
    /// `None` if the module header could not be parsed
    pub module: Option<Module>,
    pub arena: Arena,
    pub logger: Logger,
}

/// Parse and analyze a module. Never fails: every problem is logged.
pub fn analyze_source(source: &str, config: &CompilerConfig, importer: Option<&dyn SymbolImporter>) -> FrontendOutput {
    let analyzer = Analyzer::new(config.clone(), importer);
    let mut parser = Parser::new(source, analyzer);
    let module = parser.parse_module();
    let (arena, logger) = parser.into_analyzer().into_parts();
    if let Some(module) = &module {
        tracing::debug!(
            module = %module.name,
            errors = logger.error_count(),
            warnings = logger.warning_count(),
            "frontend finished"
        );
    }
    FrontendOutput { module, arena, logger }
}

/// Render the token stream, one token per line.
pub fn dump_tokens(source: &str) -> CompileResult<String> {
    let tokens = OberonLexer::new(source).tokenize_all()?;
    let mut output = String::new();
    for token in tokens {
        output.push_str(&format!("{:?} @ {}..{}\n", token.kind, token.span.start, token.span.end));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.lift);
        assert!(!config.enable_varargs);
        assert!(!config.enable_extern);
    }

    #[test]
    fn test_analyze_source() {
        let output = analyze_source("MODULE Empty; END Empty.", &CompilerConfig::default(), None);
        assert_eq!(output.logger.error_count(), 0);
        assert_eq!(output.module.map(|module| module.name), Some("Empty".to_string()));
    }

    #[test]
    fn test_missing_header() {
        let output = analyze_source("BEGIN END", &CompilerConfig::default(), None);
        assert!(output.module.is_none());
        assert_eq!(output.logger.error_count(), 1);
    }

    #[test]
    fn test_dump_tokens() {
        let dump = dump_tokens("x := 1").unwrap();
        assert_eq!(dump, "Ident(\"x\") @ 0..1\nBecomes @ 2..4\nInteger(1) @ 5..6\nEof @ 6..6\n");
    }
}
