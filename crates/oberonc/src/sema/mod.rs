//! Semantic analysis
//!
//! The [`Analyzer`] receives one hook call per grammar production from the
//! parser and returns resolved nodes. Name resolution goes through the
//! [`SymbolTable`], predefined types and procedures come from [`System`].

mod analyzer;
mod case;
mod compat;
mod expressions;
mod fold;
mod selectors;
mod statements;
mod symtab;
mod system;

pub use analyzer::Analyzer;
pub use fold::{int_type, ConstantFolder, Folded, SET_MAX};
pub use symtab::{SymbolTable, MODULE_LEVEL, UNIVERSE_LEVEL};
pub use system::{Builtin, Dispatch, System};

#[cfg(test)]
pub(crate) mod tests {
    use super::Analyzer;
    use crate::frontend::{analyze_source, CompilerConfig, FrontendOutput};

    pub(crate) fn analyzer() -> Analyzer<'static> {
        Analyzer::new(CompilerConfig::default(), None)
    }

    pub(crate) fn config() -> CompilerConfig {
        CompilerConfig { enable_varargs: true, enable_extern: true, ..CompilerConfig::default() }
    }

    pub(crate) fn analyze(source: &str) -> FrontendOutput {
        analyze_source(source, &config(), None)
    }

    pub(crate) fn errors(output: &FrontendOutput) -> Vec<String> {
        output.logger.errors().map(|d| d.message.clone()).collect()
    }

    pub(crate) fn warnings(output: &FrontendOutput) -> Vec<String> {
        output.logger.warnings().map(|d| d.message.clone()).collect()
    }
}
