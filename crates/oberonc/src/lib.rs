//! Oberon-07 compiler front end
//!
//! This library parses Oberon-07 modules, resolves and type checks them,
//! folds constant expressions and lifts nested procedures to module level.
//!
//! ## Architecture
//!
//! The compiler is organized into:
//! - **Frontend** (`frontend/`): Lexer, parser and configuration
//! - **Semantic analysis** (`sema/`): Symbol table, type rules, folding, analyzer hooks
//! - **AST** (`ast/`): Resolved tree and its arena
//! - **Types** (`types/`): Oberon type model
//! - **Interfaces** (`interface/`): Export and import of module interfaces
//! - **Lifter** (`lifter/`): Closure conversion of nested procedures
//! - **Driver** (`driver/`): Multi-module pipeline
//! - **Common** (`common/`): Shared infrastructure (errors, diagnostics, spans)

pub mod common;
pub mod types;
pub mod ast;
pub mod frontend;
pub mod sema;
pub mod interface;
pub mod lifter;
pub mod driver;

// Re-exports for convenience
pub use common::{CompileError, CompileResult, DiagnosticReporter, Logger, Span};
pub use driver::{CompiledModule, Pipeline};
pub use frontend::{analyze_source, CompilerConfig, FrontendOutput};
