//! Resolved syntax tree
//!
//! The tree produced by the analyzer. Expressions carry their final type
//! and an optional implicit cast, designators carry their resolved
//! declaration.

mod arena;
mod decl;
mod expr;
mod stmt;

pub use arena::{Arena, DeclId};
pub use decl::{
    Block, CallingConvention, Decl, DeclKind, External, Ident, IdentDef, Import, Module,
    Procedure, QualIdent,
};
pub use expr::{BinaryOp, Designator, Expr, ExprKind, Literal, Selector, SelectorKind, UnaryOp};
pub use stmt::{
    has_exit, returns, terminator_index, CaseArm, CaseLabels, ElseIf, Statement, StatementKind,
};
