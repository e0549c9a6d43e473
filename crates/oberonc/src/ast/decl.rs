//! Declarations, blocks and modules

use super::expr::Literal;
use super::stmt::Statement;
use super::DeclId;
use crate::common::Span;
use crate::sema::Builtin;
use crate::types::TypeId;
use std::fmt;

/// Identifier as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

/// Identifier at a definition site, with its export mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentDef {
    pub name: String,
    pub exported: bool,
    pub span: Span,
}

impl IdentDef {
    pub fn new(name: impl Into<String>, exported: bool, span: Span) -> Self {
        Self { name: name.into(), exported, span }
    }
}

/// Possibly module-qualified identifier, `M.x` or `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualIdent {
    pub qualifier: Option<String>,
    pub name: String,
    pub span: Span,
}

impl QualIdent {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { qualifier: None, name: name.into(), span }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>, span: Span) -> Self {
        Self { qualifier: Some(qualifier.into()), name: name.into(), span }
    }

    pub fn is_qualified(&self) -> bool {
        self.qualifier.is_some()
    }
}

impl fmt::Display for QualIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// Oberon procedure compiled separately.
    Olang,
    C,
}

#[derive(Debug, Clone, PartialEq)]
pub struct External {
    pub convention: CallingConvention,
    /// Linker-visible name.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub constants: Vec<DeclId>,
    pub types: Vec<DeclId>,
    pub variables: Vec<DeclId>,
    pub procedures: Vec<DeclId>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Procedure {
    pub block: Block,
    pub external: Option<External>,
    pub builtin: Option<Builtin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    /// Folded value, `None` after an invalid initializer.
    Constant(Option<Literal>),
    Type,
    Variable { index: usize },
    Field { index: usize },
    Parameter { is_var: bool, index: usize },
    Procedure(Box<Procedure>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub exported: bool,
    pub kind: DeclKind,
    pub ty: TypeId,
    /// Lexical scope level: 0 universe, 1 module, deeper for locals.
    pub level: u32,
    /// Declaring module, `None` for predefined declarations.
    pub module: Option<String>,
    /// Set for declarations read from another module's interface.
    pub external: bool,
    pub span: Span,
}

impl Decl {
    pub fn new(name: impl Into<String>, kind: DeclKind, ty: TypeId, span: Span) -> Self {
        Self {
            name: name.into(),
            exported: false,
            kind,
            ty,
            level: 0,
            module: None,
            external: false,
            span,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, DeclKind::Constant(_))
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Type)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, DeclKind::Variable { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, DeclKind::Parameter { .. })
    }

    pub fn is_var_parameter(&self) -> bool {
        matches!(self.kind, DeclKind::Parameter { is_var: true, .. })
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, DeclKind::Field { .. })
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self.kind, DeclKind::Procedure(_))
    }

    pub fn constant_value(&self) -> Option<&Literal> {
        match &self.kind {
            DeclKind::Constant(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn procedure(&self) -> Option<&Procedure> {
        match &self.kind {
            DeclKind::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    pub fn procedure_mut(&mut self) -> Option<&mut Procedure> {
        match &mut self.kind {
            DeclKind::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    pub fn builtin(&self) -> Option<Builtin> {
        self.procedure().and_then(|procedure| procedure.builtin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Local name, equal to `module` without an alias.
    pub alias: String,
    pub module: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub span: Span,
    pub imports: Vec<Import>,
    pub block: Block,
}

impl Module {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span, imports: Vec::new(), block: Block::default() }
    }
}
