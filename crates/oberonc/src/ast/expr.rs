//! Expressions and designators

use super::decl::QualIdent;
use super::DeclId;
use crate::common::Span;
use crate::types::TypeId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Char(u8),
    String(String),
    /// Bit `i` set means element `i` is a member.
    Set(u32),
    Nil,
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Real(_) => "real",
            Literal::Char(_) => "character",
            Literal::String(_) => "string",
            Literal::Set(_) => "set",
            Literal::Nil => "NIL",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
            Literal::Integer(value) => write!(f, "{}", value),
            Literal::Real(value) => write!(f, "{:?}", value),
            Literal::Char(value) if value.is_ascii_graphic() => write!(f, "'{}'", char::from(*value)),
            Literal::Char(value) => write!(f, "{:X}X", value),
            Literal::String(value) => write!(f, "\"{}\"", value),
            Literal::Set(bits) => {
                let members: Vec<String> = (0..32)
                    .filter(|bit| bits & (1u32 << bit) != 0)
                    .map(|bit| bit.to_string())
                    .collect();
                write!(f, "{{{}}}", members.join(", "))
            }
            Literal::Nil => write!(f, "NIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    In,
    Is,
    Plus,
    Minus,
    Or,
    Times,
    Divide,
    Div,
    Mod,
    And,
}

impl BinaryOp {
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Leq
                | BinaryOp::Gt
                | BinaryOp::Geq
                | BinaryOp::In
                | BinaryOp::Is
        )
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "~"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "#",
            BinaryOp::Lt => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Geq => ">=",
            BinaryOp::In => "IN",
            BinaryOp::Is => "IS",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Or => "OR",
            BinaryOp::Times => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Div => "DIV",
            BinaryOp::Mod => "MOD",
            BinaryOp::And => "&",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorKind {
    Index(Vec<Expr>),
    Field { name: String, field: Option<DeclId> },
    /// `implicit` marks dereferences inserted before an index or field.
    Deref { implicit: bool },
    TypeGuard { ident: QualIdent, guard: TypeId },
    Call(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub span: Span,
    /// Type after applying this selector.
    pub ty: TypeId,
}

impl Selector {
    pub fn new(kind: SelectorKind, span: Span) -> Self {
        Self { kind, span, ty: TypeId::NO_TYPE }
    }

    pub fn field(name: impl Into<String>, span: Span) -> Self {
        Self::new(SelectorKind::Field { name: name.into(), field: None }, span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Designator {
    pub ident: QualIdent,
    pub decl: Option<DeclId>,
    pub selectors: Vec<Selector>,
}

impl Designator {
    pub fn new(ident: QualIdent) -> Self {
        Self { ident, decl: None, selectors: Vec::new() }
    }

    pub fn is_call(&self) -> bool {
        matches!(self.selectors.last(), Some(Selector { kind: SelectorKind::Call(_), .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Designator(Designator),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Range { lower: Box<Expr>, upper: Box<Expr> },
    Set(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
    /// Implicit conversion the code generator has to emit.
    pub cast: Option<TypeId>,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeId, span: Span) -> Self {
        Self { kind, ty, cast: None, span }
    }

    pub fn literal(value: Literal, ty: TypeId, span: Span) -> Self {
        Self::new(ExprKind::Literal(value), ty, span)
    }

    pub fn designator(designator: Designator, ty: TypeId, span: Span) -> Self {
        Self::new(ExprKind::Designator(designator), ty, span)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_designator(&self) -> Option<&Designator> {
        match &self.kind {
            ExprKind::Designator(designator) => Some(designator),
            _ => None,
        }
    }

    pub fn as_designator_mut(&mut self) -> Option<&mut Designator> {
        match &mut self.kind {
            ExprKind::Designator(designator) => Some(designator),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    /// Literals and sets or ranges built only from literals.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Designator(_) => false,
            ExprKind::Unary { operand, .. } => operand.is_constant(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.is_constant() && rhs.is_constant(),
            ExprKind::Range { lower, upper } => lower.is_constant() && upper.is_constant(),
            ExprKind::Set(elements) => elements.iter().all(Expr::is_constant),
        }
    }

    pub fn integer_value(&self) -> Option<i64> {
        match self.as_literal() {
            Some(Literal::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Type the value has after its implicit conversion.
    pub fn effective_type(&self) -> TypeId {
        self.cast.unwrap_or(self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Set(0b1011).to_string(), "{0, 1, 3}");
        assert_eq!(Literal::Char(b'a').to_string(), "'a'");
        assert_eq!(Literal::Char(0).to_string(), "0X");
        assert_eq!(Literal::Boolean(true).to_string(), "TRUE");
    }

    #[test]
    fn test_constant_expression() {
        let span = Span::default();
        let one = Expr::literal(Literal::Integer(1), TypeId::SHORTINT, span);
        let var = Expr::designator(Designator::new(QualIdent::new("x", span)), TypeId::INTEGER, span);
        let sum = Expr::new(
            ExprKind::Binary { op: BinaryOp::Plus, lhs: Box::new(one.clone()), rhs: Box::new(one.clone()) },
            TypeId::SHORTINT,
            span,
        );
        let mixed = Expr::new(
            ExprKind::Binary { op: BinaryOp::Plus, lhs: Box::new(one), rhs: Box::new(var) },
            TypeId::INTEGER,
            span,
        );
        assert!(sum.is_constant());
        assert!(!mixed.is_constant());
    }
}
