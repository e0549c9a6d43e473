//! Statements and control-flow queries

use super::expr::Expr;
use crate::common::Span;
use crate::types::TypeId;

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// Labels of one case arm. Numeric labels are expanded into `values`;
/// type labels record the guard type in `guard`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseLabels {
    pub labels: Vec<Expr>,
    pub values: Vec<(i64, Span)>,
    pub guard: Option<TypeId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub labels: CaseLabels,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `target` is always a designator expression.
    Assignment { target: Expr, value: Expr },
    /// Procedure call, a designator expression.
    Call(Expr),
    If { cond: Expr, then: Vec<Statement>, elsifs: Vec<ElseIf>, otherwise: Option<Vec<Statement>> },
    Case { expr: Expr, arms: Vec<CaseArm>, otherwise: Option<Vec<Statement>> },
    Loop(Vec<Statement>),
    While { cond: Expr, body: Vec<Statement>, elsifs: Vec<ElseIf> },
    Repeat { body: Vec<Statement>, cond: Expr },
    For { counter: Expr, low: Expr, high: Expr, step: Expr, body: Vec<Statement> },
    Exit,
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True if every path through the statement ends in a RETURN.
    pub fn is_return(&self) -> bool {
        match &self.kind {
            StatementKind::Return(_) => true,
            StatementKind::If { then, elsifs, otherwise, .. } => {
                returns(then)
                    && elsifs.iter().all(|elsif| returns(&elsif.body))
                    && otherwise.as_ref().is_some_and(|body| returns(body))
            }
            StatementKind::Case { arms, otherwise, .. } => {
                arms.iter().all(|arm| returns(&arm.body))
                    && otherwise.as_ref().is_some_and(|body| returns(body))
            }
            StatementKind::Loop(body) | StatementKind::Repeat { body, .. } => returns(body),
            _ => false,
        }
    }

    /// True if an EXIT leaves the innermost enclosing loop from here.
    pub fn has_exit(&self) -> bool {
        match &self.kind {
            StatementKind::Exit => true,
            StatementKind::If { then, elsifs, otherwise, .. } => {
                has_exit(then)
                    || elsifs.iter().any(|elsif| has_exit(&elsif.body))
                    || otherwise.as_ref().is_some_and(|body| has_exit(body))
            }
            StatementKind::Case { arms, otherwise, .. } => {
                arms.iter().any(|arm| has_exit(&arm.body))
                    || otherwise.as_ref().is_some_and(|body| has_exit(body))
            }
            _ => false,
        }
    }

    /// True if control never falls through to the next statement.
    pub fn is_terminator(&self) -> bool {
        match &self.kind {
            StatementKind::Return(_) | StatementKind::Exit => true,
            StatementKind::If { then, elsifs, otherwise, .. } => {
                terminator_index(then).is_some()
                    && elsifs.iter().all(|elsif| terminator_index(&elsif.body).is_some())
                    && otherwise.as_ref().is_some_and(|body| terminator_index(body).is_some())
            }
            StatementKind::Case { arms, otherwise, .. } => {
                arms.iter().all(|arm| terminator_index(&arm.body).is_some())
                    && otherwise.as_ref().is_some_and(|body| terminator_index(body).is_some())
            }
            _ => false,
        }
    }
}

pub fn returns(statements: &[Statement]) -> bool {
    statements.iter().any(Statement::is_return)
}

pub fn has_exit(statements: &[Statement]) -> bool {
    statements.iter().any(Statement::has_exit)
}

/// Index of the first statement after which control cannot continue.
pub fn terminator_index(statements: &[Statement]) -> Option<usize> {
    statements.iter().position(Statement::is_terminator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use pretty_assertions::assert_eq;

    fn ret() -> Statement {
        Statement::new(StatementKind::Return(None), Span::default())
    }

    fn truth() -> Expr {
        Expr::literal(Literal::Boolean(true), TypeId::BOOLEAN, Span::default())
    }

    #[test]
    fn test_if_without_else_does_not_return() {
        let stmt = Statement::new(
            StatementKind::If { cond: truth(), then: vec![ret()], elsifs: vec![], otherwise: None },
            Span::default(),
        );
        assert!(!stmt.is_return());
        let stmt = Statement::new(
            StatementKind::If { cond: truth(), then: vec![ret()], elsifs: vec![], otherwise: Some(vec![ret()]) },
            Span::default(),
        );
        assert!(stmt.is_return());
    }

    #[test]
    fn test_exit_does_not_escape_nested_loop() {
        let exit = Statement::new(StatementKind::Exit, Span::default());
        let inner = Statement::new(StatementKind::Loop(vec![exit.clone()]), Span::default());
        assert!(!inner.has_exit());
        assert!(has_exit(&[exit]));
        assert_eq!(terminator_index(&[inner, ret()]), Some(1));
    }
}
