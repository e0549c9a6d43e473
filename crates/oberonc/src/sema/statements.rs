//! Statement hooks

use super::Analyzer;
use crate::ast::{
    has_exit, terminator_index, Designator, ElseIf, Expr, Literal, QualIdent, Selector, SelectorKind, Statement,
    StatementKind,
};
use crate::common::Span;
use crate::types::TypeId;

impl Analyzer<'_> {
    /// Flag the first statement following a RETURN or EXIT.
    pub fn on_statement_sequence(&mut self, statements: &[Statement]) {
        if let Some(next) = terminator_index(statements).and_then(|index| statements.get(index + 1)) {
            self.logger.error(next.span, "unreachable code.");
        }
    }

    pub fn on_assignment(&mut self, span: Span, target: Expr, value: Option<Expr>) -> Option<Statement> {
        if let Err(reason) = self.assert_assignable(&target) {
            self.logger.error(target.span, format!("cannot assign to {}.", reason));
        }
        let Some(mut value) = value else {
            self.logger.error(span, "undefined right-hand side in assignment.");
            return None;
        };
        if target.ty != TypeId::NO_TYPE
            && value.ty != TypeId::NO_TYPE
            && self.is_compatible(value.span, target.ty, value.ty)
            && target.ty != value.ty
        {
            if value.is_literal() {
                self.cast_literal(&mut value, target.ty);
            } else {
                if self.arena.ty(target.ty).is_array() && self.arena.ty(value.ty).is_char() {
                    self.logger.error(
                        target.span,
                        "type mismatch: cannot assign a non-constant character value to a string variable.",
                    );
                }
                self.cast(&mut value, target.ty);
            }
        }
        Some(Statement::new(StatementKind::Assignment { target, value }, span))
    }

    fn check_condition(&mut self, span: Span, cond: Option<Expr>, statement: &str) -> Option<Expr> {
        let Some(cond) = cond else {
            self.logger.error(span, format!("undefined condition in {}.", statement));
            return None;
        };
        if cond.ty != TypeId::NO_TYPE && !self.arena.ty(cond.ty).is_boolean() {
            self.logger.error(cond.span, "Boolean expression expected.");
        }
        Some(cond)
    }

    pub fn on_if(
        &mut self,
        span: Span,
        cond: Option<Expr>,
        then: Vec<Statement>,
        elsifs: Vec<ElseIf>,
        otherwise: Option<Vec<Statement>>,
    ) -> Option<Statement> {
        let cond = self.check_condition(span, cond, "if-statement")?;
        Some(Statement::new(StatementKind::If { cond, then, elsifs, otherwise }, span))
    }

    pub fn on_else_if(&mut self, span: Span, cond: Option<Expr>, body: Vec<Statement>) -> Option<ElseIf> {
        let cond = self.check_condition(span, cond, "elsif-statement")?;
        Some(ElseIf { cond, body, span })
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Called before the body of every loop kind, paired with the hook
    /// that completes the loop.
    pub fn on_loop_start(&mut self) {
        self.loops += 1;
    }

    pub(crate) fn on_loop_end(&mut self) {
        self.loops = self.loops.saturating_sub(1);
    }

    pub fn on_loop(&mut self, span: Span, body: Vec<Statement>) -> Statement {
        if !has_exit(&body) {
            self.logger.warning(span, "LOOP statement without EXIT found.");
        }
        self.on_loop_end();
        Statement::new(StatementKind::Loop(body), span)
    }

    pub fn on_while(
        &mut self,
        span: Span,
        cond: Option<Expr>,
        body: Vec<Statement>,
        elsifs: Vec<ElseIf>,
    ) -> Option<Statement> {
        self.on_loop_end();
        let cond = self.check_condition(span, cond, "while-loop")?;
        Some(Statement::new(StatementKind::While { cond, body, elsifs }, span))
    }

    pub fn on_repeat(&mut self, span: Span, cond: Option<Expr>, body: Vec<Statement>) -> Option<Statement> {
        self.on_loop_end();
        let cond = self.check_condition(span, cond, "repeat-loop")?;
        Some(Statement::new(StatementKind::Repeat { body, cond }, span))
    }

    /// `FOR v := low TO high [BY step] DO body END`. A missing step
    /// defaults to 1.
    pub fn on_for(
        &mut self,
        span: Span,
        counter: QualIdent,
        low: Option<Expr>,
        high: Option<Expr>,
        step: Option<Expr>,
        body: Vec<Statement>,
    ) -> Option<Statement> {
        self.on_loop_end();
        let ident = counter.clone();
        let counter = self.on_qualified_expression(ident.span, counter, Vec::new());
        if ident.is_qualified() {
            self.logger.error(ident.span, format!("{} cannot be used as a loop counter.", ident));
        }
        let mut ty = None;
        if let Some(decl) = counter.as_designator().and_then(|designator| designator.decl) {
            let decl = self.arena.decl(decl);
            if !decl.is_variable() {
                self.logger.error(ident.span, "variable expected.");
            }
            if decl.ty != TypeId::NO_TYPE && !self.arena.ty(decl.ty).is_integer() {
                let message = format!("type mismatch: integer type expected, found {}.", self.arena.type_name(decl.ty));
                self.logger.error(ident.span, message);
            } else if decl.ty != TypeId::NO_TYPE {
                ty = Some(decl.ty);
            }
        }

        let Some(mut low) = low else {
            self.logger.error(span, "undefined low value in for-loop.");
            return None;
        };
        let Some(mut high) = high else {
            self.logger.error(span, "undefined high value in for-loop.");
            return None;
        };
        for bound in [&mut low, &mut high] {
            if let Some(ty) = ty {
                if bound.ty != TypeId::NO_TYPE && self.is_compatible(bound.span, ty, bound.ty) {
                    self.cast(bound, ty);
                }
            }
        }

        let step = match step {
            Some(mut step) => {
                if !step.is_literal() {
                    self.logger.error(step.span, "constant expression expected.");
                } else if step.as_literal() == Some(&Literal::Integer(0)) {
                    self.logger.error(step.span, "step value cannot be zero.");
                } else if let Some(ty) = ty {
                    if self.is_compatible(step.span, ty, step.ty) {
                        self.cast(&mut step, ty);
                    }
                }
                step
            }
            None => self.on_integer_literal(span, 1, TypeId::INTEGER),
        };
        Some(Statement::new(StatementKind::For { counter, low, high, step, body }, span))
    }

    pub fn on_exit(&mut self, span: Span) -> Statement {
        if self.loops == 0 {
            self.logger.error(span, "EXIT statement outside of loop.");
        }
        Statement::new(StatementKind::Exit, span)
    }

    pub fn on_return(&mut self, span: Span, value: Option<Expr>) -> Statement {
        let Some(procedure) = self.current_procedure() else {
            if let Some(value) = &value {
                self.logger.error(value.span, "module cannot return a value.");
            }
            return Statement::new(StatementKind::Return(value), span);
        };
        let ret = self.arena.decl_type(procedure).as_procedure().and_then(|proc| proc.ret);
        let value = match (value, ret) {
            (Some(value), None) => {
                self.logger.error(value.span, "procedure cannot return a value.");
                Some(value)
            }
            (Some(mut value), Some(ret)) => {
                if value.ty != TypeId::NO_TYPE && self.is_compatible(value.span, ret, value.ty) {
                    if value.is_literal() {
                        self.cast_literal(&mut value, ret);
                    } else {
                        self.cast(&mut value, ret);
                    }
                }
                Some(value)
            }
            (None, Some(_)) => {
                self.logger.error(span, "function must return value.");
                None
            }
            (None, None) => None,
        };
        Statement::new(StatementKind::Return(value), span)
    }

    /// A designator in statement position: a procedure call, with or
    /// without an actual parameter list.
    pub fn on_qualified_statement(
        &mut self,
        span: Span,
        ident: QualIdent,
        selectors: Vec<Selector>,
    ) -> Option<Statement> {
        let Some(decl) = self.symbols.lookup(&ident) else {
            self.logger.error(ident.span, format!("undefined identifier: {}.", ident));
            return None;
        };
        let base = self.arena.decl(decl).ty;
        let (mut selectors, ty) = self.on_selectors(decl, base, selectors);

        if self.arena.ty(ty).is_procedure() {
            let has_result = self.arena.ty(ty).as_procedure().is_some_and(|proc| proc.ret.is_some());
            if has_result {
                self.logger.error(ident.span, "function procedure call must be followed by parameter list.");
            }
            let context = selectors
                .iter()
                .rev()
                .find_map(|selector| match &selector.kind {
                    SelectorKind::Field { field, .. } => *field,
                    _ => None,
                })
                .or(Some(decl));
            let call_span = Span::new(ident.span.end, ident.span.end);
            let result = self.on_actual_parameters(context, ty, call_span, &mut []).unwrap_or(TypeId::NO_TYPE);
            let mut call = Selector::new(SelectorKind::Call(Vec::new()), call_span);
            call.ty = result;
            selectors.push(call);
            let designator = Designator { ident, decl: Some(decl), selectors };
            return Some(Statement::new(StatementKind::Call(Expr::designator(designator, result, span)), span));
        }

        let is_call = matches!(selectors.last(), Some(Selector { kind: SelectorKind::Call(_), .. }));
        if is_call {
            if ty != TypeId::NO_TYPE {
                self.logger.warning(ident.span, "discarded expression value.");
            }
            let designator = Designator { ident, decl: Some(decl), selectors };
            return Some(Statement::new(StatementKind::Call(Expr::designator(designator, ty, span)), span));
        }
        self.logger.error(ident.span, "procedure call expected.");
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ExprKind, Literal, SelectorKind, StatementKind};
    use crate::sema::tests::{analyze, errors, warnings};
    use crate::types::TypeId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unreachable_code() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; PROCEDURE F(): INTEGER; BEGIN RETURN 1; F() END F; \
             BEGIN LOOP EXIT; i := 1 END END M.",
        );
        assert_eq!(errors(&output), vec!["unreachable code.", "unreachable code."]);
    }

    #[test]
    fn test_assignment_checks() {
        let output = analyze(
            "MODULE M; CONST c = 1; VAR i: INTEGER; b: BOOLEAN; s: ARRAY 4 OF CHAR; ch: CHAR; \
             BEGIN c := 2; i := b; s := ch; s := \"ok\" END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "variable, parameter, type, or function call expected.",
                "cannot assign to a constant.",
                "type mismatch: expected INTEGER, found BOOLEAN.",
                "type mismatch: cannot assign a non-constant character value to a string variable.",
            ]
        );
    }

    #[test]
    fn test_literal_is_cast_to_target() {
        let output = analyze("MODULE M; VAR r: REAL; BEGIN r := 2 END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.unwrap();
        let StatementKind::Assignment { value, .. } = &module.block.body[0].kind else {
            panic!("assignment expected");
        };
        assert_eq!(value.kind, ExprKind::Literal(Literal::Real(2.0)));
        assert_eq!(value.ty, TypeId::REAL);
    }

    #[test]
    fn test_conditions() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; BEGIN IF i THEN END; WHILE i # 0 DO i := 0 ELSIF i DO END; \
             REPEAT UNTIL 1 END M.",
        );
        assert_eq!(errors(&output), vec!["Boolean expression expected."; 3]);
    }

    #[test]
    fn test_exit_and_loop() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN LOOP i := 1 END; EXIT END M.");
        assert_eq!(errors(&output), vec!["EXIT statement outside of loop."]);
        assert_eq!(warnings(&output), vec!["LOOP statement without EXIT found."]);
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN WHILE i > 0 DO EXIT END END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
    }

    #[test]
    fn test_for_loop() {
        let output = analyze(
            "MODULE M; CONST k = 3; VAR i: INTEGER; r: REAL; \
             BEGIN FOR i := 0 TO 9 BY 2 DO END; FOR r := 0 TO 1 DO END; FOR k := 0 TO 1 DO END; \
             FOR i := 0 TO 9 BY 0 DO END; FOR i := 0 TO 9 BY i DO END END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "type mismatch: integer type expected, found REAL.",
                "variable, parameter, type, or function call expected.",
                "variable expected.",
                "step value cannot be zero.",
                "constant expression expected.",
            ]
        );
        let module = output.module.unwrap();
        let StatementKind::For { step, .. } = &module.block.body[1].kind else {
            panic!("for-loop expected");
        };
        assert_eq!(step.as_literal(), Some(&Literal::Integer(1)));
    }

    #[test]
    fn test_return_checks() {
        let output = analyze(
            "MODULE M; PROCEDURE P; BEGIN RETURN 1 END P; \
             PROCEDURE F(): INTEGER; BEGIN RETURN END F; BEGIN RETURN 2 END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "procedure cannot return a value.",
                "function must return value.",
                "module cannot return a value.",
            ]
        );
    }

    #[test]
    fn test_procedure_call_statements() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; PROCEDURE P; END P; PROCEDURE F(): INTEGER; BEGIN RETURN 1 END F; \
             BEGIN P; P(); F(); F; i; q END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "function procedure call must be followed by parameter list.",
                "procedure call expected.",
                "undefined identifier: q.",
            ]
        );
        assert_eq!(warnings(&output), vec!["discarded expression value."]);
        let module = output.module.unwrap();
        let StatementKind::Call(call) = &module.block.body[0].kind else {
            panic!("call expected");
        };
        let designator = call.as_designator().unwrap();
        assert!(matches!(designator.selectors.as_slice(), [selector] if matches!(selector.kind, SelectorKind::Call(_))));
    }
}
