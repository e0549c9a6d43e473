//! Expression hooks: literals, designators, operators and sets

use super::fold::{Folded, SET_MAX};
use super::Analyzer;
use crate::ast::{BinaryOp, Designator, Expr, ExprKind, Literal, QualIdent, Selector, UnaryOp};
use crate::common::Span;
use crate::types::TypeId;

/// Operand classification used by the operator typing rules.
#[derive(Debug, Clone, Copy, Default)]
struct Operand {
    literal: bool,
    boolean: bool,
    numeric: bool,
    entire: bool,
    character: bool,
    string: bool,
    set: bool,
    pointer: bool,
    procedure: bool,
    nil: bool,
    array: Option<CharArray>,
}

#[derive(Debug, Clone, Copy)]
struct CharArray {
    dimensions: usize,
    chars: bool,
    length: u32,
}

impl Analyzer<'_> {
    // ========================================================================
    // Literals
    // ========================================================================

    pub fn on_boolean_literal(&self, span: Span, value: bool) -> Expr {
        Expr::literal(Literal::Boolean(value), TypeId::BOOLEAN, span)
    }

    pub fn on_integer_literal(&self, span: Span, value: i64, ty: TypeId) -> Expr {
        Expr::literal(Literal::Integer(value), ty, span)
    }

    pub fn on_real_literal(&self, span: Span, value: f64, ty: TypeId) -> Expr {
        Expr::literal(Literal::Real(value), ty, span)
    }

    pub fn on_char_literal(&self, span: Span, value: u8) -> Expr {
        Expr::literal(Literal::Char(value), TypeId::CHAR, span)
    }

    pub fn on_string_literal(&self, span: Span, value: String) -> Expr {
        Expr::literal(Literal::String(value), TypeId::STRING, span)
    }

    pub fn on_nil_literal(&self, span: Span) -> Expr {
        Expr::literal(Literal::Nil, TypeId::NIL, span)
    }

    // ========================================================================
    // Designators
    // ========================================================================

    pub fn on_qualified_expression(&mut self, span: Span, ident: QualIdent, selectors: Vec<Selector>) -> Expr {
        let Some(decl) = self.symbols.lookup(&ident) else {
            self.logger.error(ident.span, format!("undefined identifier: {}.", ident));
            let designator = Designator { ident, decl: None, selectors };
            return Expr::designator(designator, TypeId::NO_TYPE, span);
        };
        let symbol = self.arena.decl(decl);
        let (decl_ty, builtin) = (symbol.ty, symbol.builtin());
        let designator = |ident, selectors| Designator { ident, decl: Some(decl), selectors };

        if symbol.is_variable() || symbol.is_parameter() {
            let (selectors, ty) = self.on_selectors(decl, decl_ty, selectors);
            return Expr::designator(designator(ident, selectors), ty, span);
        }
        if symbol.is_type() {
            if let Some(first) = selectors.first() {
                self.logger.error(first.span, "unexpected selector.");
            }
            return Expr::designator(designator(ident, selectors), TypeId::TYPE, span);
        }
        if symbol.is_procedure() {
            let (selectors, ty) = self.on_selectors(decl, decl_ty, selectors);
            let expr = Expr::designator(designator(ident, selectors), ty, span);
            if self.arena.ty(ty).is_procedure() {
                if builtin.is_some() {
                    self.logger.error(span, "predefined procedures cannot be referenced.");
                }
                return expr;
            }
            if expr.as_designator().is_some_and(Designator::is_call) {
                return expr;
            }
            self.logger.error(expr.span, "variable, parameter, type, or function call expected.");
            return Expr { ty: TypeId::NO_TYPE, ..expr };
        }
        self.logger.error(ident.span, "variable, parameter, type, or function call expected.");
        Expr::designator(designator(ident, selectors), TypeId::NO_TYPE, span)
    }

    /// Reference to a named constant, replaced by its value.
    pub fn on_qualified_constant(&mut self, span: Span, ident: &QualIdent, selectors: &[Selector]) -> Option<Expr> {
        let Some(decl) = self.symbols.lookup(ident) else {
            self.logger.error(ident.span, format!("undefined identifier: {}.", ident));
            return None;
        };
        let symbol = self.arena.decl(decl);
        if symbol.is_constant() {
            if let Some(first) = selectors.first() {
                self.logger.warning(first.span, "ignoring unexpected selector(s).");
            }
            if let Some(value) = symbol.constant_value() {
                return Some(Expr::literal(value.clone(), symbol.ty, span));
            }
        }
        self.logger.error(ident.span, "constant expected.");
        None
    }

    // ========================================================================
    // Operators
    // ========================================================================

    pub fn on_unary(&mut self, span: Span, op: UnaryOp, operand: Option<Expr>) -> Option<Expr> {
        let Some(operand) = operand else {
            self.logger.error(span, "undefined expression in unary expression.");
            return None;
        };
        let ty = self.arena.ty(operand.ty);
        let (valid, expected) = match op {
            UnaryOp::Not => (ty.is_boolean(), "a boolean"),
            UnaryOp::Plus => (ty.is_numeric(), "a numeric"),
            UnaryOp::Neg => (ty.is_numeric() || ty.is_set(), "a numeric or set"),
        };
        if !valid && operand.ty != TypeId::NO_TYPE {
            self.logger.error(operand.span, format!("operator {} requires {} argument.", op, expected));
            return Some(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, TypeId::NO_TYPE, span));
        }
        let folded = self.folder().fold_unary(op, &operand);
        if let Some((value, ty)) = folded {
            return Some(Expr::literal(value, ty, span));
        }
        let ty = operand.ty;
        Some(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, ty, span))
    }

    pub fn on_binary(&mut self, span: Span, op: BinaryOp, lhs: Option<Expr>, rhs: Option<Expr>) -> Option<Expr> {
        let Some(mut lhs) = lhs else {
            self.logger.error(span, "undefined left-hand side in binary expression.");
            return None;
        };
        let Some(mut rhs) = rhs else {
            self.logger.error(span, "undefined right-hand side in binary expression.");
            return None;
        };
        if lhs.ty == TypeId::NO_TYPE || rhs.ty == TypeId::NO_TYPE {
            return Some(binary(op, lhs, rhs, TypeId::NO_TYPE, span));
        }
        if op == BinaryOp::Is {
            self.type_test(span, &lhs, &rhs);
            return Some(binary(op, lhs, rhs, TypeId::BOOLEAN, span));
        }

        let (l, r) = (self.operand(&lhs), self.operand(&rhs));
        let mut common = None;
        let result = match op {
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Leq | BinaryOp::Gt | BinaryOp::Geq => {
                self.relation(span, op, (&lhs, l), (&rhs, r), &mut common)
            }
            BinaryOp::In => {
                if !l.entire {
                    self.logger.error(lhs.span, "integer expression expected.");
                }
                if !r.set {
                    self.logger.error(rhs.span, "set expression expected.");
                }
                Some(TypeId::BOOLEAN)
            }
            BinaryOp::Plus if l.string || r.string => {
                if l.literal && r.literal {
                    common = Some(self.common_type(span, lhs.ty, rhs.ty));
                    common
                } else {
                    self.logger.error(lhs.span, "string concatenation requires constant arguments.");
                    None
                }
            }
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Times | BinaryOp::Divide => {
                if (l.numeric && r.numeric) || (l.set && r.set) {
                    let mut ty = self.common_type(span, lhs.ty, rhs.ty);
                    if op == BinaryOp::Divide && self.arena.ty(ty).is_entire() {
                        ty = TypeId::REAL;
                    }
                    common = Some(ty);
                    common
                } else {
                    self.logger.error(lhs.span, "arithmetic operation requires numeric or set arguments.");
                    None
                }
            }
            BinaryOp::Div | BinaryOp::Mod => {
                if l.entire && r.entire {
                    common = Some(self.common_type(span, lhs.ty, rhs.ty));
                    common
                } else {
                    self.logger.error(span, "integer division requires integer arguments.");
                    None
                }
            }
            BinaryOp::Or | BinaryOp::And => {
                if l.boolean && r.boolean {
                    common = Some(TypeId::BOOLEAN);
                    common
                } else {
                    self.logger.error(span, format!("operator {} requires boolean arguments.", op));
                    None
                }
            }
            BinaryOp::Is => Some(TypeId::BOOLEAN),
        };
        let Some(result) = result.filter(|ty| *ty != TypeId::NO_TYPE) else {
            return Some(binary(op, lhs, rhs, TypeId::NO_TYPE, span));
        };

        let folded = self.folder().fold_binary(span, op, &lhs, &rhs, result);
        match folded {
            Some(Folded::Literal(value, ty)) => {
                if let (true, Literal::Boolean(truth)) = (op.is_relation(), &value) {
                    let outcome = if *truth { "true." } else { "false." };
                    self.logger.warning(span, format!("condition is always {}", outcome));
                }
                return Some(match value {
                    Literal::Integer(value) if self.arena.ty(result).is_real() => {
                        Expr::literal(Literal::Real(value as f64), result, span)
                    }
                    value => Expr::literal(value, ty, span),
                });
            }
            Some(Folded::Lhs) => return Some(self.with_cast(lhs, common)),
            Some(Folded::Rhs) => return Some(self.with_cast(rhs, common)),
            Some(Folded::NegatedRhs) => {
                let operand = Box::new(self.with_cast(rhs, common));
                return Some(Expr::new(ExprKind::Unary { op: UnaryOp::Neg, operand }, result, span));
            }
            None => {}
        }
        if let Some(common) = common {
            self.cast(&mut lhs, common);
            self.cast(&mut rhs, common);
        }
        Some(binary(op, lhs, rhs, result, span))
    }

    fn with_cast(&self, mut expr: Expr, common: Option<TypeId>) -> Expr {
        if let Some(common) = common {
            self.cast(&mut expr, common);
        }
        expr
    }

    fn operand(&self, expr: &Expr) -> Operand {
        let ty = self.arena.ty(expr.ty);
        Operand {
            literal: expr.is_literal(),
            boolean: ty.is_boolean(),
            numeric: ty.is_numeric(),
            entire: ty.is_entire(),
            character: ty.is_char(),
            string: ty.is_string(),
            set: ty.is_set(),
            pointer: ty.is_pointer(),
            procedure: ty.is_procedure(),
            nil: expr.ty == TypeId::NIL,
            array: ty.as_array().map(|array| CharArray {
                dimensions: array.dimensions(),
                chars: array.member() == TypeId::CHAR,
                length: array.lengths[0],
            }),
        }
    }

    /// Result type of a relation, `None` after an error.
    fn relation(
        &mut self,
        span: Span,
        op: BinaryOp,
        (lhs, l): (&Expr, Operand),
        (rhs, r): (&Expr, Operand),
        common: &mut Option<TypeId>,
    ) -> Option<TypeId> {
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Neq);
        let textual = |operand: Operand| operand.literal && (operand.string || operand.character);
        let char_array = |operand: Operand| operand.array.filter(|array| array.dimensions == 1 && array.chars);

        let literal = match (char_array(l), char_array(r)) {
            (Some(array), None) if textual(r) => Some((array, rhs)),
            (None, Some(array)) if textual(l) => Some((array, lhs)),
            _ => None,
        };
        if let Some((array, literal)) = literal {
            if let Some(Literal::String(text)) = literal.as_literal() {
                if array.length > 0 && text.len() + 1 > array.length as usize {
                    self.logger.warning(literal.span, "string literal is longer than length of character array.");
                }
            }
            return Some(TypeId::BOOLEAN);
        }
        if textual(l) && textual(r) {
            *common = Some(self.common_type(span, lhs.ty, rhs.ty));
            return Some(TypeId::BOOLEAN);
        }
        if l.array.is_some() || r.array.is_some() {
            if char_array(l).is_some() && char_array(r).is_some() {
                return Some(TypeId::BOOLEAN);
            }
            self.logger.error(lhs.span, "comparison operator requires one-dimensional character array arguments.");
            return None;
        }
        if equality {
            if (l.pointer || l.nil) && (r.pointer || r.nil) {
                *common = Some(self.common_type(span, lhs.ty, rhs.ty));
                return Some(TypeId::BOOLEAN);
            }
            if ((l.procedure || l.nil) && (r.procedure || r.nil)) || (l.boolean && r.boolean) {
                return Some(TypeId::BOOLEAN);
            }
        }
        let ordered = matches!(op, BinaryOp::Lt | BinaryOp::Gt);
        if (l.numeric && r.numeric) || (l.character && r.character) || (!ordered && l.set && r.set) {
            *common = Some(self.common_type(span, lhs.ty, rhs.ty));
            return Some(TypeId::BOOLEAN);
        }
        self.logger.error(lhs.span, "comparison operation requires numeric arguments.");
        None
    }

    /// `v IS T`
    fn type_test(&mut self, span: Span, lhs: &Expr, rhs: &Expr) {
        let (Some(left), Some(right)) = (lhs.as_designator(), rhs.as_designator()) else {
            self.logger.error(span, "type test operator requires qualified expressions as arguments.");
            return;
        };
        if rhs.ty != TypeId::TYPE {
            self.logger.error(rhs.span, "type identifier expected.");
            return;
        }
        let Some(target) = right.decl.map(|decl| self.arena.decl(decl).ty) else {
            return;
        };
        let actual = self.arena.ty(lhs.ty);
        let var_record = actual.is_record() && left.decl.is_some_and(|decl| self.arena.decl(decl).is_var_parameter());
        if !actual.is_pointer() && !var_record {
            self.logger.error(span, "variable parameter of record type or expression of pointer type expected.");
            return;
        }
        let target_ty = self.arena.ty(target);
        if !target_ty.is_pointer() && !target_ty.is_record() {
            self.logger.error(rhs.span, "type mismatch: record type or pointer to record type expected.");
        } else if self.arena.extends(lhs.ty, target) {
            self.logger.warning(span, "type check is always true.");
        } else if !self.arena.extends(target, lhs.ty) {
            let message = format!(
                "type mismatch: {} is not an extension of {}.",
                self.arena.type_name(target),
                self.arena.type_name(lhs.ty)
            );
            self.logger.error(rhs.span, message);
        }
    }

    // ========================================================================
    // Ranges and sets
    // ========================================================================

    pub fn on_range(&mut self, span: Span, lower: Option<Expr>, upper: Option<Expr>) -> Option<Expr> {
        let Some(mut lower) = lower else {
            self.logger.error(span, "undefined lower bound in range expression.");
            return None;
        };
        let Some(mut upper) = upper else {
            self.logger.error(span, "undefined upper bound in range expression.");
            return None;
        };
        let (lo, up) = (self.arena.ty(lower.ty), self.arena.ty(upper.ty));
        let (lo_int, lo_char, up_int, up_char) = (lo.is_entire(), lo.is_char(), up.is_entire(), up.is_char());
        if !lo_int && !lo_char {
            self.logger.error(lower.span, "range expression requires integer or character values.");
        }
        if !up_int && !up_char {
            self.logger.error(upper.span, "range expression requires integer or character values.");
        }
        if (lo_int && up_char) || (lo_char && up_int) {
            self.logger.error(span, "type of lower and upper bound in range expression do not match.");
        }
        let (lo_size, up_size) = (self.arena.size_of(lower.ty), self.arena.size_of(upper.ty));
        let mut common = lower.ty;
        if lo_size > up_size {
            self.cast(&mut upper, lower.ty);
        } else if lo_size < up_size {
            self.cast(&mut lower, upper.ty);
            common = upper.ty;
        }
        let range = ExprKind::Range { lower: Box::new(lower), upper: Box::new(upper) };
        Some(Expr::new(range, common, span))
    }

    /// Set constructor. Constant sets fold into a set literal.
    pub fn on_set(&mut self, span: Span, elements: Vec<Expr>) -> Expr {
        let mut last = -1;
        let mut valid = true;
        for element in &elements {
            match &element.kind {
                ExprKind::Range { lower, upper } => {
                    if !self.arena.ty(lower.ty).is_entire() || !self.arena.ty(upper.ty).is_entire() {
                        self.logger.error(element.span, "integer expression expected.");
                        valid = false;
                        continue;
                    }
                    let low = lower.integer_value().map(|value| self.set_element(lower.span, value, &mut valid));
                    if let Some(low) = low {
                        if low <= last {
                            self.logger.error(lower.span, "element must be larger than previous element.");
                            valid = false;
                        }
                        last = low;
                    }
                    let high = upper.integer_value().map(|value| self.set_element(upper.span, value, &mut valid));
                    if let Some(high) = high {
                        last = high;
                    }
                    if let (Some(low), Some(high)) = (low, high) {
                        if low >= high {
                            self.logger.error(upper.span, "upper bound must be greater than lower bound.");
                            valid = false;
                        }
                    }
                }
                _ if !self.arena.ty(element.ty).is_entire() => {
                    self.logger.error(element.span, "integer expression expected.");
                    valid = false;
                }
                _ => {
                    if let Some(value) = element.integer_value() {
                        let value = self.set_element(element.span, value, &mut valid);
                        if value <= last {
                            self.logger.error(element.span, "element must be larger than previous element.");
                            valid = false;
                        }
                        last = value;
                    }
                }
            }
        }
        let expr = Expr::new(ExprKind::Set(elements), TypeId::SET, span);
        if valid && expr.is_constant() {
            let folded = self.folder().fold(&expr);
            if let Some(value) = folded {
                return Expr::literal(value, TypeId::SET, span);
            }
        }
        expr
    }

    fn set_element(&mut self, span: Span, value: i64, valid: &mut bool) -> i64 {
        let clamped = self.assert_in_bounds(span, value, 0, SET_MAX);
        if clamped != value {
            *valid = false;
        }
        clamped
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeId, span: Span) -> Expr {
    Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty, span)
}

#[cfg(test)]
mod tests {
    use crate::ast::{DeclKind, ExprKind, Literal, StatementKind, UnaryOp};
    use crate::sema::tests::{analyze, errors, warnings};
    use crate::types::TypeId;
    use pretty_assertions::assert_eq;

    fn constant(source: &str, index: usize) -> Option<Literal> {
        let output = analyze(source);
        let module = output.module.unwrap();
        match &output.arena.decl(module.block.constants[index]).kind {
            DeclKind::Constant(value) => value.clone(),
            _ => None,
        }
    }

    #[test]
    fn test_euclidean_division_in_constants() {
        let source = "MODULE M; CONST a = (-7) DIV 2; b = (-7) MOD 2; c = -7 DIV 2; d = (2 + 3) * 4; END M.";
        assert_eq!(constant(source, 0), Some(Literal::Integer(-4)));
        assert_eq!(constant(source, 1), Some(Literal::Integer(1)));
        assert_eq!(constant(source, 2), Some(Literal::Integer(-3)));
        assert_eq!(constant(source, 3), Some(Literal::Integer(20)));
    }

    #[test]
    fn test_division_errors() {
        let output = analyze("MODULE M; CONST a = 7 DIV (-2); VAR x: INTEGER; BEGIN x := x DIV 0 END M.");
        assert_eq!(errors(&output), vec!["divisor cannot be negative.", "undefined constant.", "division by zero."]);
    }

    #[test]
    fn test_set_constants() {
        let source = "MODULE M; CONST s = {0, 2..4}; t = s + {7}; END M.";
        assert_eq!(constant(source, 0), Some(Literal::Set(0b11101)));
        assert_eq!(constant(source, 1), Some(Literal::Set(0b1001_1101)));
        let output = analyze("MODULE M; CONST s = {3, 1}; t = {32}; u = {4..2}; END M.");
        assert_eq!(
            errors(&output),
            vec![
                "element must be larger than previous element.",
                "undefined constant.",
                "value 32 out of bounds [0..31].",
                "undefined constant.",
                "upper bound must be greater than lower bound.",
                "undefined constant.",
            ]
        );
    }

    #[test]
    fn test_string_concatenation() {
        let source = "MODULE M; CONST s = \"ab\" + \"cd\"; END M.";
        assert_eq!(constant(source, 0), Some(Literal::String("abcd".to_string())));
        let output = analyze("MODULE M; VAR a: ARRAY 8 OF CHAR; b: BOOLEAN; BEGIN b := a + \"x\" = \"y\" END M.");
        assert_eq!(errors(&output).len(), 1);
    }

    #[test]
    fn test_constant_condition_warning() {
        let output = analyze("MODULE M; VAR b: BOOLEAN; BEGIN b := 1 < 2; b := 3 = 4 END M.");
        assert_eq!(warnings(&output), vec!["condition is always true.", "condition is always false."]);
    }

    #[test]
    fn test_operand_typing() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; r: REAL; b: BOOLEAN; s: SET; \
             BEGIN r := i / 2; b := i OR b; i := r DIV 2; b := r IN s; b := {1} < s END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "operator OR requires boolean arguments.",
                "integer division requires integer arguments.",
                "integer expression expected.",
                "comparison operation requires numeric arguments.",
            ]
        );
    }

    #[test]
    fn test_implicit_casts() {
        let output = analyze("MODULE M; VAR s: SHORTINT; l: LONGINT; BEGIN l := s + l END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.unwrap();
        let StatementKind::Assignment { value, .. } = &module.block.body[0].kind else {
            panic!("assignment expected");
        };
        let ExprKind::Binary { lhs, rhs, .. } = &value.kind else {
            panic!("binary expected");
        };
        assert_eq!(lhs.cast, Some(TypeId::LONGINT));
        assert_eq!(rhs.cast, None);
        assert_eq!(value.ty, TypeId::LONGINT);
    }

    #[test]
    fn test_identity_shortcut_keeps_operand() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN i := i * 1; i := 0 - i END M.");
        let module = output.module.unwrap();
        let StatementKind::Assignment { value, .. } = &module.block.body[0].kind else {
            panic!("assignment expected");
        };
        assert!(matches!(value.kind, ExprKind::Designator(_)));
        let StatementKind::Assignment { value, .. } = &module.block.body[1].kind else {
            panic!("assignment expected");
        };
        assert!(matches!(value.kind, ExprKind::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn test_undefined_identifier() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN i := j + 1 END M.");
        assert_eq!(errors(&output), vec!["undefined identifier: j."]);
    }

    #[test]
    fn test_negation_overflow_is_reported() {
        let output = analyze("MODULE M; VAR l: LONGINT; BEGIN l := -(-9223372036854775807 - 1) END M.");
        assert_eq!(errors(&output), vec!["integer overflow in constant expression."]);
    }
}
