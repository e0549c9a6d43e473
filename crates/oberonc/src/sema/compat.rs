//! Type compatibility, common operand types and implicit casts

use super::Analyzer;
use crate::ast::{DeclKind, Expr, ExprKind, Literal};
use crate::common::Span;
use crate::types::{TypeId, TypeKind, VirtualKind};

impl Analyzer<'_> {
    /// Check that a value of type `actual` can be used where `expected` is
    /// required. Logs one error and returns false on mismatch.
    pub fn is_compatible(&mut self, span: Span, expected: TypeId, actual: TypeId) -> bool {
        self.assert_compatible(span, expected, actual, false)
    }

    fn assert_compatible(&mut self, span: Span, expected: TypeId, actual: TypeId, is_ptr: bool) -> bool {
        if expected == actual {
            return true;
        }
        let (exp, act) = (self.arena.ty(expected), self.arena.ty(actual));
        if exp.is_virtual_kind(VirtualKind::Any) || self.arena.same_identifier(expected, actual) {
            return true;
        }

        if exp.is_virtual_numeric() {
            let accepted = match exp.kind {
                TypeKind::Virtual(VirtualKind::Entire) => act.is_entire(),
                TypeKind::Virtual(VirtualKind::Floating) => act.is_real(),
                _ => act.is_numeric(),
            };
            if accepted {
                return true;
            }
        } else if exp.is_numeric() && act.is_numeric() {
            if (exp.is_integer() && act.is_integer()) || (exp.is_real() && act.is_real()) {
                if self.arena.size_of(expected) >= self.arena.size_of(actual) {
                    return true;
                }
                let message = format!(
                    "type mismatch: converting from {} to {} may lose data.",
                    self.arena.type_name(actual),
                    self.arena.type_name(expected)
                );
                self.logger.error(span, message);
                return false;
            }
            if exp.is_real() && act.is_entire() {
                return true;
            }
            if (exp.is_byte() && act.is_integer()) || (exp.is_integer() && act.is_byte()) {
                return true;
            }
        } else if let Some(exp_array) = exp.as_array() {
            let exp_array = exp_array.clone();
            if let Some(act_array) = act.as_array() {
                let act_array = act_array.clone();
                if exp_array.member() == TypeId::ANY {
                    return true;
                }
                if exp_array.is_open() {
                    return self.assert_compatible(span, exp_array.types[0], act_array.types[0], false);
                }
                if exp_array.dimensions() != act_array.dimensions() {
                    let message = format!(
                        "type mismatch: incompatible array dimensions, expected {}, found {}.",
                        exp_array.dimensions(),
                        act_array.dimensions()
                    );
                    self.logger.error(span, message);
                    return false;
                }
                for (exp_len, act_len) in exp_array.lengths.iter().zip(&act_array.lengths) {
                    if act_len > exp_len {
                        let message =
                            format!("type mismatch: incompatible array lengths found {} > {}.", act_len, exp_len);
                        self.logger.error(span, message);
                        return false;
                    }
                }
                return self.assert_compatible(span, exp_array.member(), act_array.member(), false);
            }
            let member = exp_array.member();
            if (act.is_string() || act.is_char()) && (member == TypeId::CHAR || member == TypeId::ANY) {
                if exp_array.dimensions() == 1 {
                    return true;
                }
                self.logger.error(span, "type mismatch: cannot assign string to multi-dimensional array.");
                return false;
            }
        } else if exp.is_record() && act.is_record() {
            if self.arena.extends(actual, expected) {
                return true;
            }
        } else if let Some(exp_ptr) = exp.as_pointer() {
            if actual == TypeId::NIL || self.arena.extends(actual, expected) {
                return true;
            }
            if let (Some(exp_base), Some(act_base)) = (exp_ptr.base, act.as_pointer().and_then(|p| p.base)) {
                return self.assert_compatible(span, exp_base, act_base, true);
            }
        } else if exp.is_procedure() {
            if actual == TypeId::NIL {
                return true;
            }
            if act.is_procedure() {
                return self.assert_procedure_compatible(span, expected, actual);
            }
        }

        let message = format!(
            "type mismatch: expected {}, found {}.",
            self.arena.format_type(expected, is_ptr),
            self.arena.format_type(actual, is_ptr)
        );
        self.logger.error(span, message);
        false
    }

    fn assert_procedure_compatible(&mut self, span: Span, expected: TypeId, actual: TypeId) -> bool {
        let (Some(exp), Some(act)) = (
            self.arena.ty(expected).as_procedure().cloned(),
            self.arena.ty(actual).as_procedure().cloned(),
        ) else {
            return false;
        };
        if exp.variadic || act.variadic {
            self.logger.error(span, "procedure types with variadic arguments cannot be used here.");
            return false;
        }
        let same_return = match (exp.ret, act.ret) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) => self.types_equal(lhs, rhs),
            _ => false,
        };
        if !same_return {
            self.logger.error(span, "type mismatch: procedure types have different return types.");
            return false;
        }
        if exp.params.len() != act.params.len() {
            self.logger.error(span, "type mismatch: procedure types have different number of parameters.");
            return false;
        }
        for (lhs, rhs) in exp.params.iter().zip(&act.params) {
            let (lhs, rhs) = (self.arena.decl(*lhs), self.arena.decl(*rhs));
            let matches = lhs.is_var_parameter() == rhs.is_var_parameter()
                && match (self.arena.ty(lhs.ty).as_array(), self.arena.ty(rhs.ty).as_array()) {
                    (Some(l), Some(r)) => {
                        l.is_open() && r.is_open() && l.dimensions() == r.dimensions()
                            && self.types_equal(l.member(), r.member())
                    }
                    _ => self.types_equal(lhs.ty, rhs.ty),
                };
            if !matches {
                self.logger.error(span, "type mismatch: procedure types have different parameters.");
                return false;
            }
        }
        true
    }

    pub(crate) fn types_equal(&self, lhs: TypeId, rhs: TypeId) -> bool {
        lhs == rhs || self.arena.same_identifier(lhs, rhs)
    }

    /// Type both operands of a binary operator are converted to.
    pub(crate) fn common_type(&mut self, span: Span, lhs: TypeId, rhs: TypeId) -> TypeId {
        if self.types_equal(lhs, rhs) {
            return lhs;
        }
        let (l, r) = (self.arena.ty(lhs), self.arena.ty(rhs));
        if l.is_numeric() && r.is_numeric() {
            if l.is_real() != r.is_real() {
                return if l.is_real() { lhs } else { rhs };
            }
            return if self.arena.size_of(rhs) > self.arena.size_of(lhs) { rhs } else { lhs };
        }
        if (l.is_char() && r.is_string()) || (l.is_string() && r.is_char()) {
            return TypeId::STRING;
        }
        if lhs == TypeId::NIL {
            return rhs;
        }
        if rhs == TypeId::NIL {
            return lhs;
        }
        if (l.is_pointer() && r.is_pointer()) || (l.is_record() && r.is_record()) {
            if self.arena.extends(rhs, lhs) {
                return lhs;
            }
            if self.arena.extends(lhs, rhs) {
                return rhs;
            }
        }
        let message = format!(
            "incompatible or illegal operand types ({}, {}).",
            self.arena.type_name(lhs),
            self.arena.type_name(rhs)
        );
        self.logger.error(span, message);
        TypeId::NO_TYPE
    }

    /// Virtual placeholders and structures built on them never become
    /// cast targets.
    pub(crate) fn is_generic(&self, ty: TypeId) -> bool {
        let ty = self.arena.ty(ty);
        match &ty.kind {
            TypeKind::Virtual(_) => true,
            TypeKind::Pointer(pointer) => pointer.base.is_some_and(|base| self.arena.ty(base).is_virtual()),
            TypeKind::Array(array) => self.arena.ty(array.member()).is_virtual(),
            _ => false,
        }
    }

    /// Annotate an implicit conversion to `expected`.
    pub(crate) fn cast(&self, expr: &mut Expr, expected: TypeId) {
        if expr.ty != expected && !self.is_generic(expected) && !self.types_equal(expr.ty, expected) {
            expr.cast = Some(expected);
        }
    }

    /// Coerce a literal to the type it is assigned or passed to.
    pub(crate) fn cast_literal(&mut self, expr: &mut Expr, expected: TypeId) {
        let ExprKind::Literal(value) = &expr.kind else {
            return;
        };
        if self.is_generic(expected) || expr.ty == expected {
            return;
        }
        let target = self.arena.ty(expected);
        if let Some(array) = target.as_array() {
            let length = array.lengths[0] as usize;
            match value {
                Literal::Char(ch) => {
                    let text = char::from(*ch).to_string();
                    expr.kind = ExprKind::Literal(Literal::String(text));
                    expr.ty = TypeId::STRING;
                }
                Literal::String(text) if length > 0 && text.len() >= length => {
                    let truncated: String = text.chars().take(length - 1).collect();
                    expr.kind = ExprKind::Literal(Literal::String(truncated));
                    self.logger.warning(expr.span, "string literal will be truncated to length of character array.");
                }
                _ => {}
            }
            return;
        }
        let accepted = match value {
            Literal::Integer(int) if target.is_real() => {
                expr.kind = ExprKind::Literal(Literal::Real(*int as f64));
                expr.ty = expected;
                return;
            }
            Literal::Integer(_) => target.is_entire(),
            Literal::Real(_) => target.is_real(),
            Literal::Nil => target.is_pointer() || target.is_procedure(),
            Literal::Boolean(_) => target.is_boolean(),
            Literal::Char(_) => target.is_char() || target.is_string(),
            Literal::String(_) => target.is_string(),
            Literal::Set(_) => target.is_set(),
        };
        if !accepted {
            let message = format!(
                "unable to cast {} literal to type {}.",
                value.kind_name(),
                self.arena.type_name(expected)
            );
            self.logger.warning(expr.span, message);
        }
        self.cast(expr, expected);
    }

    /// Check that an expression denotes a writable location. The error
    /// names what the expression is instead.
    pub(crate) fn assert_assignable(&self, expr: &Expr) -> Result<(), &'static str> {
        if expr.is_literal() {
            return Err("a constant value");
        }
        let Some(designator) = expr.as_designator() else {
            return Err("an expression");
        };
        let Some(decl) = designator.decl.map(|id| self.arena.decl(id)) else {
            return Ok(());
        };
        match decl.kind {
            DeclKind::Parameter { is_var, .. } => {
                if !is_var && self.arena.ty(decl.ty).is_structured() {
                    return Err("a non-variable structured parameter");
                }
                Ok(())
            }
            DeclKind::Constant(_) => Err("a constant"),
            DeclKind::Variable { .. } if decl.external => Err("an external variable"),
            DeclKind::Variable { .. } => Ok(()),
            _ if designator.selectors.is_empty() => Err("an expression"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::tests::analyzer;
    use crate::types::{PointerType, RecordType};
    use pretty_assertions::assert_eq;

    const NUMERIC: [TypeId; 6] = [
        TypeId::BYTE,
        TypeId::SHORTINT,
        TypeId::INTEGER,
        TypeId::LONGINT,
        TypeId::REAL,
        TypeId::LONGREAL,
    ];

    #[test]
    fn test_widening_only() {
        let mut sema = analyzer();
        for expected in NUMERIC {
            for actual in NUMERIC {
                let (exp, act) = (sema.arena.ty(expected).clone(), sema.arena.ty(actual).clone());
                let widening = if exp.is_real() && act.is_real() || exp.is_integer() && act.is_integer() {
                    sema.arena.size_of(expected) >= sema.arena.size_of(actual)
                } else {
                    expected == actual
                        || exp.is_real() && act.is_entire()
                        || exp.is_byte() && act.is_integer()
                        || exp.is_integer() && act.is_byte()
                };
                assert_eq!(
                    sema.is_compatible(Span::default(), expected, actual),
                    widening,
                    "{} := {}",
                    exp.basic().unwrap(),
                    act.basic().unwrap()
                );
            }
        }
        assert!(sema
            .logger
            .errors()
            .any(|d| d.message == "type mismatch: converting from LONGINT to INTEGER may lose data."));
    }

    #[test]
    fn test_pointer_compatibility() {
        let mut sema = analyzer();
        let base = sema.arena.add_type(
            TypeKind::Record(RecordType { fields: vec![], base: None, level: 0 }),
            Span::default(),
        );
        let derived = sema.arena.add_type(
            TypeKind::Record(RecordType { fields: vec![], base: Some(base), level: 1 }),
            Span::default(),
        );
        let pbase = sema.arena.add_type(TypeKind::Pointer(PointerType { base: Some(base) }), Span::default());
        let pderived =
            sema.arena.add_type(TypeKind::Pointer(PointerType { base: Some(derived) }), Span::default());
        assert!(sema.is_compatible(Span::default(), pbase, pderived));
        assert!(sema.is_compatible(Span::default(), pbase, TypeId::NIL));
        assert!(!sema.is_compatible(Span::default(), pderived, pbase));
        assert_eq!(
            sema.logger.errors().last().unwrap().message,
            "type mismatch: expected POINTER TO RECORD, found POINTER TO RECORD."
        );
    }

    #[test]
    fn test_common_type() {
        let mut sema = analyzer();
        let span = Span::default();
        assert_eq!(sema.common_type(span, TypeId::SHORTINT, TypeId::LONGINT), TypeId::LONGINT);
        assert_eq!(sema.common_type(span, TypeId::LONGINT, TypeId::REAL), TypeId::REAL);
        assert_eq!(sema.common_type(span, TypeId::CHAR, TypeId::STRING), TypeId::STRING);
        assert_eq!(sema.common_type(span, TypeId::BOOLEAN, TypeId::INTEGER), TypeId::NO_TYPE);
        assert_eq!(sema.logger.error_count(), 1);
    }

    #[test]
    fn test_cast_literal_integer_to_real() {
        let mut sema = analyzer();
        let mut expr = Expr::literal(Literal::Integer(3), TypeId::SHORTINT, Span::default());
        sema.cast_literal(&mut expr, TypeId::LONGREAL);
        assert_eq!(expr.as_literal(), Some(&Literal::Real(3.0)));
        assert_eq!(expr.ty, TypeId::LONGREAL);
        let mut expr = Expr::literal(Literal::Integer(3), TypeId::SHORTINT, Span::default());
        sema.cast_literal(&mut expr, TypeId::INTEGER);
        assert_eq!(expr.cast, Some(TypeId::INTEGER));
    }
}
