//! Constant folding
//!
//! Evaluates operators over literal operands. Integer arithmetic is
//! 64-bit, DIV and MOD are floored, sets are 32-bit masks.

use crate::ast::{Arena, BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::common::{Logger, Span};
use crate::types::TypeId;

/// Largest element of a set.
pub const SET_MAX: i64 = 31;

/// Narrowest integer type that holds `value`.
pub fn int_type(value: i64) -> TypeId {
    if i16::try_from(value).is_ok() {
        TypeId::SHORTINT
    } else if i32::try_from(value).is_ok() {
        TypeId::INTEGER
    } else {
        TypeId::LONGINT
    }
}

/// Replacement for a binary expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Literal(Literal, TypeId),
    /// The expression reduces to its left operand.
    Lhs,
    /// The expression reduces to its right operand.
    Rhs,
    /// `0 - x` reduces to `-x`.
    NegatedRhs,
}

pub struct ConstantFolder<'a> {
    arena: &'a Arena,
    logger: &'a mut Logger,
}

impl<'a> ConstantFolder<'a> {
    pub fn new(arena: &'a Arena, logger: &'a mut Logger) -> Self {
        Self { arena, logger }
    }

    /// Value of a constant expression, `None` if an operand is not constant.
    pub fn fold(&mut self, expr: &Expr) -> Option<Literal> {
        self.fold_typed(expr).map(|(value, _)| value)
    }

    fn fold_typed(&mut self, expr: &Expr) -> Option<(Literal, TypeId)> {
        match &expr.kind {
            ExprKind::Literal(value) => Some((value.clone(), expr.ty)),
            ExprKind::Unary { op, operand } => {
                let (value, ty) = self.fold_typed(operand)?;
                self.eval_unary(expr.span, *op, &value, ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, _) = self.fold_typed(lhs)?;
                let (rhs, _) = self.fold_typed(rhs)?;
                self.eval_binary(expr.span, *op, &lhs, &rhs, expr.ty)
            }
            ExprKind::Set(elements) => {
                let mut bits = 0u32;
                for element in elements {
                    let (lower, upper) = match &element.kind {
                        ExprKind::Range { lower, upper } => (self.fold(lower)?, self.fold(upper)?),
                        _ => {
                            let value = self.fold(element)?;
                            (value.clone(), value)
                        }
                    };
                    let (Literal::Integer(lower), Literal::Integer(upper)) = (lower, upper) else {
                        return None;
                    };
                    if !self.assert_in_bounds(element.span, lower) || !self.assert_in_bounds(element.span, upper) {
                        return None;
                    }
                    if lower > upper {
                        self.logger.error(element.span, "upper bound must be greater than lower bound.");
                        return None;
                    }
                    for bit in lower..=upper {
                        bits |= 1u32 << bit;
                    }
                }
                Some((Literal::Set(bits), TypeId::SET))
            }
            ExprKind::Designator(_) | ExprKind::Range { .. } => None,
        }
    }

    /// Fold a unary operator applied to a constant operand.
    pub fn fold_unary(&mut self, op: UnaryOp, operand: &Expr) -> Option<(Literal, TypeId)> {
        let value = operand.as_literal()?;
        self.eval_unary(operand.span, op, value, operand.ty)
    }

    fn eval_unary(&mut self, span: Span, op: UnaryOp, value: &Literal, ty: TypeId) -> Option<(Literal, TypeId)> {
        match (op, value) {
            (UnaryOp::Not, Literal::Boolean(value)) => Some((Literal::Boolean(!value), TypeId::BOOLEAN)),
            (UnaryOp::Plus, Literal::Integer(value)) => Some((Literal::Integer(*value), ty)),
            (UnaryOp::Neg, Literal::Integer(value)) => {
                let Some(negated) = value.checked_neg() else {
                    self.logger.error(span, "integer overflow in constant expression.");
                    return None;
                };
                Some((Literal::Integer(negated), int_type(negated)))
            }
            (UnaryOp::Plus, Literal::Real(value)) => Some((Literal::Real(*value), ty)),
            (UnaryOp::Neg, Literal::Real(value)) => Some((Literal::Real(-value), ty)),
            (UnaryOp::Neg, Literal::Set(bits)) => Some((Literal::Set(!bits), TypeId::SET)),
            _ => None,
        }
    }

    /// Fold a binary operator. `common` is the type the operands were
    /// unified to, or BOOLEAN for relations.
    ///
    /// Besides evaluating literal pairs this applies identity and
    /// absorbing elements when only one operand is constant, and rejects
    /// invalid divisors regardless of the dividend.
    pub fn fold_binary(
        &mut self,
        span: Span,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        common: TypeId,
    ) -> Option<Folded> {
        let (left, right) = (lhs.as_literal(), rhs.as_literal());
        match (op, right) {
            (BinaryOp::Div | BinaryOp::Mod, Some(Literal::Integer(divisor))) => {
                if *divisor == 0 {
                    self.logger.error(rhs.span, "division by zero.");
                    return None;
                }
                if *divisor < 0 {
                    self.logger.error(rhs.span, "divisor cannot be negative.");
                    return None;
                }
                if *divisor == 1 && op == BinaryOp::Div && left.is_none() {
                    return Some(Folded::Lhs);
                }
            }
            (BinaryOp::Divide, Some(Literal::Integer(0))) => {
                self.logger.error(rhs.span, "division by zero.");
                return None;
            }
            (BinaryOp::Divide, Some(Literal::Real(divisor))) if *divisor == 0.0 => {
                self.logger.error(rhs.span, "division by zero.");
                return None;
            }
            (BinaryOp::Divide, Some(Literal::Integer(1))) if left.is_none() => return Some(Folded::Lhs),
            _ => {}
        }

        if let (Some(left), Some(right)) = (left, right) {
            return self
                .eval_binary(span, op, left, right, common)
                .map(|(value, ty)| Folded::Literal(value, ty));
        }

        let is_int = |value: Option<&Literal>, expected: i64| matches!(value, Some(Literal::Integer(v)) if *v == expected);
        let is_bool = |value: Option<&Literal>, expected: bool| matches!(value, Some(Literal::Boolean(v)) if *v == expected);
        match op {
            BinaryOp::Plus if is_int(left, 0) => Some(Folded::Rhs),
            BinaryOp::Plus | BinaryOp::Minus if is_int(right, 0) => Some(Folded::Lhs),
            BinaryOp::Minus if is_int(left, 0) => Some(Folded::NegatedRhs),
            BinaryOp::Times if is_int(left, 0) || is_int(right, 0) => {
                Some(Folded::Literal(Literal::Integer(0), TypeId::SHORTINT))
            }
            BinaryOp::Times if is_int(left, 1) => Some(Folded::Rhs),
            BinaryOp::Times if is_int(right, 1) => Some(Folded::Lhs),
            BinaryOp::And if is_bool(left, true) => Some(Folded::Rhs),
            BinaryOp::And if is_bool(right, true) => Some(Folded::Lhs),
            BinaryOp::Or if is_bool(left, false) => Some(Folded::Rhs),
            BinaryOp::Or if is_bool(right, false) => Some(Folded::Lhs),
            _ => None,
        }
    }

    fn eval_binary(
        &mut self,
        span: Span,
        op: BinaryOp,
        lhs: &Literal,
        rhs: &Literal,
        common: TypeId,
    ) -> Option<(Literal, TypeId)> {
        use Literal::{Boolean, Char, Integer, Nil, Real, Set};
        let boolean = |value: bool| Some((Boolean(value), TypeId::BOOLEAN));
        match (lhs, rhs) {
            (Boolean(l), Boolean(r)) => match op {
                BinaryOp::And => boolean(*l && *r),
                BinaryOp::Or => boolean(*l || *r),
                BinaryOp::Eq => boolean(l == r),
                BinaryOp::Neq => boolean(l != r),
                _ => None,
            },
            (Integer(l), Integer(r)) => self.eval_integer(span, op, *l, *r, common),
            (Integer(_) | Real(_), Integer(_) | Real(_)) => {
                let (l, r) = (real_value(lhs)?, real_value(rhs)?);
                let real = |value: f64| Some((Real(value), common));
                match op {
                    BinaryOp::Plus => real(l + r),
                    BinaryOp::Minus => real(l - r),
                    BinaryOp::Times => real(l * r),
                    BinaryOp::Divide => real(l / r),
                    _ => compare(op, &l, &r).and_then(boolean),
                }
            }
            (Char(l), Char(r)) => compare(op, l, r).and_then(boolean),
            (Char(_) | Literal::String(_), Char(_) | Literal::String(_)) => {
                let (l, r) = (string_value(lhs)?, string_value(rhs)?);
                match op {
                    BinaryOp::Plus => Some((Literal::String(l + &r), TypeId::STRING)),
                    BinaryOp::Eq => boolean(l == r),
                    BinaryOp::Neq => boolean(l != r),
                    _ => None,
                }
            }
            (Nil, Nil) => match op {
                BinaryOp::Eq => boolean(true),
                BinaryOp::Neq => boolean(false),
                _ => None,
            },
            (Set(l), Set(r)) => {
                let set = |bits: u32| Some((Set(bits), TypeId::SET));
                match op {
                    BinaryOp::Plus => set(l | r),
                    BinaryOp::Minus => set(l & !r),
                    BinaryOp::Times => set(l & r),
                    BinaryOp::Divide => set(l ^ r),
                    BinaryOp::Eq => boolean(l == r),
                    BinaryOp::Neq => boolean(l != r),
                    BinaryOp::Leq => boolean(l & !r == 0),
                    BinaryOp::Geq => boolean(r & !l == 0),
                    _ => None,
                }
            }
            (Integer(element), Set(bits)) if op == BinaryOp::In => {
                if !self.assert_in_bounds(span, *element) {
                    return None;
                }
                boolean(bits & (1u32 << element) != 0)
            }
            _ => None,
        }
    }

    fn eval_integer(&mut self, span: Span, op: BinaryOp, l: i64, r: i64, common: TypeId) -> Option<(Literal, TypeId)> {
        let result = match op {
            BinaryOp::Plus => l.checked_add(r),
            BinaryOp::Minus => l.checked_sub(r),
            BinaryOp::Times => l.checked_mul(r),
            BinaryOp::Div | BinaryOp::Mod => {
                if r == 0 {
                    self.logger.error(span, "division by zero.");
                    return None;
                }
                if r < 0 {
                    self.logger.error(span, "divisor cannot be negative.");
                    return None;
                }
                let value = if op == BinaryOp::Div { l.div_euclid(r) } else { l.rem_euclid(r) };
                return Some((Literal::Integer(value), common));
            }
            BinaryOp::Divide => {
                if r == 0 {
                    self.logger.error(span, "division by zero.");
                    return None;
                }
                let ty = if self.arena.ty(common).is_real() { common } else { TypeId::REAL };
                return Some((Literal::Real(l as f64 / r as f64), ty));
            }
            _ => return compare(op, &l, &r).map(|value| (Literal::Boolean(value), TypeId::BOOLEAN)),
        };
        match result {
            Some(value) => Some((Literal::Integer(value), int_type(value))),
            None => {
                self.logger.error(span, "integer overflow in constant expression.");
                None
            }
        }
    }

    fn assert_in_bounds(&mut self, span: Span, value: i64) -> bool {
        if (0..=SET_MAX).contains(&value) {
            return true;
        }
        self.logger.error(span, format!("value {} out of bounds [0..{}].", value, SET_MAX));
        false
    }
}

fn compare<T: PartialOrd>(op: BinaryOp, lhs: &T, rhs: &T) -> Option<bool> {
    match op {
        BinaryOp::Eq => Some(lhs == rhs),
        BinaryOp::Neq => Some(lhs != rhs),
        BinaryOp::Lt => Some(lhs < rhs),
        BinaryOp::Leq => Some(lhs <= rhs),
        BinaryOp::Gt => Some(lhs > rhs),
        BinaryOp::Geq => Some(lhs >= rhs),
        _ => None,
    }
}

fn real_value(value: &Literal) -> Option<f64> {
    match value {
        Literal::Integer(value) => Some(*value as f64),
        Literal::Real(value) => Some(*value),
        _ => None,
    }
}

fn string_value(value: &Literal) -> Option<String> {
    match value {
        Literal::Char(value) => Some(char::from(*value).to_string()),
        Literal::String(value) => Some(value.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Designator, QualIdent};
    use pretty_assertions::assert_eq;

    fn int(value: i64) -> Expr {
        Expr::literal(Literal::Integer(value), int_type(value), Span::default())
    }

    fn var() -> Expr {
        Expr::designator(Designator::new(QualIdent::new("x", Span::default())), TypeId::INTEGER, Span::default())
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, TypeId::SHORTINT, Span::default())
    }

    #[test]
    fn test_int_type() {
        assert_eq!(int_type(-32768), TypeId::SHORTINT);
        assert_eq!(int_type(32768), TypeId::INTEGER);
        assert_eq!(int_type(1 << 40), TypeId::LONGINT);
    }

    #[test]
    fn test_floored_division() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let span = Span::default();
        let div = folder.fold_binary(span, BinaryOp::Div, &int(-7), &int(2), TypeId::SHORTINT);
        assert_eq!(div, Some(Folded::Literal(Literal::Integer(-4), TypeId::SHORTINT)));
        let rem = folder.fold_binary(span, BinaryOp::Mod, &int(-7), &int(2), TypeId::SHORTINT);
        assert_eq!(rem, Some(Folded::Literal(Literal::Integer(1), TypeId::SHORTINT)));
        assert_eq!(folder.fold_binary(span, BinaryOp::Div, &int(7), &int(-2), TypeId::SHORTINT), None);
        assert_eq!(folder.fold_binary(span, BinaryOp::Div, &var(), &int(0), TypeId::INTEGER), None);
        let messages: Vec<String> = logger.errors().map(|d| d.message.clone()).collect();
        assert_eq!(messages, vec!["divisor cannot be negative.", "division by zero."]);
    }

    #[test]
    fn test_identity_shortcuts() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let span = Span::default();
        let common = TypeId::INTEGER;
        assert_eq!(folder.fold_binary(span, BinaryOp::Plus, &var(), &int(0), common), Some(Folded::Lhs));
        assert_eq!(folder.fold_binary(span, BinaryOp::Times, &int(1), &var(), common), Some(Folded::Rhs));
        assert_eq!(
            folder.fold_binary(span, BinaryOp::Times, &var(), &int(0), common),
            Some(Folded::Literal(Literal::Integer(0), TypeId::SHORTINT))
        );
        assert_eq!(folder.fold_binary(span, BinaryOp::Minus, &int(0), &var(), common), Some(Folded::NegatedRhs));
        assert_eq!(folder.fold_binary(span, BinaryOp::Minus, &var(), &var(), common), None);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let expr = binary(BinaryOp::Times, binary(BinaryOp::Plus, int(2), int(3)), int(4));
        let folded = folder.fold(&expr);
        assert_eq!(folded, Some(Literal::Integer(20)));
        let again = folder.fold(&Expr::literal(Literal::Integer(20), TypeId::SHORTINT, Span::default()));
        assert_eq!(again, folded);
    }

    #[test]
    fn test_negation_overflow() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        assert_eq!(folder.fold_unary(UnaryOp::Neg, &int(i64::MIN)), None);
        let nested = Expr::new(ExprKind::Unary { op: UnaryOp::Neg, operand: Box::new(int(i64::MIN)) }, TypeId::LONGINT, Span::default());
        assert_eq!(folder.fold(&nested), None);
        let messages: Vec<String> = logger.errors().map(|d| d.message.clone()).collect();
        assert_eq!(messages, vec!["integer overflow in constant expression."; 2]);
    }

    #[test]
    fn test_descending_set_range_is_rejected() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let range = Expr::new(ExprKind::Range { lower: Box::new(int(5)), upper: Box::new(int(2)) }, TypeId::SHORTINT, Span::default());
        let set = Expr::new(ExprKind::Set(vec![range, int(7)]), TypeId::SET, Span::default());
        assert_eq!(folder.fold(&set), None);
        assert_eq!(logger.errors().next().unwrap().message, "upper bound must be greater than lower bound.");
    }

    #[test]
    fn test_set_algebra() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let span = Span::default();
        let set = |bits: u32| Expr::literal(Literal::Set(bits), TypeId::SET, span);
        let cases = [
            (BinaryOp::Plus, 0b1110),
            (BinaryOp::Minus, 0b0010),
            (BinaryOp::Times, 0b0100),
            (BinaryOp::Divide, 0b1010),
        ];
        for (op, expected) in cases {
            let folded = folder.fold_binary(span, op, &set(0b0110), &set(0b1100), TypeId::SET);
            assert_eq!(folded, Some(Folded::Literal(Literal::Set(expected), TypeId::SET)));
        }
        let subset = folder.fold_binary(span, BinaryOp::Leq, &set(0b0100), &set(0b1100), TypeId::BOOLEAN);
        assert_eq!(subset, Some(Folded::Literal(Literal::Boolean(true), TypeId::BOOLEAN)));
        let member = folder.fold_binary(span, BinaryOp::In, &int(40), &set(1), TypeId::BOOLEAN);
        assert_eq!(member, None);
        assert_eq!(logger.errors().next().unwrap().message, "value 40 out of bounds [0..31].");
    }

    #[test]
    fn test_relations_and_strings() {
        let arena = Arena::new();
        let mut logger = Logger::new();
        let mut folder = ConstantFolder::new(&arena, &mut logger);
        let span = Span::default();
        let lt = folder.fold_binary(span, BinaryOp::Lt, &int(1), &int(2), TypeId::BOOLEAN);
        assert_eq!(lt, Some(Folded::Literal(Literal::Boolean(true), TypeId::BOOLEAN)));
        let leq = folder.fold_binary(span, BinaryOp::Leq, &int(3), &int(2), TypeId::BOOLEAN);
        assert_eq!(leq, Some(Folded::Literal(Literal::Boolean(false), TypeId::BOOLEAN)));
        let text = |value: &str| Expr::literal(Literal::String(value.to_string()), TypeId::STRING, span);
        let joined = folder.fold_binary(span, BinaryOp::Plus, &text("ab"), &text("cd"), TypeId::STRING);
        assert_eq!(joined, Some(Folded::Literal(Literal::String("abcd".to_string()), TypeId::STRING)));
        let neg = folder.fold_unary(UnaryOp::Neg, &int(32768));
        assert_eq!(neg, Some((Literal::Integer(-32768), TypeId::SHORTINT)));
    }
}
