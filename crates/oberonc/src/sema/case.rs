//! CASE statements
//!
//! Numeric cases expand their labels into values and require the values
//! of all arms to be disjoint. Type cases take a single record or pointer
//! type per arm; inside the arm the case variable has that type.

use std::collections::HashSet;

use super::analyzer::CaseContext;
use super::Analyzer;
use crate::ast::{CaseArm, CaseLabels, Expr, ExprKind, Literal, Statement, StatementKind};
use crate::common::Span;
use crate::types::TypeId;

impl Analyzer<'_> {
    pub fn on_case_start(&mut self, expr: &Expr) {
        let ty = self.arena.ty(expr.ty);
        let mut decl = None;
        if ty.is_pointer() || ty.is_record() {
            let is_record = ty.is_record();
            match expr.as_designator() {
                Some(designator) if designator.selectors.is_empty() => {
                    let var_param = designator.decl.is_some_and(|id| self.arena.decl(id).is_var_parameter());
                    if is_record && !var_param {
                        self.logger.error(expr.span, "record must be a variable parameter.");
                    }
                    decl = designator.decl;
                }
                _ => {
                    self.logger.error(expr.span, "non-integer case expression must be a variable or variable parameter.");
                }
            }
        }
        let saved = decl.map_or(expr.ty, |id| self.arena.decl(id).ty);
        self.cases.push(CaseContext { ty: expr.ty, decl, saved });
    }

    /// Labels of one arm. Numeric labels are expanded into values, a type
    /// label narrows the case variable until [`Analyzer::on_case_arm`].
    pub fn on_case_labels(&mut self, span: Span, labels: Vec<Expr>) -> CaseLabels {
        let (case_ty, case_decl) = self.cases.last().map_or((TypeId::NO_TYPE, None), |case| (case.ty, case.decl));
        let mut values: Vec<(i64, Span)> = Vec::new();
        let mut guard = None;
        let mut chars = None;

        for label in &labels {
            let ty = self.arena.ty(label.ty);
            if ty.is_entire() || ty.is_char() {
                let is_char = ty.is_char();
                match chars {
                    Some(previous) if previous != is_char => {
                        self.logger.error(label.span, "type mismatch: case labels must all have the same type.");
                        continue;
                    }
                    Some(_) => {}
                    None => chars = Some(is_char),
                }
                let range = match &label.kind {
                    ExprKind::Range { lower, upper } => match (label_value(lower), label_value(upper)) {
                        (Some(lower), Some(upper)) if upper > lower => Some(lower..=upper),
                        (Some(_), Some(_)) => {
                            self.logger.error(upper.span, "upper bound must be greater than lower bound.");
                            None
                        }
                        _ => {
                            self.logger.error(label.span, "constant expression expected.");
                            None
                        }
                    },
                    _ => match label_value(label) {
                        Some(value) => Some(value..=value),
                        None => {
                            self.logger.error(label.span, "constant expression expected.");
                            None
                        }
                    },
                };
                let Some(range) = range else {
                    continue;
                };
                let mut duplicate = false;
                for value in range {
                    duplicate |= values.iter().any(|(seen, _)| *seen == value);
                    values.push((value, label.span));
                }
                if duplicate {
                    self.logger.error(label.span, "duplicate case labels in case statement.");
                }
            } else if label.ty == TypeId::TYPE {
                if let Some(second) = labels.get(1) {
                    self.logger.error(second.span, "non-integer case must have a single type as label.");
                    break;
                }
                let Some(decl) = label.as_designator().and_then(|designator| designator.decl) else {
                    continue;
                };
                let label_ty = self.arena.decl(decl).ty;
                let (lt, et) = (self.arena.ty(label_ty), self.arena.ty(case_ty));
                if (lt.is_pointer() && et.is_pointer()) || (lt.is_record() && et.is_record()) {
                    if self.arena.extends(label_ty, case_ty) {
                        guard = Some(label_ty);
                        if let Some(case_decl) = case_decl {
                            self.arena.decl_mut(case_decl).ty = label_ty;
                        }
                    } else {
                        let message = format!(
                            "type mismatch: {} is not an extension of {}.",
                            self.arena.type_name(label_ty),
                            self.arena.type_name(case_ty)
                        );
                        self.logger.error(label.span, message);
                    }
                } else {
                    let message = format!(
                        "type mismatch: case label type {} is incompatible with case expression type {}.",
                        self.arena.type_name(label_ty),
                        self.arena.type_name(case_ty)
                    );
                    self.logger.error(label.span, message);
                }
            } else if label.ty != TypeId::NO_TYPE {
                self.logger.error(label.span, "constant expression, record type, or pointer type expected.");
            }
        }
        CaseLabels { labels, values, guard, span }
    }

    pub fn on_case_arm(&mut self, labels: CaseLabels, body: Vec<Statement>) -> CaseArm {
        if let Some(case) = self.cases.last() {
            let (case_ty, case_decl, saved) = (case.ty, case.decl, case.saved);
            let numeric = labels.labels.iter().map(|label| self.arena.ty(label.ty)).find(|ty| ty.is_entire() || ty.is_char());
            if let Some(label_ty) = numeric {
                let et = self.arena.ty(case_ty);
                if (et.is_entire() && !label_ty.is_entire()) || (et.is_char() && !label_ty.is_char()) {
                    self.logger.error(labels.span, "type mismatch: case label type is different from case expression type.");
                } else if et.is_pointer() || et.is_record() {
                    self.logger.error(labels.span, "type mismatch: case label type must be pointer or record.");
                }
            }
            if let Some(decl) = case_decl {
                self.arena.decl_mut(decl).ty = saved;
            }
        }
        CaseArm { labels, body }
    }

    pub fn on_case_end(
        &mut self,
        span: Span,
        expr: Expr,
        arms: Vec<CaseArm>,
        otherwise: Option<Vec<Statement>>,
    ) -> Statement {
        self.cases.pop();
        let ty = self.arena.ty(expr.ty);
        if ty.is_entire() || ty.is_char() {
            let mut seen = HashSet::new();
            for arm in &arms {
                let values = &arm.labels.values;
                if let Some((_, span)) = values.iter().find(|(value, _)| seen.contains(value)) {
                    self.logger.error(*span, "duplicate case labels in case statement.");
                }
                seen.extend(values.iter().map(|(value, _)| *value));
            }
        } else if ty.is_pointer() || ty.is_record() {
            let mut guards: Vec<TypeId> = Vec::new();
            for arm in &arms {
                let Some(guard) = arm.labels.guard else {
                    continue;
                };
                if guards.contains(&guard) {
                    self.logger.error(arm.labels.span, "duplicate case labels in case statement.");
                } else if guards.iter().any(|earlier| self.arena.extends(guard, *earlier)) {
                    self.logger.warning(arm.labels.span, "unreachable case label in case statement.");
                }
                guards.push(guard);
            }
        } else if expr.ty != TypeId::NO_TYPE {
            self.logger.error(
                expr.span,
                "type mismatch: case expression type must be integer, character, pointer, or record.",
            );
        }
        Statement::new(StatementKind::Case { expr, arms, otherwise }, span)
    }
}

fn label_value(expr: &Expr) -> Option<i64> {
    match expr.as_literal()? {
        Literal::Integer(value) => Some(*value),
        Literal::Char(value) => Some(i64::from(*value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::StatementKind;
    use crate::sema::tests::{analyze, errors, warnings};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overlapping_arms() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN CASE i OF 1, 2, 3: | 3, 4: END END M.");
        assert_eq!(errors(&output), vec!["duplicate case labels in case statement."]);
    }

    #[test]
    fn test_label_ranges() {
        let output = analyze(
            "MODULE M; VAR c: CHAR; BEGIN CASE c OF \"a\"..\"c\": | \"x\", \"b\": | \"z\"..\"y\": END END M.",
        );
        assert_eq!(
            errors(&output),
            vec!["upper bound must be greater than lower bound.", "duplicate case labels in case statement."]
        );
        let module = output.module.unwrap();
        let StatementKind::Case { arms, .. } = &module.block.body[0].kind else {
            panic!("case expected");
        };
        let values: Vec<i64> = arms[0].labels.values.iter().map(|(value, _)| *value).collect();
        assert_eq!(values, vec![97, 98, 99]);
    }

    #[test]
    fn test_duplicate_within_arm() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN CASE i OF 1, 1..2: END END M.");
        assert_eq!(errors(&output), vec!["duplicate case labels in case statement."]);
    }

    #[test]
    fn test_label_types() {
        let output = analyze("MODULE M; VAR i: INTEGER; BEGIN CASE i OF 1, \"a\": | \"b\": | i: END END M.");
        assert_eq!(
            errors(&output),
            vec![
                "type mismatch: case labels must all have the same type.",
                "type mismatch: case label type is different from case expression type.",
                "constant expression expected.",
            ]
        );
    }

    #[test]
    fn test_invalid_case_expression() {
        let output = analyze("MODULE M; VAR r: REAL; BEGIN CASE r OF 1: END END M.");
        assert_eq!(
            errors(&output),
            vec!["type mismatch: case expression type must be integer, character, pointer, or record."]
        );
    }

    #[test]
    fn test_type_case_narrows_variable() {
        let output = analyze(
            "MODULE M; TYPE A = POINTER TO AR; AR = RECORD END; B = POINTER TO BR; BR = RECORD (AR) b: INTEGER END; \
             C = POINTER TO CR; CR = RECORD (BR) END; \
             VAR a: A; i: INTEGER; \
             BEGIN CASE a OF B: i := a.b | C: i := a.b | B: END; i := a.b END M.",
        );
        assert_eq!(
            errors(&output),
            vec!["duplicate case labels in case statement.", "undefined record field for type AR: b."]
        );
        assert_eq!(warnings(&output), vec!["unreachable case label in case statement."]);
    }

    #[test]
    fn test_type_case_requires_extension() {
        let output = analyze(
            "MODULE M; TYPE A = POINTER TO AR; AR = RECORD END; P = POINTER TO PR; PR = RECORD END; \
             VAR a: A; BEGIN CASE a OF P: END END M.",
        );
        assert_eq!(errors(&output), vec!["type mismatch: P is not an extension of A."]);
    }

    #[test]
    fn test_record_case_requires_var_parameter() {
        let output = analyze(
            "MODULE M; TYPE R = RECORD END; S = RECORD (R) END; \
             PROCEDURE P(r: R); BEGIN CASE r OF S: END END P; \
             PROCEDURE Q(VAR r: R); BEGIN CASE r OF S: END END Q; END M.",
        );
        assert_eq!(errors(&output), vec!["record must be a variable parameter."]);
    }
}
