//! Designator selector resolution
//!
//! A selector chain is resolved left to right against the type reached so
//! far. The chain is rebuilt while walking it: repeated indices are merged,
//! implicit dereferences inserted and single-type calls rewritten into type
//! guards.

use super::Analyzer;
use crate::ast::{DeclId, Expr, QualIdent, Selector, SelectorKind};
use crate::common::Span;
use crate::types::TypeId;

impl Analyzer<'_> {
    /// Resolve `selectors` applied to `decl` of type `base`. Returns the
    /// rewritten chain and the resulting type, `NO_TYPE` after an error or
    /// a call of a proper procedure.
    pub(crate) fn on_selectors(
        &mut self,
        decl: DeclId,
        base: TypeId,
        selectors: Vec<Selector>,
    ) -> (Vec<Selector>, TypeId) {
        let mut resolved = Vec::with_capacity(selectors.len() + 1);
        let mut context = Some(decl);
        let mut base = base;
        let mut pending = selectors.into_iter().peekable();

        while let Some(mut selector) = pending.next() {
            if self.arena.ty(base).is_pointer()
                && matches!(selector.kind, SelectorKind::Index(_) | SelectorKind::Field { .. })
            {
                let mut deref = Selector::new(SelectorKind::Deref { implicit: true }, selector.span);
                base = self.on_dereference(base, deref.span);
                deref.ty = base;
                resolved.push(deref);
                if base == TypeId::NO_TYPE {
                    resolved.push(selector);
                    resolved.extend(pending);
                    return (resolved, TypeId::NO_TYPE);
                }
            }

            if let SelectorKind::Call(args) = &selector.kind {
                if !self.arena.ty(base).is_procedure() {
                    match type_guard_ident(args) {
                        Some(ident) => selector.kind = SelectorKind::TypeGuard { ident, guard: TypeId::NO_TYPE },
                        None => {
                            self.logger.error(selector.span, "unexpected selector: illegal type guard.");
                            resolved.push(selector);
                            resolved.extend(pending);
                            return (resolved, TypeId::NO_TYPE);
                        }
                    }
                }
            }

            if let SelectorKind::Index(indices) = &mut selector.kind {
                let dimensions = self.arena.ty(base).as_array().map_or(0, |array| array.dimensions());
                let mut warned = false;
                while indices.len() < dimensions {
                    let Some(Selector { kind: SelectorKind::Index(_), .. }) = pending.peek() else {
                        break;
                    };
                    let Some(Selector { kind: SelectorKind::Index(mut more), span, .. }) = pending.next() else {
                        break;
                    };
                    if !warned {
                        self.logger.warning(selector.span, "use multi-dimensional index to access multi-dimensional array.");
                        warned = true;
                    }
                    indices.append(&mut more);
                    selector.span = selector.span.merge(span);
                }
            }

            let span = selector.span;
            let next = match &mut selector.kind {
                SelectorKind::Call(args) => match self.on_actual_parameters(context, base, span, args) {
                    Some(ty) => ty,
                    None => {
                        if let Some(next) = pending.peek() {
                            self.logger.error(next.span, "unexpected selector.");
                        }
                        TypeId::NO_TYPE
                    }
                },
                SelectorKind::Index(indices) => self.on_array_index(base, span, indices),
                SelectorKind::Deref { .. } => self.on_dereference(base, span),
                SelectorKind::Field { name, field } => match self.on_record_field(base, name, span) {
                    Some(found) => {
                        *field = Some(found);
                        context = Some(found);
                        self.arena.decl(found).ty
                    }
                    None => TypeId::NO_TYPE,
                },
                SelectorKind::TypeGuard { ident, guard } => {
                    *guard = self.on_typeguard(context, base, ident);
                    *guard
                }
            };
            selector.ty = next;
            resolved.push(selector);
            if next == TypeId::NO_TYPE {
                resolved.extend(pending);
                return (resolved, TypeId::NO_TYPE);
            }
            base = next;
        }
        (resolved, base)
    }

    /// Check the actual parameters of a call. Returns the result type,
    /// `None` for a proper procedure and `NO_TYPE` after an error.
    pub(crate) fn on_actual_parameters(
        &mut self,
        context: Option<DeclId>,
        base: TypeId,
        span: Span,
        args: &mut [Expr],
    ) -> Option<TypeId> {
        let Some(mut proc) = self.arena.ty(base).as_procedure().cloned() else {
            let message = format!("type {} is not a procedure type.", self.arena.type_name(base));
            self.logger.error(span, message);
            return Some(TypeId::NO_TYPE);
        };
        let mut result = proc.ret;

        // Predefined procedures pick their signature before arguments are checked.
        let builtin = context.and_then(|decl| self.arena.decl(decl).builtin());
        if let Some(builtin) = builtin {
            let actuals: Vec<TypeId> = args.iter().map(Expr::effective_type).collect();
            let type_arg = args
                .first()
                .filter(|arg| arg.ty == TypeId::TYPE)
                .and_then(|arg| arg.as_designator())
                .and_then(|designator| designator.decl)
                .map(|decl| self.arena.decl(decl).ty);
            // An undefined argument was already reported.
            if actuals.contains(&TypeId::NO_TYPE) {
                result = proc.ret.map(|_| TypeId::NO_TYPE);
            } else if let Some(dispatch) = self.system.dispatch(&self.arena, builtin, &actuals, type_arg) {
                tracing::trace!(builtin = builtin.name(), signature = dispatch.signature.0, "dispatched");
                if let Some(signature) = self.arena.ty(dispatch.signature).as_procedure().cloned() {
                    proc = signature;
                }
                result = dispatch.result;
            }
        }

        if args.len() < proc.params.len() {
            self.logger.error(span, "fewer actual than formal parameters.");
        }
        for (index, arg) in args.iter_mut().enumerate() {
            let Some(&param) = proc.params.get(index) else {
                if !proc.variadic {
                    self.logger.error(span, "more actual than formal parameters.");
                    break;
                }
                continue;
            };
            let (is_var, param_ty) = {
                let decl = self.arena.decl(param);
                (decl.is_var_parameter(), decl.ty)
            };
            let actual = arg.effective_type();
            if actual == TypeId::NO_TYPE || !self.is_compatible(arg.span, param_ty, actual) {
                continue;
            }
            if is_var {
                self.check_reference_argument(arg, param_ty);
            } else if param_ty != arg.ty {
                if arg.is_literal() {
                    self.cast_literal(arg, param_ty);
                } else {
                    if self.arena.ty(param_ty).is_array() && self.arena.ty(arg.ty).is_char() {
                        self.logger.error(
                            arg.span,
                            "type mismatch: cannot pass a non-constant character value to a string parameter.",
                        );
                    }
                    self.cast(arg, param_ty);
                }
            }
        }
        result
    }

    fn check_reference_argument(&mut self, arg: &Expr, param_ty: TypeId) {
        if let Err(reason) = self.assert_assignable(arg) {
            let message = format!("illegal actual parameter: cannot pass {} by reference.", reason);
            self.logger.error(arg.span, message);
            return;
        }
        let actual = arg.effective_type();
        let (formal, given) = (self.arena.ty(param_ty), self.arena.ty(actual));
        if formal.is_numeric() && given.is_numeric() && param_ty != actual {
            let message = format!(
                "type mismatch: cannot pass {} to {} by reference.",
                self.arena.type_name(actual),
                self.arena.type_name(param_ty)
            );
            self.logger.error(arg.span, message);
        }
    }

    pub(crate) fn on_array_index(&mut self, base: TypeId, span: Span, indices: &[Expr]) -> TypeId {
        let Some(array) = self.arena.ty(base).as_array().cloned() else {
            let message = format!("{} is not an array.", self.arena.type_name(base));
            self.logger.error(span, message);
            return TypeId::NO_TYPE;
        };
        if indices.len() > array.dimensions() {
            let message = format!(
                "more indices than array dimensions: {} > {}.",
                indices.len(),
                array.dimensions()
            );
            self.logger.error(span, message);
        }
        let count = indices.len().min(array.dimensions());
        for (index, length) in indices.iter().zip(&array.lengths) {
            if !self.arena.ty(index.ty).is_entire() {
                self.logger.error(index.span, "integer expression expected.");
                continue;
            }
            let Some(value) = index.integer_value() else {
                continue;
            };
            if *length == 0 {
                if value < 0 {
                    let message = format!("negative value {} is not a valid array index.", value);
                    self.logger.error(index.span, message);
                }
            } else {
                self.assert_in_bounds(index.span, value, 0, i64::from(*length) - 1);
            }
        }
        match count {
            0 => base,
            count => array.types[count - 1],
        }
    }

    pub(crate) fn on_dereference(&mut self, base: TypeId, span: Span) -> TypeId {
        match self.arena.ty(base).as_pointer() {
            Some(pointer) => pointer.base.unwrap_or(TypeId::NO_TYPE),
            None => {
                let message = format!("{} is not a pointer.", self.arena.type_name(base));
                self.logger.error(span, message);
                TypeId::NO_TYPE
            }
        }
    }

    pub(crate) fn on_record_field(&mut self, base: TypeId, name: &str, span: Span) -> Option<DeclId> {
        if !self.arena.ty(base).is_record() {
            let message = format!("{} is not a record.", self.arena.type_name(base));
            self.logger.error(span, message);
            return None;
        }
        let field = self.arena.find_field(base, name);
        if field.is_none() {
            let message = format!("undefined record field for type {}: {}.", self.arena.type_name(base), name);
            self.logger.error(span, message);
        }
        field
    }

    /// `v(T)`: `v` must be a pointer or a variable parameter of record type,
    /// `T` an extension of its type.
    pub(crate) fn on_typeguard(&mut self, context: Option<DeclId>, base: TypeId, ident: &QualIdent) -> TypeId {
        let span = ident.span;
        let Some(decl) = self.symbols.lookup(ident) else {
            self.logger.error(span, format!("undefined identifier: {}.", ident));
            return TypeId::NO_TYPE;
        };
        let actual = self.arena.ty(base);
        let var_record = actual.is_record() && context.is_some_and(|ctx| self.arena.decl(ctx).is_var_parameter());
        if !actual.is_pointer() && !var_record {
            self.logger.error(
                span,
                "type mismatch: a type guard can only be applied to a variable parameter of record type or a pointer.",
            );
            return TypeId::NO_TYPE;
        }
        if !self.arena.decl(decl).is_type() {
            self.logger.error(span, "unexpected selector.");
            return TypeId::NO_TYPE;
        }
        let guard = self.arena.decl(decl).ty;
        let guard_ty = self.arena.ty(guard);
        if guard_ty.is_pointer() || guard_ty.is_record() {
            if !self.arena.extends(guard, base) {
                let message = format!(
                    "type mismatch: {} is not an extension of {}.",
                    self.arena.type_name(guard),
                    self.arena.type_name(base)
                );
                self.logger.error(span, message);
            } else if self.arena.extends(base, guard) {
                self.logger.warning(span, "type check is always true.");
            }
        } else {
            self.logger.error(span, "type mismatch: record type or pointer to record type expected.");
        }
        guard
    }

    /// Log an out-of-range literal and clamp it into `[lower, upper]`.
    pub(crate) fn assert_in_bounds(&mut self, span: Span, value: i64, lower: i64, upper: i64) -> i64 {
        if (lower..=upper).contains(&value) {
            return value;
        }
        self.logger.error(span, format!("value {} out of bounds [{}..{}].", value, lower, upper));
        value.clamp(lower, upper)
    }
}

/// `v(T)` parses as a call with a single type designator argument.
fn type_guard_ident(args: &[Expr]) -> Option<QualIdent> {
    match args {
        [arg] if arg.ty == TypeId::TYPE => {
            let designator = arg.as_designator()?;
            designator.selectors.is_empty().then(|| designator.ident.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ExprKind, SelectorKind, StatementKind};
    use crate::sema::tests::{analyze, errors, warnings};
    use pretty_assertions::assert_eq;

    fn assignment_target_selectors(source: &str) -> Vec<SelectorKind> {
        let output = analyze(source);
        let module = output.module.unwrap();
        let StatementKind::Assignment { target, .. } = &module.block.body[0].kind else {
            panic!("assignment expected");
        };
        let ExprKind::Designator(designator) = &target.kind else {
            panic!("designator expected");
        };
        designator.selectors.iter().map(|s| s.kind.clone()).collect()
    }

    #[test]
    fn test_implicit_dereference() {
        let selectors = assignment_target_selectors(
            "MODULE M; TYPE R = RECORD f: INTEGER END; P = POINTER TO R; VAR p: P; BEGIN p.f := 1 END M.",
        );
        assert_eq!(selectors.len(), 2);
        assert!(matches!(selectors[0], SelectorKind::Deref { implicit: true }));
        assert!(matches!(selectors[1], SelectorKind::Field { field: Some(_), .. }));
    }

    #[test]
    fn test_repeated_indices_are_merged() {
        let source = "MODULE M; VAR a: ARRAY 3, 4 OF INTEGER; BEGIN a[1][2] := 0 END M.";
        let selectors = assignment_target_selectors(source);
        assert_eq!(selectors.len(), 1);
        let SelectorKind::Index(indices) = &selectors[0] else {
            panic!("index expected");
        };
        assert_eq!(indices.len(), 2);
        let output = analyze(source);
        assert_eq!(warnings(&output), vec!["use multi-dimensional index to access multi-dimensional array."]);
    }

    #[test]
    fn test_named_row_type_keeps_separate_indices() {
        let source = "MODULE M; TYPE Row = ARRAY 4 OF INTEGER; VAR a: ARRAY 3 OF Row; BEGIN a[1][2] := 0 END M.";
        let output = analyze(source);
        assert_eq!(errors(&output), Vec::<String>::new());
        assert_eq!(warnings(&output), Vec::<String>::new());
        assert_eq!(assignment_target_selectors(source).len(), 2);
    }

    #[test]
    fn test_index_bounds() {
        let output = analyze(
            "MODULE M; VAR a: ARRAY 3 OF INTEGER; PROCEDURE P(b: ARRAY OF INTEGER); VAR x: INTEGER; \
             BEGIN x := b[-1] END P; BEGIN a[3] := 0; a[0, 1] := 0 END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "negative value -1 is not a valid array index.",
                "value 3 out of bounds [0..2].",
                "more indices than array dimensions: 2 > 1.",
            ]
        );
    }

    #[test]
    fn test_type_guard() {
        let output = analyze(
            "MODULE M; TYPE A = RECORD END; B = RECORD (A) x: INTEGER END; PA = POINTER TO A; PB = POINTER TO B; \
             VAR p: PA; q: PB; i: INTEGER; BEGIN i := p(PB).x; q := q(PB); i := i(PB).x END M.",
        );
        assert_eq!(
            errors(&output),
            vec!["type mismatch: a type guard can only be applied to a variable parameter of record type or a pointer."]
        );
        assert_eq!(warnings(&output), vec!["type check is always true."]);
    }

    #[test]
    fn test_actual_parameters() {
        let output = analyze(
            "MODULE M; CONST C = 1; VAR s: SHORTINT; l: LONGINT; \
             PROCEDURE P(VAR x: INTEGER; y: INTEGER); END P; \
             BEGIN P(l, 1); P(s, 1); P(C, 1); P(l); P(l, 1, 2) END M.",
        );
        assert_eq!(
            errors(&output),
            vec![
                "type mismatch: converting from LONGINT to INTEGER may lose data.",
                "type mismatch: cannot pass SHORTINT to INTEGER by reference.",
                "illegal actual parameter: cannot pass a constant value by reference.",
                "fewer actual than formal parameters.",
                "type mismatch: converting from LONGINT to INTEGER may lose data.",
                "type mismatch: converting from LONGINT to INTEGER may lose data.",
                "more actual than formal parameters.",
            ]
        );
    }

    #[test]
    fn test_builtin_overload_result() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; r: REAL; s: SHORTINT; BEGIN i := ABS(i); r := ABS(r); s := MAX(SHORTINT); \
             INC(i); INC(i, 2); i := LEN(\"abc\") END M.",
        );
        assert_eq!(errors(&output), vec!["type mismatch: converting from LONGINT to INTEGER may lose data."]);
    }

    #[test]
    fn test_builtin_arguments_follow_selected_overload() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; l: LONGINT; s: SHORTINT; BEGIN i := ORD(TRUE); l := LONG(i); i := SHORT(l); \
             s := SHORT(i); i := ORD(1.5) END M.",
        );
        assert_eq!(errors(&output), vec!["type mismatch: expected CHAR, found REAL."]);
    }

    #[test]
    fn test_undefined_argument_reported_once() {
        let output = analyze(
            "MODULE M; VAR i: INTEGER; PROCEDURE P(k: INTEGER); BEGIN END P; \
             BEGIN P(j); i := ABS(j); INC(j) END M.",
        );
        assert_eq!(
            errors(&output),
            vec!["undefined identifier: j.", "undefined identifier: j.", "undefined identifier: j."]
        );
    }
}
