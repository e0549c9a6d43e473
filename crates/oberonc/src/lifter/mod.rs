//! Lambda lifting
//!
//! Moves nested procedures to module level. A procedure with nested
//! children gets an environment record `_T<Name>` mirroring its parameters
//! and locals, held in the hidden local `_this`. Every child receives that
//! environment as the hidden VAR parameter `_super`. References to an
//! enclosing procedure's variables become field accesses through the
//! environment, following `_super` once per nesting level.
//!
//! Runs on error-free trees only. A reference that cannot be resolved
//! through the environment chain is an internal error.

use std::collections::HashMap;

use crate::ast::{
    returns, Arena, Block, Decl, DeclId, DeclKind, Designator, Expr, ExprKind, Module, QualIdent, Selector,
    SelectorKind, Statement, StatementKind,
};
use crate::common::{CompileError, CompileResult, Span};
use crate::sema::MODULE_LEVEL;
use crate::types::{RecordType, TypeId, TypeKind};

/// Hidden local holding a procedure's own environment.
pub const THIS: &str = "_this";
/// Hidden parameter holding the enclosing procedure's environment.
pub const SUPER: &str = "_super";

/// Lift every nested procedure of `module` to module level.
pub fn lift(module: &mut Module, arena: &mut Arena) -> CompileResult<()> {
    let mut lifter = LambdaLifter::new(arena, &module.name);
    lifter.lift_module(module)
}

/// Environment variable used to reach outer variables.
#[derive(Debug, Clone, Copy)]
struct Env {
    decl: DeclId,
    record: TypeId,
}

pub struct LambdaLifter<'a> {
    arena: &'a mut Arena,
    module: String,
    /// Environment field standing in for a parameter or local
    fields: HashMap<DeclId, DeclId>,
    /// Hidden `_super` parameter of each procedure that received one
    hidden: HashMap<DeclId, DeclId>,
    /// Environment record declarations, registered at module level
    types: Vec<DeclId>,
    /// Relocated procedures in the order they were lifted
    lifted: Vec<DeclId>,
}

impl<'a> LambdaLifter<'a> {
    pub fn new(arena: &'a mut Arena, module: &str) -> Self {
        Self {
            arena,
            module: module.to_string(),
            fields: HashMap::new(),
            hidden: HashMap::new(),
            types: Vec::new(),
            lifted: Vec::new(),
        }
    }

    pub fn lift_module(&mut self, module: &mut Module) -> CompileResult<()> {
        for id in module.block.procedures.clone() {
            self.lift_procedure(id)?;
        }
        tracing::debug!(module = %self.module, lifted = self.lifted.len(), "lambda lifting finished");
        module.block.types.append(&mut self.types);
        module.block.procedures.append(&mut self.lifted);
        Ok(())
    }

    fn lift_procedure(&mut self, id: DeclId) -> CompileResult<()> {
        let Some(procedure) = self.arena.decl_mut(id).procedure_mut() else {
            return Ok(());
        };
        if procedure.external.is_some() {
            return Ok(());
        }
        let mut block = std::mem::take(&mut procedure.block);
        let children = std::mem::take(&mut block.procedures);

        let result = if !children.is_empty() {
            self.lift_parent(id, &mut block, &children)
        } else if let Some(param) = self.hidden.get(&id).copied() {
            let env = Env { decl: param, record: self.arena.decl(param).ty };
            self.rewrite_statements(&mut block.body, env)
        } else {
            Ok(())
        };
        if self.arena.decl(id).level > MODULE_LEVEL {
            self.reset_levels(id, &block);
        }
        if let Some(procedure) = self.arena.decl_mut(id).procedure_mut() {
            procedure.block = block;
        }
        result?;

        for child in children {
            self.relocate(id, child);
            self.lift_procedure(child)?;
        }
        Ok(())
    }

    /// Build the environment of a procedure with nested children and route
    /// its own body through it.
    fn lift_parent(&mut self, id: DeclId, block: &mut Block, children: &[DeclId]) -> CompileResult<()> {
        let params = self.params(id);
        if params.is_empty() && block.variables.is_empty() {
            return Ok(());
        }
        let name = self.arena.decl(id).name.clone();
        let level = self.arena.decl(id).level + 1;
        tracing::debug!(procedure = %name, children = children.len(), "building environment");

        let mut fields = Vec::with_capacity(params.len() + block.variables.len());
        for (index, origin) in params.iter().chain(&block.variables).enumerate() {
            let (field_name, ty) = {
                let decl = self.arena.decl(*origin);
                (decl.name.clone(), decl.ty)
            };
            let field = self.new_decl(&field_name, DeclKind::Field { index }, ty, MODULE_LEVEL + 1);
            self.fields.insert(*origin, field);
            fields.push(field);
        }
        let record = self.arena.add_type(TypeKind::Record(RecordType { fields, base: None, level: 0 }), Span::default());
        let type_decl = self.new_decl(&format!("_T{}", name), DeclKind::Type, record, MODULE_LEVEL);
        self.arena.ty_mut(record).decl = Some(type_decl);
        self.types.push(type_decl);

        for child in children {
            let index = self.params(*child).len();
            let child_level = self.arena.decl(*child).level + 1;
            let param = self.new_decl(SUPER, DeclKind::Parameter { is_var: true, index }, record, child_level);
            let child_ty = self.arena.decl(*child).ty;
            if let TypeKind::Procedure(procedure) = &mut self.arena.ty_mut(child_ty).kind {
                procedure.params.push(param);
            }
            self.hidden.insert(*child, param);
        }

        for variable in &block.variables {
            if let DeclKind::Variable { index } = &mut self.arena.decl_mut(*variable).kind {
                *index += 1;
            }
        }
        let this = self.new_decl(THIS, DeclKind::Variable { index: 0 }, record, level);
        block.variables.insert(0, this);
        let env = Env { decl: this, record };

        let copy_in: Vec<Statement> =
            params.iter().map(|param| assign(self.env_field(env, *param), self.reference(*param))).collect();
        let write_back: Vec<Statement> = params
            .iter()
            .filter(|param| self.arena.decl(**param).is_var_parameter())
            .map(|param| assign(self.reference(*param), self.env_field(env, *param)))
            .collect();

        self.rewrite_statements(&mut block.body, env)?;
        insert_before_returns(&mut block.body, &write_back);
        let ends_in_return = returns(&block.body);
        let mut body = copy_in;
        body.append(&mut block.body);
        if !ends_in_return {
            body.extend(write_back);
        }
        block.body = body;
        Ok(())
    }

    /// Rename a child after its parent and queue it for module level.
    fn relocate(&mut self, parent: DeclId, child: DeclId) {
        let parent_name = &self.arena.decl(parent).name;
        let name = if parent_name.starts_with('_') {
            format!("{}_{}", parent_name, self.arena.decl(child).name)
        } else {
            format!("_{}_{}", parent_name, self.arena.decl(child).name)
        };
        tracing::debug!(procedure = %self.arena.decl(child).name, lifted = %name, "relocating procedure");
        self.arena.decl_mut(child).name = name;
        self.lifted.push(child);
    }

    fn reset_levels(&mut self, id: DeclId, block: &Block) {
        self.arena.decl_mut(id).level = MODULE_LEVEL;
        let locals: Vec<DeclId> = self
            .params(id)
            .into_iter()
            .chain(block.constants.iter().copied())
            .chain(block.types.iter().copied())
            .chain(block.variables.iter().copied())
            .collect();
        for local in locals {
            self.arena.decl_mut(local).level = MODULE_LEVEL + 1;
        }
    }

    // ========================================================================
    // Rewriting
    // ========================================================================

    fn rewrite_statements(&mut self, statements: &mut [Statement], env: Env) -> CompileResult<()> {
        for statement in statements {
            self.rewrite_statement(statement, env)?;
        }
        Ok(())
    }

    fn rewrite_statement(&mut self, statement: &mut Statement, env: Env) -> CompileResult<()> {
        match &mut statement.kind {
            StatementKind::Assignment { target, value } => {
                self.rewrite_expr(target, env)?;
                self.rewrite_expr(value, env)
            }
            StatementKind::Call(call) => self.rewrite_expr(call, env),
            StatementKind::If { cond, then, elsifs, otherwise } => {
                self.rewrite_expr(cond, env)?;
                self.rewrite_statements(then, env)?;
                for elsif in elsifs {
                    self.rewrite_expr(&mut elsif.cond, env)?;
                    self.rewrite_statements(&mut elsif.body, env)?;
                }
                match otherwise {
                    Some(otherwise) => self.rewrite_statements(otherwise, env),
                    None => Ok(()),
                }
            }
            StatementKind::Case { expr, arms, otherwise } => {
                self.rewrite_expr(expr, env)?;
                for arm in arms {
                    self.rewrite_statements(&mut arm.body, env)?;
                }
                match otherwise {
                    Some(otherwise) => self.rewrite_statements(otherwise, env),
                    None => Ok(()),
                }
            }
            StatementKind::Loop(body) => self.rewrite_statements(body, env),
            StatementKind::While { cond, body, elsifs } => {
                self.rewrite_expr(cond, env)?;
                self.rewrite_statements(body, env)?;
                for elsif in elsifs {
                    self.rewrite_expr(&mut elsif.cond, env)?;
                    self.rewrite_statements(&mut elsif.body, env)?;
                }
                Ok(())
            }
            StatementKind::Repeat { body, cond } => {
                self.rewrite_statements(body, env)?;
                self.rewrite_expr(cond, env)
            }
            StatementKind::For { counter, low, high, step, body } => {
                self.rewrite_expr(counter, env)?;
                self.rewrite_expr(low, env)?;
                self.rewrite_expr(high, env)?;
                self.rewrite_expr(step, env)?;
                self.rewrite_statements(body, env)
            }
            StatementKind::Return(Some(value)) => self.rewrite_expr(value, env),
            StatementKind::Return(None) | StatementKind::Exit => Ok(()),
        }
    }

    fn rewrite_expr(&mut self, expr: &mut Expr, env: Env) -> CompileResult<()> {
        match &mut expr.kind {
            ExprKind::Literal(_) => Ok(()),
            ExprKind::Designator(designator) => self.rewrite_designator(designator, env),
            ExprKind::Unary { operand, .. } => self.rewrite_expr(operand, env),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.rewrite_expr(lhs, env)?;
                self.rewrite_expr(rhs, env)
            }
            ExprKind::Range { lower, upper } => {
                self.rewrite_expr(lower, env)?;
                self.rewrite_expr(upper, env)
            }
            ExprKind::Set(elements) => {
                for element in elements {
                    self.rewrite_expr(element, env)?;
                }
                Ok(())
            }
        }
    }

    fn rewrite_designator(&mut self, designator: &mut Designator, env: Env) -> CompileResult<()> {
        for selector in &mut designator.selectors {
            if let SelectorKind::Index(exprs) | SelectorKind::Call(exprs) = &mut selector.kind {
                for expr in exprs {
                    self.rewrite_expr(expr, env)?;
                }
            }
        }
        let Some(decl) = designator.decl else {
            return Ok(());
        };

        // Call of a procedure expecting its parent's environment
        if let Some(param) = self.hidden.get(&decl).copied() {
            let target = self.arena.decl(param).ty;
            let call = designator
                .selectors
                .iter()
                .position(|selector| matches!(selector.kind, SelectorKind::Call(_)));
            if let Some(index) = call {
                let span = designator.selectors[index].span;
                let argument = self.environment(env, target, span)?;
                if let SelectorKind::Call(args) = &mut designator.selectors[index].kind {
                    args.push(argument);
                }
            }
            return Ok(());
        }

        if let Some(field) = self.fields.get(&decl).copied() {
            let mut path = self.field_path(env, field)?;
            path.append(&mut designator.selectors);
            designator.selectors = path;
            designator.decl = Some(env.decl);
            designator.ident = QualIdent::new(self.arena.decl(env.decl).name.clone(), designator.ident.span);
        }
        Ok(())
    }

    /// Selectors leading from `env` to `field`, through as many `_super`
    /// links as needed.
    fn field_path(&self, env: Env, field: DeclId) -> CompileResult<Vec<Selector>> {
        let mut path = Vec::new();
        let mut record = env.record;
        loop {
            let fields = self.record_fields(record)?;
            if fields.contains(&field) {
                path.push(self.field_selector(field));
                return Ok(path);
            }
            let Some(link) = self.super_field(fields) else {
                let name = &self.arena.decl(field).name;
                return Err(CompileError::internal(format!("unable to resolve environment field: {}.", name)));
            };
            path.push(self.field_selector(link));
            record = self.arena.decl(link).ty;
        }
    }

    /// Expression denoting the environment of type `target`, reached from `env`.
    fn environment(&self, env: Env, target: TypeId, span: Span) -> CompileResult<Expr> {
        let mut selectors = Vec::new();
        let mut record = env.record;
        while record != target {
            let fields = self.record_fields(record)?;
            let Some(link) = self.super_field(fields) else {
                let message = format!("unable to resolve environment: {}.", self.arena.type_name(target));
                return Err(CompileError::internal(message));
            };
            selectors.push(self.field_selector(link));
            record = self.arena.decl(link).ty;
        }
        let decl = self.arena.decl(env.decl);
        let designator = Designator { ident: QualIdent::new(decl.name.clone(), span), decl: Some(env.decl), selectors };
        Ok(Expr::designator(designator, target, span))
    }

    fn record_fields(&self, record: TypeId) -> CompileResult<&[DeclId]> {
        self.arena
            .ty(record)
            .as_record()
            .map(|record| record.fields.as_slice())
            .ok_or_else(|| CompileError::internal(format!("environment is not a record: {}.", self.arena.type_name(record))))
    }

    fn super_field(&self, fields: &[DeclId]) -> Option<DeclId> {
        fields.iter().copied().find(|field| self.arena.decl(*field).name == SUPER)
    }

    // ========================================================================
    // Builders
    // ========================================================================

    fn new_decl(&mut self, name: &str, kind: DeclKind, ty: TypeId, level: u32) -> DeclId {
        let mut decl = Decl::new(name, kind, ty, Span::default());
        decl.level = level;
        decl.module = Some(self.module.clone());
        self.arena.add_decl(decl)
    }

    fn params(&self, id: DeclId) -> Vec<DeclId> {
        let ty = self.arena.decl(id).ty;
        self.arena.ty(ty).as_procedure().map(|procedure| procedure.params.clone()).unwrap_or_default()
    }

    fn field_selector(&self, field: DeclId) -> Selector {
        let decl = self.arena.decl(field);
        let mut selector = Selector::new(SelectorKind::Field { name: decl.name.clone(), field: Some(field) }, Span::default());
        selector.ty = decl.ty;
        selector
    }

    /// Plain reference to a declaration.
    fn reference(&self, id: DeclId) -> Expr {
        let decl = self.arena.decl(id);
        let designator = Designator { ident: QualIdent::new(decl.name.clone(), Span::default()), decl: Some(id), selectors: Vec::new() };
        Expr::designator(designator, decl.ty, Span::default())
    }

    /// `env.field` for the field mirroring `origin`.
    fn env_field(&self, env: Env, origin: DeclId) -> Expr {
        let mut expr = self.reference(env.decl);
        if let Some(field) = self.fields.get(&origin) {
            let selector = self.field_selector(*field);
            expr.ty = selector.ty;
            if let Some(designator) = expr.as_designator_mut() {
                designator.selectors.push(selector);
            }
        }
        expr
    }
}

fn assign(target: Expr, value: Expr) -> Statement {
    Statement::new(StatementKind::Assignment { target, value }, Span::default())
}

/// Insert `write_back` in front of every RETURN, including nested ones.
fn insert_before_returns(statements: &mut Vec<Statement>, write_back: &[Statement]) {
    if write_back.is_empty() {
        return;
    }
    let mut index = 0;
    while index < statements.len() {
        if matches!(statements[index].kind, StatementKind::Return(_)) {
            statements.splice(index..index, write_back.iter().cloned());
            index += write_back.len() + 1;
            continue;
        }
        match &mut statements[index].kind {
            StatementKind::If { then, elsifs, otherwise, .. } => {
                insert_before_returns(then, write_back);
                for elsif in elsifs {
                    insert_before_returns(&mut elsif.body, write_back);
                }
                if let Some(otherwise) = otherwise {
                    insert_before_returns(otherwise, write_back);
                }
            }
            StatementKind::Case { arms, otherwise, .. } => {
                for arm in arms {
                    insert_before_returns(&mut arm.body, write_back);
                }
                if let Some(otherwise) = otherwise {
                    insert_before_returns(otherwise, write_back);
                }
            }
            StatementKind::While { body, elsifs, .. } => {
                insert_before_returns(body, write_back);
                for elsif in elsifs {
                    insert_before_returns(&mut elsif.body, write_back);
                }
            }
            StatementKind::Loop(body) | StatementKind::Repeat { body, .. } | StatementKind::For { body, .. } => {
                insert_before_returns(body, write_back);
            }
            _ => {}
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::FrontendOutput;
    use crate::sema::tests::{analyze, errors};
    use pretty_assertions::assert_eq;

    fn lifted(source: &str) -> (Module, Arena) {
        let FrontendOutput { module, mut arena, logger } = analyze(source);
        let errors: Vec<&str> = logger.errors().map(|d| d.message.as_str()).collect();
        assert_eq!(errors, Vec::<&str>::new());
        let mut module = module.unwrap();
        lift(&mut module, &mut arena).unwrap();
        (module, arena)
    }

    fn names(arena: &Arena, ids: &[DeclId]) -> Vec<String> {
        ids.iter().map(|id| arena.decl(*id).name.clone()).collect()
    }

    fn body(arena: &Arena, id: DeclId) -> &[Statement] {
        &arena.decl(id).procedure().unwrap().block.body
    }

    /// Designator text of an expression, `_super.c` style.
    fn path(expr: &Expr) -> String {
        let designator = expr.as_designator().unwrap();
        let mut text = designator.ident.name.clone();
        for selector in &designator.selectors {
            if let SelectorKind::Field { name, .. } = &selector.kind {
                text.push('.');
                text.push_str(name);
            }
        }
        text
    }

    fn assignment(statement: &Statement) -> (String, &Expr) {
        let StatementKind::Assignment { target, value } = &statement.kind else {
            panic!("assignment expected, found {:?}", statement.kind);
        };
        (path(target), value)
    }

    const OUTER: &str = "MODULE M; \
        PROCEDURE Outer(VAR a: INTEGER; b: INTEGER); \
          VAR c: INTEGER; \
          PROCEDURE Inner; BEGIN c := a + b END Inner; \
        BEGIN c := 0; Inner; a := c END Outer; \
        END M.";

    #[test]
    fn test_environment_record() {
        let (module, arena) = lifted(OUTER);
        assert_eq!(names(&arena, &module.block.types), vec!["_TOuter"]);
        assert_eq!(names(&arena, &module.block.procedures), vec!["Outer", "_Outer_Inner"]);

        let record = arena.decl(module.block.types[0]).ty;
        let fields = &arena.ty(record).as_record().unwrap().fields;
        assert_eq!(names(&arena, fields), vec!["a", "b", "c"]);

        let outer = arena.decl(module.block.procedures[0]).procedure().unwrap();
        assert_eq!(names(&arena, &outer.block.variables), vec!["_this", "c"]);
        assert!(outer.block.procedures.is_empty());
    }

    #[test]
    fn test_copy_in_and_write_back() {
        let (module, arena) = lifted(OUTER);
        let statements = body(&arena, module.block.procedures[0]);
        let shape: Vec<String> = statements
            .iter()
            .map(|statement| match &statement.kind {
                StatementKind::Assignment { target, value } => format!("{} := {}", path(target), path_or_literal(value)),
                StatementKind::Call(call) => format!("call {}", path(call)),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(
            shape,
            vec!["_this.a := a", "_this.b := b", "_this.c := 0", "call Inner", "_this.a := _this.c", "a := _this.a"]
        );
    }

    fn path_or_literal(expr: &Expr) -> String {
        match expr.as_literal() {
            Some(value) => value.to_string(),
            None => path(expr),
        }
    }

    #[test]
    fn test_child_reads_through_super() {
        let (module, arena) = lifted(OUTER);
        let inner = module.block.procedures[1];
        assert_eq!(arena.decl(inner).level, MODULE_LEVEL);

        let ty = arena.decl(inner).ty;
        let params = &arena.ty(ty).as_procedure().unwrap().params;
        assert_eq!(names(&arena, params), vec!["_super"]);
        assert!(arena.decl(params[0]).is_var_parameter());

        let (target, value) = assignment(&body(&arena, inner)[0]);
        assert_eq!(target, "_super.c");
        let ExprKind::Binary { lhs, rhs, .. } = &value.kind else {
            panic!("binary expected");
        };
        assert_eq!((path(lhs), path(rhs)), ("_super.a".to_string(), "_super.b".to_string()));
    }

    #[test]
    fn test_call_passes_environment() {
        let (module, arena) = lifted(OUTER);
        let StatementKind::Call(call) = &body(&arena, module.block.procedures[0])[3].kind else {
            panic!("call expected");
        };
        let Some(SelectorKind::Call(args)) = call.as_designator().unwrap().selectors.last().map(|s| &s.kind) else {
            panic!("call selector expected");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(path(&args[0]), "_this");
    }

    #[test]
    fn test_multi_level_nesting() {
        let (module, arena) = lifted(
            "MODULE M; \
             PROCEDURE Q(x: INTEGER); \
               PROCEDURE P(y: INTEGER); \
                 PROCEDURE R; BEGIN x := y END R; \
               BEGIN R END P; \
             BEGIN P(x) END Q; \
             END M.",
        );
        assert_eq!(names(&arena, &module.block.procedures), vec!["Q", "_Q_P", "_Q_P_R"]);
        assert_eq!(names(&arena, &module.block.types), vec!["_TQ", "_T_Q_P"]);

        let r = module.block.procedures[2];
        let (target, value) = assignment(&body(&arena, r)[0]);
        assert_eq!(target, "_super._super.x");
        assert_eq!(path(value), "_super.y");

        // P copies its own hidden parameter in and writes it back.
        let p = body(&arena, module.block.procedures[1]);
        assert_eq!(assignment(&p[1]).0, "_this._super");
        assert_eq!(assignment(p.last().unwrap()).0, "_super");

        // Q passes its environment to P.
        let StatementKind::Call(call) = &body(&arena, module.block.procedures[0])[1].kind else {
            panic!("call expected");
        };
        let Some(SelectorKind::Call(args)) = call.as_designator().unwrap().selectors.last().map(|s| &s.kind) else {
            panic!("call selector expected");
        };
        assert_eq!(args.iter().map(path).collect::<Vec<_>>(), vec!["_this.x", "_this"]);
    }

    #[test]
    fn test_write_back_before_return() {
        let (module, arena) = lifted(
            "MODULE M; \
             PROCEDURE F(VAR v: INTEGER): INTEGER; \
               PROCEDURE G; BEGIN INC(v) END G; \
             BEGIN G; IF v > 10 THEN RETURN 1 END; RETURN 0 END F; \
             END M.",
        );
        let statements = body(&arena, module.block.procedures[0]);
        let StatementKind::If { then, .. } = &statements[2].kind else {
            panic!("if expected");
        };
        assert_eq!(assignment(&then[0]).0, "v");
        assert!(matches!(then[1].kind, StatementKind::Return(Some(_))));
        assert_eq!(assignment(&statements[3]).0, "v");
        assert!(matches!(statements.last().unwrap().kind, StatementKind::Return(Some(_))));
    }

    #[test]
    fn test_leaf_procedures_untouched() {
        let source = "MODULE M; VAR g: INTEGER; PROCEDURE P(x: INTEGER); VAR y: INTEGER; BEGIN y := x + g END P; END M.";
        let output = analyze(source);
        assert_eq!(errors(&output), Vec::<String>::new());
        let (module, arena) = lifted(source);
        assert_eq!(names(&arena, &module.block.procedures), vec!["P"]);
        assert!(module.block.types.is_empty());
        assert_eq!(body(&arena, module.block.procedures[0]), body(&output.arena, output.module.unwrap().block.procedures[0]));
    }

    #[test]
    fn test_parent_without_locals() {
        let (module, arena) = lifted(
            "MODULE M; VAR g: INTEGER; PROCEDURE P; PROCEDURE Q; BEGIN g := 1 END Q; BEGIN Q END P; END M.",
        );
        assert!(module.block.types.is_empty());
        assert_eq!(names(&arena, &module.block.procedures), vec!["P", "_P_Q"]);
        let ty = arena.decl(module.block.procedures[1]).ty;
        assert!(arena.ty(ty).as_procedure().unwrap().params.is_empty());
    }

    #[test]
    fn test_unresolvable_field() {
        let mut arena = Arena::new();
        let mut lifter = LambdaLifter::new(&mut arena, "M");
        let field = lifter.new_decl("x", DeclKind::Field { index: 0 }, TypeId::INTEGER, MODULE_LEVEL + 1);
        let record = lifter.arena.add_type(
            TypeKind::Record(RecordType { fields: vec![], base: None, level: 0 }),
            Span::default(),
        );
        let env = lifter.new_decl(THIS, DeclKind::Variable { index: 0 }, record, MODULE_LEVEL + 1);
        let error = lifter.field_path(Env { decl: env, record }, field).unwrap_err();
        assert!(matches!(error, CompileError::Internal { .. }));
    }
}
