//! Semantic analyzer - declarations, types and scopes
//!
//! The parser drives the analyzer through `on_*` hooks, one per grammar
//! production. Each hook validates its input, logs diagnostics and
//! returns a resolved node. Hooks never abort: invalid input yields the
//! `NO_TYPE` sentinel or `None` and analysis continues.

use super::fold::ConstantFolder;
use super::symtab::{SymbolTable, MODULE_LEVEL};
use super::system::System;
use crate::ast::{
    Arena, Block, CallingConvention, Decl, DeclId, DeclKind, Expr, External, Ident, IdentDef,
    Import, Literal, Module, Procedure, QualIdent,
};
use crate::common::{Logger, Span};
use crate::frontend::CompilerConfig;
use crate::interface::SymbolImporter;
use crate::types::{PointerType, ProcedureType, RecordType, TypeId, TypeKind};

/// Pointer type whose base was named before it was declared.
#[derive(Debug)]
struct ForwardRef {
    pointer: TypeId,
    ident: QualIdent,
    /// Scope level of the declaring block
    level: u32,
}

/// State of the innermost CASE statement.
#[derive(Debug)]
pub(crate) struct CaseContext {
    pub(crate) ty: TypeId,
    /// Case variable of a type case.
    pub(crate) decl: Option<DeclId>,
    /// Declared type of the case variable, restored after every arm.
    pub(crate) saved: TypeId,
}

pub struct Analyzer<'a> {
    pub(crate) arena: Arena,
    pub(crate) symbols: SymbolTable,
    pub(crate) logger: Logger,
    pub(crate) system: System,
    pub(crate) config: CompilerConfig,
    importer: Option<&'a dyn SymbolImporter>,
    pub(crate) module: String,
    /// Enclosing procedure definitions, innermost last.
    pub(crate) procedures: Vec<DeclId>,
    forwards: Vec<ForwardRef>,
    pub(crate) loops: usize,
    pub(crate) cases: Vec<CaseContext>,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: CompilerConfig, importer: Option<&'a dyn SymbolImporter>) -> Self {
        let mut arena = Arena::new();
        let mut symbols = SymbolTable::new();
        let system = System::install(&mut arena, &mut symbols);
        let logger = Logger::new().with_warnings_as_errors(config.warnings_as_errors);
        Self {
            arena,
            symbols,
            logger,
            system,
            config,
            importer,
            module: String::new(),
            procedures: Vec::new(),
            forwards: Vec::new(),
            loops: 0,
            cases: Vec::new(),
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn into_parts(self) -> (Arena, Logger) {
        (self.arena, self.logger)
    }

    pub(crate) fn folder(&mut self) -> ConstantFolder<'_> {
        ConstantFolder::new(&self.arena, &mut self.logger)
    }

    /// Name resolves through the scope chain, used by the parser to tell
    /// `M.x` from `r.f`.
    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.lookup_local(name).is_some()
    }

    pub fn is_declared(&self, ident: &QualIdent) -> bool {
        self.symbols.lookup(ident).is_some()
    }

    pub fn is_constant(&self, ident: &QualIdent) -> bool {
        self.symbols.lookup(ident).is_some_and(|decl| self.arena.decl(decl).is_constant())
    }

    // ========================================================================
    // Modules and scopes
    // ========================================================================

    pub fn on_module_start(&mut self, ident: Ident) -> Module {
        tracing::debug!(module = %ident.name, "analyzing module");
        self.symbols.enter_module(&ident.name);
        self.module = ident.name.clone();
        self.procedures.clear();
        self.forwards.clear();
        Module::new(ident.name, ident.span)
    }

    pub fn on_module_end(&mut self, module: &Module, ident: &Ident) {
        if module.name != ident.name {
            let message = format!("module name mismatch: expected {}, found {}.", module.name, ident.name);
            self.logger.error(ident.span, message);
        }
    }

    pub fn on_import(&mut self, span: Span, alias: Option<Ident>, ident: Ident, imports: &[Import]) -> Option<Import> {
        let name = ident.name;
        if imports.iter().any(|import| import.module == name) {
            self.logger.error(span, format!("duplicate import of module {}.", name));
            return None;
        }
        if name == self.module {
            self.logger.error(span, format!("module {} must not import itself.", name));
            return None;
        }
        if !self.symbols.has_module(&name) {
            let imported = self
                .importer
                .is_some_and(|importer| importer.import(&name, &mut self.arena, &mut self.symbols));
            if !imported {
                self.logger.error(span, format!("module {} could not be imported.", name));
                return None;
            }
        }
        let alias = alias.map_or_else(|| name.clone(), |alias| alias.name);
        self.symbols.add_alias(&alias, &name);
        Some(Import { alias, module: name, span })
    }

    pub fn on_block_start(&mut self) {
        self.symbols.open_scope();
    }

    pub fn on_block_end(&mut self) {
        self.symbols.close_scope();
    }

    /// Resolve the forward pointer references of the current block. Called
    /// after its TYPE and VAR sections, before any nested procedure.
    pub fn on_declarations(&mut self) {
        let level = self.symbols.level();
        while self.forwards.last().is_some_and(|forward| forward.level >= level) {
            let Some(forward) = self.forwards.pop() else {
                break;
            };
            let span = forward.ident.span;
            match self.symbols.lookup(&forward.ident) {
                Some(decl) if self.arena.decl(decl).is_type() => {
                    let base = self.arena.decl(decl).ty;
                    tracing::debug!(ident = %forward.ident, "resolving forward reference");
                    if !self.arena.ty(base).is_record() {
                        self.logger.error(span, "pointer base type must be a record type.");
                    }
                    self.set_pointer_base(forward.pointer, base);
                }
                _ => self.logger.error(span, "undefined forward reference."),
            }
        }
    }

    fn set_pointer_base(&mut self, pointer: TypeId, base: TypeId) {
        if let TypeKind::Pointer(ptr) = &mut self.arena.ty_mut(pointer).kind {
            ptr.base = Some(base);
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn new_decl(&mut self, ident: &IdentDef, kind: DeclKind, ty: TypeId) -> DeclId {
        let mut decl = Decl::new(&ident.name, kind, ty, ident.span);
        decl.exported = ident.exported;
        decl.level = self.symbols.level();
        decl.module = Some(self.module.clone());
        self.arena.add_decl(decl)
    }

    /// Enter a declaration into the current scope, reporting clashes.
    fn assert_unique(&mut self, name: &str, span: Span, decl: DeclId) {
        if self.symbols.is_duplicate(name) {
            self.logger.error(span, format!("duplicate definition: {}.", name));
        } else if self.symbols.is_global(name) {
            self.logger.error(span, format!("predefined identifier: {}.", name));
        }
        self.symbols.insert(name, decl);
    }

    fn check_export(&mut self, id: DeclId) {
        let decl = self.arena.decl(id);
        if decl.exported {
            if decl.level != MODULE_LEVEL {
                self.logger.error(decl.span, "only top-level declarations can be exported.");
            }
            return;
        }
        if !decl.is_type() {
            return;
        }
        let Some(record) = self.arena.ty(decl.ty).as_record() else {
            return;
        };
        let exported: Vec<Span> = record
            .fields
            .iter()
            .map(|field| self.arena.decl(*field))
            .filter(|field| field.exported)
            .map(|field| field.span)
            .collect();
        for span in exported {
            self.logger.error(span, "cannot export fields of non-exported record type.");
        }
    }

    pub fn on_constant(&mut self, ident: IdentDef, value: Option<Expr>) -> DeclId {
        let (literal, ty) = match value {
            // Constant operands fold as they are parsed, anything left
            // unfolded already failed or is not constant.
            Some(expr) => match expr.as_literal() {
                Some(value) => (Some(value.clone()), expr.ty),
                None if expr.is_constant() => {
                    self.logger.error(expr.span, "undefined constant.");
                    (None, TypeId::NO_TYPE)
                }
                None => {
                    self.logger.error(expr.span, "value must be constant.");
                    (None, TypeId::NO_TYPE)
                }
            },
            None => {
                self.logger.error(ident.span, "undefined constant.");
                (None, TypeId::NO_TYPE)
            }
        };
        let id = self.new_decl(&ident, DeclKind::Constant(literal), ty);
        self.assert_unique(&ident.name, ident.span, id);
        self.check_export(id);
        id
    }

    pub fn on_type(&mut self, ident: IdentDef, ty: Option<TypeId>) -> DeclId {
        let ty = ty.unwrap_or(TypeId::NO_TYPE);
        let id = self.new_decl(&ident, DeclKind::Type, ty);
        self.assert_unique(&ident.name, ident.span, id);
        if ty.0 >= TypeId::PREDEFINED && self.arena.ty(ty).decl.is_none() {
            self.arena.ty_mut(ty).decl = Some(id);
        }
        self.check_export(id);
        id
    }

    pub fn on_variable(&mut self, ident: IdentDef, ty: Option<TypeId>, index: usize) -> DeclId {
        let ty = ty.unwrap_or_else(|| {
            self.logger.error(ident.span, "undefined variable type.");
            TypeId::NO_TYPE
        });
        let id = self.new_decl(&ident, DeclKind::Variable { index }, ty);
        self.assert_unique(&ident.name, ident.span, id);
        self.check_export(id);
        id
    }

    /// Record fields are not entered into any scope.
    pub fn on_field(&mut self, ident: IdentDef, ty: Option<TypeId>, index: usize) -> DeclId {
        let ty = ty.unwrap_or_else(|| {
            self.logger.error(ident.span, "undefined record field type.");
            TypeId::NO_TYPE
        });
        self.new_decl(&ident, DeclKind::Field { index }, ty)
    }

    pub fn on_parameter(&mut self, ident: Ident, is_var: bool, ty: Option<TypeId>, index: usize) -> DeclId {
        let ty = ty.unwrap_or_else(|| {
            self.logger.error(ident.span, "undefined parameter type.");
            TypeId::NO_TYPE
        });
        let def = IdentDef::new(ident.name, false, ident.span);
        let id = self.new_decl(&def, DeclKind::Parameter { is_var, index }, ty);
        self.assert_unique(&def.name, def.span, id);
        id
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub fn on_array_type(&mut self, span: Span, dimensions: Vec<Option<Expr>>, member: Option<TypeId>) -> TypeId {
        let mut lengths = Vec::with_capacity(dimensions.len());
        let mut valid = true;
        for dimension in dimensions {
            let Some(expr) = dimension else {
                valid = false;
                continue;
            };
            if !expr.is_constant() {
                self.logger.error(expr.span, "constant expression expected.");
                valid = false;
                continue;
            }
            let value = self.folder().fold(&expr);
            match value {
                Some(Literal::Integer(value)) if value > 0 => match u32::try_from(value) {
                    Ok(length) => lengths.push(length),
                    Err(_) => {
                        self.logger.error(expr.span, "array dimension must be a positive value.");
                        valid = false;
                    }
                },
                Some(Literal::Integer(_)) => {
                    self.logger.error(expr.span, "array dimension must be a positive value.");
                    valid = false;
                }
                Some(_) => {
                    self.logger.error(expr.span, "integer expression expected.");
                    valid = false;
                }
                None => {
                    self.logger.error(expr.span, "constant integer expression expected.");
                    valid = false;
                }
            }
        }
        let Some(member) = member else {
            self.logger.error(span, "undefined array member type.");
            return TypeId::NO_TYPE;
        };
        if !valid {
            return TypeId::NO_TYPE;
        }
        let member_ty = self.arena.ty(member);
        if let (Some(nested), None) = (member_ty.as_array(), member_ty.decl) {
            if !nested.is_open() {
                self.logger.warning(span, "nested array found, use multi-dimensional array instead.");
                lengths.extend_from_slice(&nested.lengths);
                let inner = nested.member();
                return self.arena.add_array(lengths, inner, span);
            }
        }
        self.arena.add_array(lengths, member, span)
    }

    pub fn on_record_type(&mut self, span: Span, base: Option<QualIdent>, fields: Vec<DeclId>) -> TypeId {
        let mut base_type = None;
        if let Some(ident) = base {
            match self.symbols.lookup(&ident) {
                Some(decl) if self.arena.decl(decl).is_type() => {
                    let ty = self.arena.decl(decl).ty;
                    if self.arena.ty(ty).is_record() {
                        base_type = Some(ty);
                    } else {
                        self.logger.error(ident.span, "base type must be a record type.");
                    }
                }
                _ => self.logger.error(ident.span, format!("undefined type: {}.", ident)),
            }
        }
        let mut names: Vec<&str> = Vec::new();
        let mut errors = Vec::new();
        for field in &fields {
            let decl = self.arena.decl(*field);
            if base_type.is_some_and(|base| self.arena.find_field(base, &decl.name).is_some()) {
                errors.push((decl.span, format!("redefinition of record field: {}.", decl.name)));
            } else if names.contains(&decl.name.as_str()) {
                errors.push((decl.span, format!("duplicate record field: {}.", decl.name)));
            } else {
                names.push(&decl.name);
            }
        }
        for (span, message) in errors {
            self.logger.error(span, message);
        }
        let level = base_type
            .and_then(|base| self.arena.ty(base).as_record())
            .map_or(0, |record| record.level + 1);
        self.arena.add_type(TypeKind::Record(RecordType { fields, base: base_type, level }), span)
    }

    pub fn on_pointer_type_start(&mut self, span: Span) -> TypeId {
        self.arena.add_type(TypeKind::Pointer(PointerType { base: None }), span)
    }

    pub fn on_pointer_type_end(&mut self, span: Span, pointer: TypeId, base: Option<TypeId>) -> TypeId {
        let Some(base) = base else {
            return pointer;
        };
        if base == TypeId::NO_TYPE {
            return pointer;
        }
        if !self.arena.ty(base).is_record() {
            self.logger.error(span, "pointer base type must be a record type.");
        }
        self.set_pointer_base(pointer, base);
        pointer
    }

    /// Pointer to a type that is not declared yet. Resolved by the next
    /// call to [`Analyzer::on_declarations`].
    pub fn on_pointer_forward(&mut self, pointer: TypeId, ident: QualIdent) -> TypeId {
        self.logger.debug(ident.span, format!("Found possible forward type reference: {}.", ident));
        let level = self.symbols.level();
        self.forwards.push(ForwardRef { pointer, ident, level });
        pointer
    }

    pub fn on_procedure_type(
        &mut self,
        span: Span,
        params: Vec<DeclId>,
        variadic: bool,
        ret: Option<TypeId>,
    ) -> TypeId {
        let ret = ret.filter(|ret| {
            let structured = self.arena.ty(*ret).is_structured();
            if structured {
                self.logger.error(span, "result type of a procedure can neither be a record nor an array.");
            }
            !structured
        });
        self.arena.add_type(TypeKind::Procedure(ProcedureType { params, ret, variadic }), span)
    }

    pub fn on_type_reference(&mut self, ident: &QualIdent, dimensions: usize) -> TypeId {
        let Some(decl) = self.symbols.lookup(ident) else {
            self.logger.error(ident.span, format!("undefined type: {}.", ident));
            return TypeId::NO_TYPE;
        };
        if !self.arena.decl(decl).is_type() {
            self.logger.error(ident.span, format!("{} is not a type.", ident));
            return TypeId::NO_TYPE;
        }
        let ty = self.arena.decl(decl).ty;
        if dimensions == 0 || ty == TypeId::NO_TYPE {
            return ty;
        }
        self.arena.add_open_array(dimensions, ty, ident.span)
    }

    // ========================================================================
    // Procedures
    // ========================================================================

    /// Declare a procedure and open its scope. Parameters are parsed into
    /// the new scope and the signature attached afterwards.
    pub fn on_procedure_start(&mut self, ident: IdentDef) -> DeclId {
        let id = self.new_decl(&ident, DeclKind::Procedure(Box::default()), TypeId::NO_TYPE);
        self.assert_unique(&ident.name, ident.span, id);
        self.check_export(id);
        self.procedures.push(id);
        self.symbols.open_scope();
        id
    }

    pub fn on_procedure_signature(&mut self, procedure: DeclId, ty: TypeId) {
        self.arena.decl_mut(procedure).ty = ty;
    }

    pub fn on_procedure_end(&mut self, procedure: DeclId, block: Block, ident: &Ident) {
        self.symbols.close_scope();
        self.procedures.pop();
        let decl = self.arena.decl(procedure);
        let has_result = self.arena.ty(decl.ty).as_procedure().is_some_and(|proc| proc.ret.is_some());
        if has_result && !crate::ast::returns(&block.body) {
            self.logger.error(decl.span, "not all control flow paths of the procedure return a result.");
        }
        if decl.name != ident.name {
            let message = format!("procedure name mismatch: expected {}, found {}.", decl.name, ident.name);
            self.logger.error(ident.span, message);
        }
        if let Some(proc) = self.arena.decl_mut(procedure).procedure_mut() {
            proc.block = block;
        }
    }

    pub fn on_external_procedure(
        &mut self,
        ident: IdentDef,
        convention: Option<(String, Span)>,
        ty: TypeId,
        name: Option<String>,
    ) -> DeclId {
        let convention = match convention {
            Some((text, span)) => match text.as_str() {
                "" => {
                    self.logger.warning(span, "no calling convention specified, using default calling convention.");
                    CallingConvention::C
                }
                "C" => CallingConvention::C,
                "OLANG" => CallingConvention::Olang,
                other => {
                    self.logger.error(span, format!("unsupported calling convention: {}.", other));
                    CallingConvention::C
                }
            },
            None => {
                self.logger.warning(ident.span, "no calling convention specified, using default calling convention.");
                CallingConvention::C
            }
        };
        let name = match name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => {
                let message = format!("no external procedure name specified, defaulting to: {}.", ident.name);
                self.logger.warning(ident.span, message);
                ident.name.clone()
            }
        };
        if ident.exported {
            self.logger.error(ident.span, "cannot export external procedures.");
        }
        if self.symbols.level() != MODULE_LEVEL {
            self.logger.error(ident.span, "only top-level procedures can be external.");
        }
        let procedure = Procedure { external: Some(External { convention, name }), ..Procedure::default() };
        let id = self.new_decl(&ident, DeclKind::Procedure(Box::new(procedure)), ty);
        self.arena.decl_mut(id).exported = false;
        self.assert_unique(&ident.name, ident.span, id);
        id
    }

    /// Procedure whose body is being analyzed, `None` in the module body.
    pub(crate) fn current_procedure(&self) -> Option<DeclId> {
        self.procedures.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::sema::tests::{analyze, errors, warnings};
    use crate::types::TypeId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forward_pointer_resolution() {
        let output = analyze(
            "MODULE M; TYPE P = POINTER TO T; T = RECORD f: INTEGER END; VAR p: P; END M.",
        );
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.as_ref().unwrap();
        let p = output.arena.decl(module.block.types[0]).ty;
        let t = output.arena.decl(module.block.types[1]).ty;
        assert_eq!(output.arena.ty(p).as_pointer().unwrap().base, Some(t));
    }

    #[test]
    fn test_undefined_forward_reference() {
        let output = analyze("MODULE M; TYPE P = POINTER TO Undeclared; END M.");
        assert_eq!(errors(&output), vec!["undefined forward reference."]);
        let module = output.module.as_ref().unwrap();
        let p = output.arena.decl(module.block.types[0]).ty;
        assert_eq!(output.arena.ty(p).as_pointer().unwrap().base, None);
    }

    #[test]
    fn test_forward_reference_not_resolved_in_nested_procedure() {
        let output = analyze(
            "MODULE M; TYPE P = POINTER TO T; \
             PROCEDURE Q; TYPE T = RECORD g: INTEGER END; END Q; END M.",
        );
        assert_eq!(errors(&output), vec!["undefined forward reference."]);
    }

    #[test]
    fn test_forward_reference_binds_to_declaring_block() {
        let output = analyze(
            "MODULE M; TYPE P = POINTER TO T; T = RECORD f: INTEGER END; VAR p: P; \
             PROCEDURE Q; TYPE T = RECORD g: CHAR END; VAR r: T; BEGIN r.g := 0X END Q; \
             BEGIN NEW(p); p.f := 1 END M.",
        );
        assert_eq!(errors(&output), Vec::<String>::new());
        let module = output.module.as_ref().unwrap();
        let p = output.arena.decl(module.block.types[0]).ty;
        let t = output.arena.decl(module.block.types[1]).ty;
        assert_eq!(output.arena.ty(p).as_pointer().unwrap().base, Some(t));
    }

    #[test]
    fn test_export_of_record_fields() {
        let output = analyze("MODULE M; TYPE R = RECORD x*: INTEGER END; END M.");
        assert_eq!(errors(&output), vec!["cannot export fields of non-exported record type."]);
        let output = analyze("MODULE M; TYPE R* = RECORD x*: INTEGER END; END M.");
        assert_eq!(errors(&output), Vec::<String>::new());
    }

    #[test]
    fn test_only_top_level_exports() {
        let output = analyze("MODULE M; PROCEDURE P; VAR x*: INTEGER; BEGIN x := 1 END P; END M.");
        assert_eq!(errors(&output), vec!["only top-level declarations can be exported."]);
    }

    #[test]
    fn test_duplicate_and_predefined_names() {
        let output = analyze("MODULE M; VAR x, x: INTEGER; INTEGER: BOOLEAN; END M.");
        assert_eq!(errors(&output), vec!["duplicate definition: x.", "predefined identifier: INTEGER."]);
    }

    #[test]
    fn test_record_extension_levels() {
        let output = analyze(
            "MODULE M; TYPE A = RECORD a: INTEGER END; B = RECORD (A) b: INTEGER END; \
             C = RECORD (B) a: CHAR END; END M.",
        );
        assert_eq!(errors(&output), vec!["redefinition of record field: a."]);
        let module = output.module.as_ref().unwrap();
        let level = |index: usize| {
            let ty = output.arena.decl(module.block.types[index]).ty;
            output.arena.ty(ty).as_record().unwrap().level
        };
        assert_eq!((level(0), level(1), level(2)), (0, 1, 2));
    }

    #[test]
    fn test_array_dimensions() {
        let output = analyze(
            "MODULE M; CONST N = 4; TYPE A = ARRAY N, 2 * N OF INTEGER; B = ARRAY 0 OF CHAR; \
             C = ARRAY 3 OF ARRAY 5 OF CHAR; END M.",
        );
        assert_eq!(errors(&output), vec!["array dimension must be a positive value."]);
        assert_eq!(warnings(&output), vec!["nested array found, use multi-dimensional array instead."]);
        let module = output.module.as_ref().unwrap();
        let a = output.arena.decl(module.block.types[0]).ty;
        assert_eq!(output.arena.ty(a).as_array().unwrap().lengths, vec![4, 8]);
        let c = output.arena.decl(module.block.types[2]).ty;
        assert_eq!(output.arena.ty(c).as_array().unwrap().lengths, vec![3, 5]);
        let b = output.arena.decl(module.block.types[1]).ty;
        assert_eq!(b, TypeId::NO_TYPE);
    }

    #[test]
    fn test_missing_return() {
        let output = analyze(
            "MODULE M; PROCEDURE F(x: INTEGER): INTEGER; BEGIN IF x > 0 THEN RETURN x END END F; END M.",
        );
        assert_eq!(errors(&output), vec!["not all control flow paths of the procedure return a result."]);
    }

    #[test]
    fn test_name_mismatch() {
        let output = analyze("MODULE M; PROCEDURE P; END Q; END N.");
        assert_eq!(
            errors(&output),
            vec!["procedure name mismatch: expected P, found Q.", "module name mismatch: expected M, found N."]
        );
    }
}
