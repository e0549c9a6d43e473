//! Module interfaces
//!
//! A [`ModuleInterface`] is an owned snapshot of what a module exports:
//! its exported declarations plus a table of the type structures they
//! refer to. Snapshots outlive the arena they were taken from, so later
//! modules of the same compilation run can import them through an
//! [`InterfaceLibrary`].

use std::collections::HashMap;

use crate::ast::{Arena, CallingConvention, Decl, DeclId, DeclKind, External, Literal, Module, Procedure};
use crate::common::Span;
use crate::sema::{SymbolTable, MODULE_LEVEL};
use crate::types::{PointerType, ProcedureType, RecordType, TypeId, TypeKind};

/// Source of declarations for imported modules, consulted by the analyzer
/// once per module name.
pub trait SymbolImporter {
    /// Enter the exports of `module` into `arena` and `symbols`. Returns
    /// false if the module is unknown.
    fn import(&self, module: &str, arena: &mut Arena, symbols: &mut SymbolTable) -> bool;
}

/// Reference to a type of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    /// Predefined type, valid in every arena
    Predefined(TypeId),
    /// Index into [`ModuleInterface::types`]
    Local(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceField {
    pub name: String,
    pub exported: bool,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceParam {
    pub name: String,
    pub is_var: bool,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceTypeKind {
    Array { lengths: Vec<u32>, member: TypeRef },
    Record { base: Option<TypeRef>, fields: Vec<InterfaceField> },
    Pointer { base: Option<TypeRef> },
    Procedure { params: Vec<InterfaceParam>, ret: Option<TypeRef>, variadic: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    /// Name of the declaring type and its module, if the type is named
    pub name: Option<(String, String)>,
    pub kind: InterfaceTypeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportKind {
    Constant(Literal),
    Type,
    Variable,
    Procedure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedDecl {
    pub name: String,
    pub kind: ExportKind,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInterface {
    pub name: String,
    /// Exported declarations in declaration order
    pub decls: Vec<ExportedDecl>,
    pub types: Vec<InterfaceType>,
}

impl ModuleInterface {
    pub fn find(&self, name: &str) -> Option<&ExportedDecl> {
        self.decls.iter().find(|decl| decl.name == name)
    }
}

// ============================================================================
// Export
// ============================================================================

/// Snapshot the exported declarations of an analyzed module.
pub fn export(module: &Module, arena: &Arena) -> ModuleInterface {
    let block = &module.block;
    let mut ids: Vec<DeclId> = block
        .constants
        .iter()
        .chain(&block.types)
        .chain(&block.variables)
        .chain(&block.procedures)
        .copied()
        .filter(|id| arena.decl(*id).exported)
        .collect();
    ids.sort();

    let mut exporter = Exporter { arena, types: Vec::new(), seen: HashMap::new() };
    let mut decls = Vec::with_capacity(ids.len());
    for id in ids {
        let decl = arena.decl(id);
        let kind = match &decl.kind {
            DeclKind::Constant(Some(value)) => ExportKind::Constant(value.clone()),
            DeclKind::Type => ExportKind::Type,
            DeclKind::Variable { .. } => ExportKind::Variable,
            DeclKind::Procedure(_) => ExportKind::Procedure,
            _ => continue,
        };
        let ty = exporter.type_ref(decl.ty);
        decls.push(ExportedDecl { name: decl.name.clone(), kind, ty });
    }
    tracing::debug!(module = %module.name, decls = decls.len(), types = exporter.types.len(), "exported interface");
    ModuleInterface { name: module.name.clone(), decls, types: exporter.types }
}

struct Exporter<'a> {
    arena: &'a Arena,
    types: Vec<InterfaceType>,
    seen: HashMap<TypeId, usize>,
}

impl Exporter<'_> {
    fn type_ref(&mut self, id: TypeId) -> TypeRef {
        if id.0 < TypeId::PREDEFINED {
            return TypeRef::Predefined(id);
        }
        if let Some(index) = self.seen.get(&id) {
            return TypeRef::Local(*index);
        }
        let ty = self.arena.ty(id);
        let name = ty.decl.map(|decl| self.arena.decl(decl)).and_then(|decl| {
            let module = decl.module.clone()?;
            Some((decl.name.clone(), module))
        });
        // Reserve the slot first so recursive pointer types refer back to it.
        let index = self.types.len();
        self.seen.insert(id, index);
        self.types.push(InterfaceType { name, kind: InterfaceTypeKind::Pointer { base: None } });

        let kind = match &ty.kind {
            TypeKind::Array(array) => InterfaceTypeKind::Array {
                lengths: array.lengths.clone(),
                member: self.type_ref(array.member()),
            },
            TypeKind::Record(record) => InterfaceTypeKind::Record {
                base: record.base.map(|base| self.type_ref(base)),
                fields: record
                    .fields
                    .iter()
                    .map(|field| {
                        let field = self.arena.decl(*field);
                        InterfaceField { name: field.name.clone(), exported: field.exported, ty: self.type_ref(field.ty) }
                    })
                    .collect(),
            },
            TypeKind::Pointer(pointer) => InterfaceTypeKind::Pointer { base: pointer.base.map(|base| self.type_ref(base)) },
            TypeKind::Procedure(procedure) => InterfaceTypeKind::Procedure {
                params: procedure
                    .params
                    .iter()
                    .map(|param| {
                        let param = self.arena.decl(*param);
                        InterfaceParam {
                            name: param.name.clone(),
                            is_var: param.is_var_parameter(),
                            ty: self.type_ref(param.ty),
                        }
                    })
                    .collect(),
                ret: procedure.ret.map(|ret| self.type_ref(ret)),
                variadic: procedure.variadic,
            },
            // Only predefined types are basic or virtual.
            TypeKind::Basic(_) | TypeKind::Virtual(_) => return TypeRef::Predefined(TypeId::NO_TYPE),
        };
        self.types[index].kind = kind;
        TypeRef::Local(index)
    }
}

// ============================================================================
// Import
// ============================================================================

/// Rebuild an interface inside `arena` and enter its declarations into the
/// module scope `interface.name`.
pub fn import_interface(interface: &ModuleInterface, arena: &mut Arena, symbols: &mut SymbolTable) {
    let mut importer = Importer { interface, arena, ids: vec![None; interface.types.len()] };
    symbols.add_module(&interface.name);
    for export in &interface.decls {
        let ty = importer.type_id(export.ty);
        let id = match &export.kind {
            ExportKind::Type => match importer.arena.ty(ty).decl {
                Some(decl) if ty.0 >= TypeId::PREDEFINED && importer.arena.decl(decl).name == export.name => decl,
                _ => importer.add_decl(&export.name, DeclKind::Type, ty),
            },
            ExportKind::Constant(value) => importer.add_decl(&export.name, DeclKind::Constant(Some(value.clone())), ty),
            ExportKind::Variable => importer.add_decl(&export.name, DeclKind::Variable { index: 0 }, ty),
            ExportKind::Procedure => {
                let external = External {
                    convention: CallingConvention::Olang,
                    name: format!("{}_{}", interface.name, export.name),
                };
                let procedure = Procedure { external: Some(external), ..Procedure::default() };
                importer.add_decl(&export.name, DeclKind::Procedure(Box::new(procedure)), ty)
            }
        };
        symbols.import(&interface.name, &export.name, id);
    }
    tracing::debug!(module = %interface.name, decls = interface.decls.len(), "imported interface");
}

struct Importer<'a> {
    interface: &'a ModuleInterface,
    arena: &'a mut Arena,
    ids: Vec<Option<TypeId>>,
}

impl Importer<'_> {
    fn add_decl(&mut self, name: &str, kind: DeclKind, ty: TypeId) -> DeclId {
        let mut decl = Decl::new(name, kind, ty, Span::default());
        decl.exported = true;
        decl.external = true;
        decl.level = MODULE_LEVEL;
        decl.module = Some(self.interface.name.clone());
        self.arena.add_decl(decl)
    }

    fn type_id(&mut self, reference: TypeRef) -> TypeId {
        let index = match reference {
            TypeRef::Predefined(id) => return id,
            TypeRef::Local(index) => index,
        };
        if let Some(id) = self.ids.get(index).copied().flatten() {
            return id;
        }
        let Some(entry) = self.interface.types.get(index) else {
            return TypeId::NO_TYPE;
        };
        let id = match &entry.kind {
            InterfaceTypeKind::Array { lengths, member } => {
                let member = self.type_id(*member);
                self.arena.add_array(lengths.clone(), member, Span::default())
            }
            InterfaceTypeKind::Pointer { base } => {
                let id = self.arena.add_type(TypeKind::Pointer(PointerType { base: None }), Span::default());
                self.ids[index] = Some(id);
                let base = base.map(|base| self.type_id(base));
                if let TypeKind::Pointer(pointer) = &mut self.arena.ty_mut(id).kind {
                    pointer.base = base;
                }
                id
            }
            InterfaceTypeKind::Record { base, fields } => {
                let record = RecordType { fields: Vec::new(), base: None, level: 0 };
                let id = self.arena.add_type(TypeKind::Record(record), Span::default());
                self.ids[index] = Some(id);
                let base = base.map(|base| self.type_id(base));
                let level = base
                    .and_then(|base| self.arena.ty(base).as_record().map(|record| record.level + 1))
                    .unwrap_or(0);
                let mut ids = Vec::with_capacity(fields.len());
                for (index, field) in fields.iter().enumerate() {
                    let ty = self.type_id(field.ty);
                    let id = self.add_decl(&field.name, DeclKind::Field { index }, ty);
                    self.arena.decl_mut(id).exported = field.exported;
                    ids.push(id);
                }
                if let TypeKind::Record(record) = &mut self.arena.ty_mut(id).kind {
                    record.fields = ids;
                    record.base = base;
                    record.level = level;
                }
                id
            }
            InterfaceTypeKind::Procedure { params, ret, variadic } => {
                let mut ids = Vec::with_capacity(params.len());
                for (index, param) in params.iter().enumerate() {
                    let ty = self.type_id(param.ty);
                    let kind = DeclKind::Parameter { is_var: param.is_var, index };
                    ids.push(self.add_decl(&param.name, kind, ty));
                }
                let procedure = ProcedureType { params: ids, ret: ret.map(|ret| self.type_id(ret)), variadic: *variadic };
                self.arena.add_type(TypeKind::Procedure(procedure), Span::default())
            }
        };
        self.ids[index] = Some(id);
        if let Some((name, module)) = &entry.name {
            let mut decl = Decl::new(name.as_str(), DeclKind::Type, id, Span::default());
            decl.external = true;
            decl.level = MODULE_LEVEL;
            decl.module = Some(module.clone());
            let decl = self.arena.add_decl(decl);
            self.arena.ty_mut(id).decl = Some(decl);
        }
        id
    }
}

/// Interfaces of the modules compiled so far, keyed by module name
#[derive(Debug, Default)]
pub struct InterfaceLibrary {
    interfaces: HashMap<String, ModuleInterface>,
}

impl InterfaceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, interface: ModuleInterface) {
        self.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn get(&self, name: &str) -> Option<&ModuleInterface> {
        self.interfaces.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl SymbolImporter for InterfaceLibrary {
    fn import(&self, module: &str, arena: &mut Arena, symbols: &mut SymbolTable) -> bool {
        match self.interfaces.get(module) {
            Some(interface) => {
                import_interface(interface, arena, symbols);
                true
            }
            None => false,
        }
    }
}
