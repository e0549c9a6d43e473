//! Per-module storage for types and declarations
//!
//! Types and declarations are created once and never freed individually;
//! the tree refers to them through [`TypeId`] and [`DeclId`] handles.

use super::decl::Decl;
use crate::common::Span;
use crate::types::{ArrayType, BasicKind, Type, TypeId, TypeKind, VirtualKind};

/// Handle into the declaration arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    types: Vec<Type>,
    decls: Vec<Decl>,
}

impl Arena {
    /// Create an arena holding the predefined basic and virtual types.
    pub fn new() -> Self {
        let mut types = Vec::with_capacity(64);
        for kind in BasicKind::ALL {
            types.push(Type::new(TypeKind::Basic(kind), Span::default()));
        }
        for kind in VirtualKind::ALL {
            types.push(Type::new(TypeKind::Virtual(kind), Span::default()));
        }
        Self { types, decls: Vec::new() }
    }

    // ========================================================================
    // Storage
    // ========================================================================

    pub fn add_type(&mut self, kind: TypeKind, span: Span) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::new(kind, span));
        id
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    /// Type of a declaration.
    pub fn decl_type(&self, id: DeclId) -> &Type {
        self.ty(self.decl(id).ty)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Build a (possibly multi-dimensional) array type. A leading zero
    /// length makes it an open array.
    pub fn add_array(&mut self, lengths: Vec<u32>, member: TypeId, span: Span) -> TypeId {
        let mut types = vec![member];
        for dim in (1..lengths.len()).rev() {
            let sub = ArrayType { lengths: lengths[dim..].to_vec(), types: types.clone() };
            let id = self.add_type(TypeKind::Array(sub), span);
            types.insert(0, id);
        }
        self.add_type(TypeKind::Array(ArrayType { lengths, types }), span)
    }

    /// Open array with `dimensions` unknown lengths.
    pub fn add_open_array(&mut self, dimensions: usize, member: TypeId, span: Span) -> TypeId {
        self.add_array(vec![0; dimensions.max(1)], member, span)
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Record or pointer-to-record extension test. Every type extends itself.
    pub fn extends(&self, actual: TypeId, base: TypeId) -> bool {
        if actual == base {
            return true;
        }
        match (&self.ty(actual).kind, &self.ty(base).kind) {
            (TypeKind::Record(_), TypeKind::Record(_)) => {
                let mut current = self.record_base(actual);
                while let Some(id) = current {
                    if id == base {
                        return true;
                    }
                    current = self.record_base(id);
                }
                false
            }
            (TypeKind::Pointer(lhs), TypeKind::Pointer(rhs)) => match (lhs.base, rhs.base) {
                (Some(lhs), Some(rhs)) => self.extends(lhs, rhs),
                _ => false,
            },
            _ => false,
        }
    }

    fn record_base(&self, id: TypeId) -> Option<TypeId> {
        self.ty(id).as_record().and_then(|record| record.base)
    }

    /// Look up a field in a record, walking the extension chain.
    pub fn find_field(&self, record: TypeId, name: &str) -> Option<DeclId> {
        let mut current = Some(record);
        while let Some(id) = current {
            let rec = self.ty(id).as_record()?;
            if let Some(field) = rec.fields.iter().copied().find(|f| self.decl(*f).name == name) {
                return Some(field);
            }
            current = rec.base;
        }
        None
    }

    /// Size in bytes. Open arrays and virtual types have no static size.
    pub fn size_of(&self, id: TypeId) -> u32 {
        let ty = self.ty(id);
        match &ty.kind {
            TypeKind::Basic(kind) => kind.size(),
            TypeKind::Virtual(_) => 0,
            TypeKind::Array(array) => {
                if array.is_open() {
                    return 0;
                }
                array.lengths.iter().product::<u32>().saturating_mul(self.size_of(array.member()))
            }
            TypeKind::Record(record) => {
                let own: u32 = record.fields.iter().map(|f| self.size_of(self.decl(*f).ty)).sum();
                own + record.base.map_or(0, |base| self.size_of(base))
            }
            TypeKind::Pointer(_) | TypeKind::Procedure(_) => 8,
        }
    }

    /// Two types declared under the same module-qualified name.
    pub fn same_identifier(&self, lhs: TypeId, rhs: TypeId) -> bool {
        match (self.ty(lhs).decl, self.ty(rhs).decl) {
            (Some(lhs), Some(rhs)) => {
                let (lhs, rhs) = (self.decl(lhs), self.decl(rhs));
                lhs.name == rhs.name && lhs.module == rhs.module
            }
            _ => false,
        }
    }

    /// Type name for diagnostics.
    pub fn type_name(&self, id: TypeId) -> String {
        self.format_type(id, false)
    }

    pub fn format_type(&self, id: TypeId, is_ptr: bool) -> String {
        let ty = self.ty(id);
        let text = if let Some(decl) = ty.decl {
            self.decl(decl).name.clone()
        } else {
            match &ty.kind {
                TypeKind::Basic(kind) => kind.name().to_string(),
                TypeKind::Virtual(kind) => kind.name().to_string(),
                TypeKind::Array(array) => {
                    if array.is_open() {
                        format!("{}{}", "ARRAY OF ".repeat(array.dimensions()), self.type_name(array.member()))
                    } else {
                        let lengths: Vec<String> = array.lengths.iter().map(u32::to_string).collect();
                        format!("ARRAY {} OF {}", lengths.join(", "), self.type_name(array.member()))
                    }
                }
                TypeKind::Record(_) => "RECORD".to_string(),
                TypeKind::Pointer(pointer) => match pointer.base {
                    Some(base) => format!("POINTER TO {}", self.type_name(base)),
                    None => "POINTER".to_string(),
                },
                TypeKind::Procedure(_) => "PROCEDURE".to_string(),
            }
        };
        if is_ptr { format!("POINTER TO {}", text) } else { text }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, DeclKind};
    use crate::types::{PointerType, RecordType};
    use pretty_assertions::assert_eq;

    fn record(arena: &mut Arena, name: &str, base: Option<TypeId>, level: u32) -> TypeId {
        let id = arena.add_type(
            TypeKind::Record(RecordType { fields: vec![], base, level }),
            Span::default(),
        );
        let decl = arena.add_decl(Decl::new(name, DeclKind::Type, id, Span::default()));
        arena.ty_mut(id).decl = Some(decl);
        id
    }

    #[test]
    fn test_predefined_types() {
        let arena = Arena::new();
        assert_eq!(arena.type_count(), TypeId::PREDEFINED as usize);
        assert!(arena.ty(TypeId::LONGINT).is_integer());
        assert!(arena.ty(TypeId::NUMERIC).is_virtual_numeric());
        assert_eq!(arena.type_name(TypeId::NO_TYPE), "undefined type");
    }

    #[test]
    fn test_multi_dimensional_array() {
        let mut arena = Arena::new();
        let id = arena.add_array(vec![10, 20], TypeId::INTEGER, Span::default());
        let array = arena.ty(id).as_array().cloned().unwrap();
        assert_eq!(array.dimensions(), 2);
        assert_eq!(array.member(), TypeId::INTEGER);
        let row = arena.ty(array.types[0]).as_array().unwrap();
        assert_eq!(row.lengths, vec![20]);
        assert_eq!(arena.type_name(id), "ARRAY 10, 20 OF INTEGER");
        assert_eq!(arena.size_of(id), 800);
    }

    #[test]
    fn test_extension_chain() {
        let mut arena = Arena::new();
        let a = record(&mut arena, "A", None, 0);
        let b = record(&mut arena, "B", Some(a), 1);
        let c = record(&mut arena, "C", Some(b), 2);
        assert!(arena.extends(c, a));
        assert!(arena.extends(c, b));
        assert!(!arena.extends(a, c));
        let pa = arena.add_type(TypeKind::Pointer(PointerType { base: Some(a) }), Span::default());
        let pc = arena.add_type(TypeKind::Pointer(PointerType { base: Some(c) }), Span::default());
        assert!(arena.extends(pc, pa));
        assert_eq!(arena.format_type(a, true), "POINTER TO A");
        assert_eq!(arena.type_name(pc), "POINTER TO C");
    }
}
