//! Oberon type model
//!
//! Types live in the per-module [`Arena`](crate::ast::Arena) and are
//! referenced by [`TypeId`]. The basic and virtual types are created first
//! so their handles are compile-time constants.

use crate::ast::DeclId;
use crate::common::Span;
use std::fmt;

/// Handle into the type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const BOOLEAN: TypeId = TypeId(0);
    pub const BYTE: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const SHORTINT: TypeId = TypeId(3);
    pub const INTEGER: TypeId = TypeId(4);
    pub const LONGINT: TypeId = TypeId(5);
    pub const REAL: TypeId = TypeId(6);
    pub const LONGREAL: TypeId = TypeId(7);
    pub const SET: TypeId = TypeId(8);
    pub const STRING: TypeId = TypeId(9);

    pub const ANY: TypeId = TypeId(10);
    pub const NO_TYPE: TypeId = TypeId(11);
    pub const NIL: TypeId = TypeId(12);
    pub const ENTIRE: TypeId = TypeId(13);
    pub const FLOATING: TypeId = TypeId(14);
    pub const NUMERIC: TypeId = TypeId(15);
    pub const TYPE: TypeId = TypeId(16);

    /// Number of predefined types allocated by every arena.
    pub const PREDEFINED: u32 = 17;

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar kinds. Order matches the predefined [`TypeId`] constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Boolean,
    Byte,
    Char,
    ShortInt,
    Integer,
    LongInt,
    Real,
    LongReal,
    Set,
    String,
}

impl BasicKind {
    pub const ALL: [BasicKind; 10] = [
        BasicKind::Boolean,
        BasicKind::Byte,
        BasicKind::Char,
        BasicKind::ShortInt,
        BasicKind::Integer,
        BasicKind::LongInt,
        BasicKind::Real,
        BasicKind::LongReal,
        BasicKind::Set,
        BasicKind::String,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Boolean => "BOOLEAN",
            BasicKind::Byte => "BYTE",
            BasicKind::Char => "CHAR",
            BasicKind::ShortInt => "SHORTINT",
            BasicKind::Integer => "INTEGER",
            BasicKind::LongInt => "LONGINT",
            BasicKind::Real => "REAL",
            BasicKind::LongReal => "LONGREAL",
            BasicKind::Set => "SET",
            BasicKind::String => "STRING",
        }
    }

    /// Size in bytes. Strings are pointer-sized.
    pub fn size(self) -> u32 {
        match self {
            BasicKind::Boolean | BasicKind::Byte | BasicKind::Char => 1,
            BasicKind::ShortInt => 2,
            BasicKind::Integer | BasicKind::Real | BasicKind::Set => 4,
            BasicKind::LongInt | BasicKind::LongReal | BasicKind::String => 8,
        }
    }

    pub fn type_id(self) -> TypeId {
        match self {
            BasicKind::Boolean => TypeId::BOOLEAN,
            BasicKind::Byte => TypeId::BYTE,
            BasicKind::Char => TypeId::CHAR,
            BasicKind::ShortInt => TypeId::SHORTINT,
            BasicKind::Integer => TypeId::INTEGER,
            BasicKind::LongInt => TypeId::LONGINT,
            BasicKind::Real => TypeId::REAL,
            BasicKind::LongReal => TypeId::LONGREAL,
            BasicKind::Set => TypeId::SET,
            BasicKind::String => TypeId::STRING,
        }
    }
}

/// Compatibility placeholders used by predefined signatures and as
/// error sentinels. They have no size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    Any,
    NoType,
    Nil,
    Entire,
    Floating,
    Numeric,
    TypeOfType,
}

impl VirtualKind {
    pub const ALL: [VirtualKind; 7] = [
        VirtualKind::Any,
        VirtualKind::NoType,
        VirtualKind::Nil,
        VirtualKind::Entire,
        VirtualKind::Floating,
        VirtualKind::Numeric,
        VirtualKind::TypeOfType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VirtualKind::Any => "ANY",
            VirtualKind::NoType => "undefined type",
            VirtualKind::Nil => "NIL",
            VirtualKind::Entire => "ENTIRE",
            VirtualKind::Floating => "FLOATING",
            VirtualKind::Numeric => "NUMERIC",
            VirtualKind::TypeOfType => "TYPE",
        }
    }
}

/// `types[i]` is the type obtained after applying `i + 1` indices, so the
/// last entry is the member type. An array is open iff `lengths[0] == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub lengths: Vec<u32>,
    pub types: Vec<TypeId>,
}

impl ArrayType {
    pub fn dimensions(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_open(&self) -> bool {
        self.lengths.first().is_none_or(|len| *len == 0)
    }

    pub fn member(&self) -> TypeId {
        self.types.last().copied().unwrap_or(TypeId::NO_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub fields: Vec<DeclId>,
    pub base: Option<TypeId>,
    /// Depth of the extension chain, root records are at level 0.
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerType {
    /// `None` while a forward reference is pending.
    pub base: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureType {
    pub params: Vec<DeclId>,
    pub ret: Option<TypeId>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Basic(BasicKind),
    Virtual(VirtualKind),
    Array(ArrayType),
    Record(RecordType),
    Pointer(PointerType),
    Procedure(ProcedureType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    /// Type declaration naming this type, if any.
    pub decl: Option<DeclId>,
    pub span: Span,
}

impl Type {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, decl: None, span }
    }

    pub fn basic(&self) -> Option<BasicKind> {
        match self.kind {
            TypeKind::Basic(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, TypeKind::Virtual(_))
    }

    pub fn is_virtual_kind(&self, kind: VirtualKind) -> bool {
        matches!(self.kind, TypeKind::Virtual(k) if k == kind)
    }

    pub fn is_boolean(&self) -> bool {
        self.basic() == Some(BasicKind::Boolean)
    }

    pub fn is_byte(&self) -> bool {
        self.basic() == Some(BasicKind::Byte)
    }

    pub fn is_char(&self) -> bool {
        self.basic() == Some(BasicKind::Char)
    }

    pub fn is_string(&self) -> bool {
        self.basic() == Some(BasicKind::String)
    }

    pub fn is_set(&self) -> bool {
        self.basic() == Some(BasicKind::Set)
    }

    /// SHORTINT, INTEGER or LONGINT.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.basic(),
            Some(BasicKind::ShortInt | BasicKind::Integer | BasicKind::LongInt)
        )
    }

    pub fn is_real(&self) -> bool {
        matches!(self.basic(), Some(BasicKind::Real | BasicKind::LongReal))
    }

    /// Integer or BYTE.
    pub fn is_entire(&self) -> bool {
        self.is_integer() || self.is_byte()
    }

    pub fn is_numeric(&self) -> bool {
        self.is_entire() || self.is_real()
    }

    /// Virtual placeholders that accept a family of numeric types.
    pub fn is_virtual_numeric(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Virtual(VirtualKind::Entire | VirtualKind::Floating | VirtualKind::Numeric)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self.kind, TypeKind::Procedure(_))
    }

    /// Structured types cannot be passed by value as assignment targets.
    pub fn is_structured(&self) -> bool {
        self.is_array() || self.is_record()
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match &self.kind {
            TypeKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match &self.kind {
            TypeKind::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerType> {
        match &self.kind {
            TypeKind::Pointer(pointer) => Some(pointer),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcedureType> {
        match &self.kind {
            TypeKind::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    /// Size of scalar and pointer-like types. Structured sizes need the
    /// arena, see `Arena::size_of`.
    pub fn scalar_size(&self) -> Option<u32> {
        match &self.kind {
            TypeKind::Basic(kind) => Some(kind.size()),
            TypeKind::Pointer(_) | TypeKind::Procedure(_) => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for VirtualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_ids_follow_kind_order() {
        for (index, kind) in BasicKind::ALL.iter().enumerate() {
            assert_eq!(kind.type_id(), TypeId(index as u32));
        }
    }

    #[test]
    fn test_numeric_queries() {
        let short = Type::new(TypeKind::Basic(BasicKind::ShortInt), Span::default());
        let byte = Type::new(TypeKind::Basic(BasicKind::Byte), Span::default());
        let real = Type::new(TypeKind::Basic(BasicKind::LongReal), Span::default());
        assert!(short.is_integer() && short.is_entire() && short.is_numeric());
        assert!(!byte.is_integer() && byte.is_entire());
        assert!(real.is_real() && !real.is_entire());
        assert_eq!(real.scalar_size(), Some(8));
    }

    #[test]
    fn test_open_array() {
        let open = ArrayType { lengths: vec![0], types: vec![TypeId::CHAR] };
        let fixed = ArrayType { lengths: vec![10, 20], types: vec![TypeId(20), TypeId::INTEGER] };
        assert!(open.is_open());
        assert!(!fixed.is_open());
        assert_eq!(fixed.dimensions(), 2);
        assert_eq!(fixed.member(), TypeId::INTEGER);
    }
}
