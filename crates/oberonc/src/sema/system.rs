//! Predefined types and procedures
//!
//! Installs the universe scope and implements the overload dispatch of
//! predefined procedures.

use super::symtab::{SymbolTable, UNIVERSE_LEVEL};
use crate::ast::{Arena, Decl, DeclId, DeclKind, Procedure};
use crate::common::Span;
use crate::types::{BasicKind, PointerType, ProcedureType, TypeId, TypeKind, VirtualKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    New,
    Free,
    Inc,
    Dec,
    Incl,
    Excl,
    Abs,
    Odd,
    Lsl,
    Asr,
    Ror,
    Floor,
    Flt,
    Ord,
    Chr,
    Cap,
    Len,
    Halt,
    Assert,
    Size,
    Max,
    Min,
    Long,
    Short,
    Copy,
    Pack,
    Unpk,
}

impl Builtin {
    pub const ALL: [Builtin; 27] = [
        Builtin::New,
        Builtin::Free,
        Builtin::Inc,
        Builtin::Dec,
        Builtin::Incl,
        Builtin::Excl,
        Builtin::Abs,
        Builtin::Odd,
        Builtin::Lsl,
        Builtin::Asr,
        Builtin::Ror,
        Builtin::Floor,
        Builtin::Flt,
        Builtin::Ord,
        Builtin::Chr,
        Builtin::Cap,
        Builtin::Len,
        Builtin::Halt,
        Builtin::Assert,
        Builtin::Size,
        Builtin::Max,
        Builtin::Min,
        Builtin::Long,
        Builtin::Short,
        Builtin::Copy,
        Builtin::Pack,
        Builtin::Unpk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::New => "NEW",
            Builtin::Free => "FREE",
            Builtin::Inc => "INC",
            Builtin::Dec => "DEC",
            Builtin::Incl => "INCL",
            Builtin::Excl => "EXCL",
            Builtin::Abs => "ABS",
            Builtin::Odd => "ODD",
            Builtin::Lsl => "LSL",
            Builtin::Asr => "ASR",
            Builtin::Ror => "ROR",
            Builtin::Floor => "FLOOR",
            Builtin::Flt => "FLT",
            Builtin::Ord => "ORD",
            Builtin::Chr => "CHR",
            Builtin::Cap => "CAP",
            Builtin::Len => "LEN",
            Builtin::Halt => "HALT",
            Builtin::Assert => "ASSERT",
            Builtin::Size => "SIZE",
            Builtin::Max => "MAX",
            Builtin::Min => "MIN",
            Builtin::Long => "LONG",
            Builtin::Short => "SHORT",
            Builtin::Copy => "COPY",
            Builtin::Pack => "PACK",
            Builtin::Unpk => "UNPK",
        }
    }
}

/// Formal parameter of a predefined signature.
#[derive(Debug, Clone, Copy)]
enum Formal {
    Value(TypeId),
    Var(TypeId),
}

/// Outcome of overload dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Procedure type of the selected signature.
    pub signature: TypeId,
    /// Result type of the call, if any.
    pub result: Option<TypeId>,
}

#[derive(Debug, Default)]
pub struct System {
    signatures: HashMap<Builtin, Vec<TypeId>>,
}

impl System {
    /// Create predefined types and procedures and enter them into the
    /// universe scope.
    pub fn install(arena: &mut Arena, symbols: &mut SymbolTable) -> Self {
        for kind in BasicKind::ALL {
            if kind == BasicKind::String {
                continue;
            }
            let id = kind.type_id();
            let decl = universe_decl(arena, kind.name(), DeclKind::Type, id);
            arena.ty_mut(id).decl = Some(decl);
            symbols.insert_global(kind.name(), decl);
        }

        let mut system = System::default();
        let ptr_any = arena.add_type(TypeKind::Pointer(PointerType { base: Some(TypeId::ANY) }), Span::default());
        let array_any = arena.add_open_array(1, TypeId::ANY, Span::default());
        let array_char = arena.add_open_array(1, TypeId::CHAR, Span::default());

        use Formal::{Value, Var};
        let catalog: Vec<(Builtin, Vec<(Vec<Formal>, Option<TypeId>, bool)>)> = vec![
            (Builtin::New, vec![(vec![Var(ptr_any)], None, false)]),
            (Builtin::Free, vec![(vec![Var(ptr_any)], None, false)]),
            (Builtin::Inc, vec![(vec![Var(TypeId::ENTIRE)], None, true)]),
            (Builtin::Dec, vec![(vec![Var(TypeId::ENTIRE)], None, true)]),
            (Builtin::Incl, vec![(vec![Var(TypeId::SET), Value(TypeId::ENTIRE)], None, false)]),
            (Builtin::Excl, vec![(vec![Var(TypeId::SET), Value(TypeId::ENTIRE)], None, false)]),
            (
                Builtin::Abs,
                vec![
                    (vec![Value(TypeId::NUMERIC)], Some(TypeId::NUMERIC), false),
                    (vec![Value(TypeId::SHORTINT)], Some(TypeId::SHORTINT), false),
                    (vec![Value(TypeId::INTEGER)], Some(TypeId::INTEGER), false),
                    (vec![Value(TypeId::LONGINT)], Some(TypeId::LONGINT), false),
                    (vec![Value(TypeId::REAL)], Some(TypeId::REAL), false),
                    (vec![Value(TypeId::LONGREAL)], Some(TypeId::LONGREAL), false),
                ],
            ),
            (Builtin::Odd, vec![(vec![Value(TypeId::ENTIRE)], Some(TypeId::BOOLEAN), false)]),
            (Builtin::Lsl, shifts()),
            (Builtin::Asr, shifts()),
            (Builtin::Ror, shifts()),
            (Builtin::Floor, vec![(vec![Value(TypeId::FLOATING)], Some(TypeId::LONGINT), false)]),
            (
                Builtin::Flt,
                vec![
                    (vec![Value(TypeId::ENTIRE)], Some(TypeId::REAL), false),
                    (vec![Value(TypeId::LONGINT)], Some(TypeId::LONGREAL), false),
                ],
            ),
            (
                Builtin::Ord,
                vec![
                    (vec![Value(TypeId::CHAR)], Some(TypeId::INTEGER), false),
                    (vec![Value(TypeId::BOOLEAN)], Some(TypeId::INTEGER), false),
                    (vec![Value(TypeId::SET)], Some(TypeId::INTEGER), false),
                ],
            ),
            (Builtin::Chr, vec![(vec![Value(TypeId::ENTIRE)], Some(TypeId::CHAR), false)]),
            (Builtin::Cap, vec![(vec![Value(TypeId::CHAR)], Some(TypeId::CHAR), false)]),
            (Builtin::Len, vec![(vec![Value(array_any)], Some(TypeId::LONGINT), false)]),
            (Builtin::Halt, vec![(vec![Value(TypeId::ENTIRE)], None, false)]),
            (Builtin::Assert, vec![(vec![Value(TypeId::BOOLEAN)], None, false)]),
            (Builtin::Size, vec![(vec![Value(TypeId::TYPE)], Some(TypeId::LONGINT), false)]),
            (Builtin::Max, vec![(vec![Value(TypeId::TYPE)], Some(TypeId::TYPE), false)]),
            (Builtin::Min, vec![(vec![Value(TypeId::TYPE)], Some(TypeId::TYPE), false)]),
            (
                Builtin::Long,
                vec![
                    (vec![Value(TypeId::SHORTINT)], Some(TypeId::INTEGER), false),
                    (vec![Value(TypeId::INTEGER)], Some(TypeId::LONGINT), false),
                    (vec![Value(TypeId::REAL)], Some(TypeId::LONGREAL), false),
                ],
            ),
            (
                Builtin::Short,
                vec![
                    (vec![Value(TypeId::LONGINT)], Some(TypeId::INTEGER), false),
                    (vec![Value(TypeId::INTEGER)], Some(TypeId::SHORTINT), false),
                    (vec![Value(TypeId::LONGREAL)], Some(TypeId::REAL), false),
                ],
            ),
            (Builtin::Copy, vec![(vec![Value(array_char), Var(array_char)], None, false)]),
            (Builtin::Pack, vec![(vec![Var(TypeId::FLOATING), Value(TypeId::ENTIRE)], None, false)]),
            (Builtin::Unpk, vec![(vec![Var(TypeId::FLOATING), Var(TypeId::ENTIRE)], None, false)]),
        ];

        for (builtin, overloads) in catalog {
            let signatures: Vec<TypeId> = overloads
                .into_iter()
                .map(|(formals, ret, variadic)| signature(arena, &formals, ret, variadic))
                .collect();
            let primary = signatures.first().copied().unwrap_or(TypeId::NO_TYPE);
            let procedure = Procedure { builtin: Some(builtin), ..Procedure::default() };
            let decl = universe_decl(arena, builtin.name(), DeclKind::Procedure(Box::new(procedure)), primary);
            symbols.insert_global(builtin.name(), decl);
            system.signatures.insert(builtin, signatures);
        }
        system
    }

    pub fn signatures(&self, builtin: Builtin) -> &[TypeId] {
        self.signatures.get(&builtin).map_or(&[], Vec::as_slice)
    }

    /// Select the signature of a predefined procedure call.
    ///
    /// `actuals` are the argument types, `type_arg` the type named by the
    /// first argument when it is a type designator.
    pub fn dispatch(
        &self,
        arena: &Arena,
        builtin: Builtin,
        actuals: &[TypeId],
        type_arg: Option<TypeId>,
    ) -> Option<Dispatch> {
        let signatures = self.signatures(builtin);
        let primary = *signatures.first()?;

        let mut best: Option<(u32, TypeId)> = None;
        let mut tie = false;
        for &signature in signatures {
            let Some(proc) = arena.ty(signature).as_procedure() else {
                continue;
            };
            if proc.ret == Some(TypeId::TYPE)
                && proc.params.len() == 1
                && arena.decl(proc.params[0]).ty == TypeId::TYPE
            {
                return Some(Dispatch { signature, result: type_arg.or(Some(TypeId::NO_TYPE)) });
            }
            let Some(score) = self.score(arena, &proc.params, proc.variadic, actuals) else {
                continue;
            };
            match best {
                Some((top, _)) if score < top => {}
                Some((top, _)) if score == top => tie = true,
                _ => {
                    best = Some((score, signature));
                    tie = false;
                }
            }
        }

        let signature = match best {
            Some((_, signature)) if !tie => signature,
            _ => primary,
        };
        let ret = arena.ty(signature).as_procedure().and_then(|proc| proc.ret);
        let result = match ret {
            Some(TypeId::NUMERIC) => actuals.first().copied().or(ret),
            other => other,
        };
        Some(Dispatch { signature, result })
    }

    fn score(&self, arena: &Arena, params: &[DeclId], variadic: bool, actuals: &[TypeId]) -> Option<u32> {
        if actuals.len() < params.len() || (!variadic && actuals.len() > params.len()) {
            return None;
        }
        params
            .iter()
            .zip(actuals)
            .map(|(param, actual)| self.match_score(arena, arena.decl(*param).ty, *actual))
            .sum()
    }

    fn match_score(&self, arena: &Arena, formal: TypeId, actual: TypeId) -> Option<u32> {
        if formal == actual {
            return Some(2);
        }
        let (expected, given) = (arena.ty(formal), arena.ty(actual));
        let matches = match &expected.kind {
            TypeKind::Virtual(VirtualKind::Any) => true,
            TypeKind::Virtual(VirtualKind::Entire) => given.is_entire(),
            TypeKind::Virtual(VirtualKind::Floating) => given.is_real(),
            TypeKind::Virtual(VirtualKind::Numeric) => given.is_numeric(),
            TypeKind::Pointer(pointer) if pointer.base == Some(TypeId::ANY) => {
                given.is_pointer() || actual == TypeId::NIL
            }
            TypeKind::Array(array) if array.member() == TypeId::ANY => given.is_array() || given.is_string(),
            TypeKind::Array(array) if array.member() == TypeId::CHAR => {
                given.is_char()
                    || given.is_string()
                    || given.as_array().is_some_and(|a| a.member() == TypeId::CHAR)
            }
            _ => false,
        };
        matches.then_some(1)
    }
}

fn shifts() -> Vec<(Vec<Formal>, Option<TypeId>, bool)> {
    vec![
        (vec![Formal::Value(TypeId::ENTIRE), Formal::Value(TypeId::ENTIRE)], Some(TypeId::LONGINT), false),
        (vec![Formal::Value(TypeId::SHORTINT), Formal::Value(TypeId::ENTIRE)], Some(TypeId::SHORTINT), false),
        (vec![Formal::Value(TypeId::INTEGER), Formal::Value(TypeId::ENTIRE)], Some(TypeId::INTEGER), false),
        (vec![Formal::Value(TypeId::LONGINT), Formal::Value(TypeId::ENTIRE)], Some(TypeId::LONGINT), false),
    ]
}

fn universe_decl(arena: &mut Arena, name: &str, kind: DeclKind, ty: TypeId) -> DeclId {
    let mut decl = Decl::new(name, kind, ty, Span::default());
    decl.level = UNIVERSE_LEVEL;
    arena.add_decl(decl)
}

fn signature(arena: &mut Arena, formals: &[Formal], ret: Option<TypeId>, variadic: bool) -> TypeId {
    let params = formals
        .iter()
        .enumerate()
        .map(|(index, formal)| {
            let (is_var, ty) = match *formal {
                Formal::Value(ty) => (false, ty),
                Formal::Var(ty) => (true, ty),
            };
            let name = char::from(b'a' + index as u8).to_string();
            universe_decl(arena, &name, DeclKind::Parameter { is_var, index }, ty)
        })
        .collect();
    arena.add_type(TypeKind::Procedure(ProcedureType { params, ret, variadic }), Span::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (Arena, SymbolTable, System) {
        let mut arena = Arena::new();
        let mut symbols = SymbolTable::new();
        let system = System::install(&mut arena, &mut symbols);
        (arena, symbols, system)
    }

    #[test]
    fn test_universe_contains_types_and_procedures() {
        let (arena, symbols, _) = setup();
        let integer = symbols.lookup_local("INTEGER").unwrap();
        assert_eq!(arena.decl(integer).ty, TypeId::INTEGER);
        let new = symbols.lookup_local("NEW").unwrap();
        assert_eq!(arena.decl(new).builtin(), Some(Builtin::New));
        assert!(symbols.lookup_local("STRING").is_none());
    }

    #[test]
    fn test_dispatch_prefers_exact_overload() {
        let (arena, _, system) = setup();
        let abs = system.dispatch(&arena, Builtin::Abs, &[TypeId::INTEGER], None).unwrap();
        assert_eq!(abs.result, Some(TypeId::INTEGER));
        let abs = system.dispatch(&arena, Builtin::Abs, &[TypeId::BYTE], None).unwrap();
        assert_eq!(abs.result, Some(TypeId::BYTE));
        let lsl = system.dispatch(&arena, Builtin::Lsl, &[TypeId::SHORTINT, TypeId::SHORTINT], None).unwrap();
        assert_eq!(lsl.result, Some(TypeId::SHORTINT));
        let flt = system.dispatch(&arena, Builtin::Flt, &[TypeId::LONGINT], None).unwrap();
        assert_eq!(flt.result, Some(TypeId::LONGREAL));
    }

    #[test]
    fn test_dispatch_falls_back_to_primary() {
        let (arena, _, system) = setup();
        let ord = system.dispatch(&arena, Builtin::Ord, &[TypeId::REAL], None).unwrap();
        assert_eq!(ord.signature, system.signatures(Builtin::Ord)[0]);
        let max = system.dispatch(&arena, Builtin::Max, &[TypeId::TYPE], Some(TypeId::SET)).unwrap();
        assert_eq!(max.result, Some(TypeId::SET));
    }
}
