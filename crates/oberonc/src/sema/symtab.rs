//! Symbol table and scope management
//!
//! Three layers: the universe with predefined names, one scope per
//! imported module, and the scope chain of the module being compiled.
//! Names are interned once and looked up by symbol.

use crate::ast::{DeclId, QualIdent};
use std::collections::HashMap;
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Level of predefined declarations.
pub const UNIVERSE_LEVEL: u32 = 0;
/// Level of top-level declarations of a module.
pub const MODULE_LEVEL: u32 = 1;

/// A lexical scope containing symbols
#[derive(Debug)]
struct Scope {
    symbols: HashMap<DefaultSymbol, DeclId>,
    parent: Option<Box<Scope>>,
    level: u32,
}

impl Scope {
    fn new(level: u32) -> Self {
        Self { symbols: HashMap::new(), parent: None, level }
    }

    fn lookup(&self, name: DefaultSymbol) -> Option<DeclId> {
        if let Some(decl) = self.symbols.get(&name) {
            Some(*decl)
        } else if let Some(parent) = &self.parent {
            parent.lookup(name)
        } else {
            None
        }
    }

    /// Push a new child scope
    fn push_child(&mut self) {
        let level = self.level + 1;
        let old_scope = std::mem::replace(self, Scope::new(level));
        self.parent = Some(Box::new(old_scope));
    }

    /// Replace self with the parent scope
    fn pop_to_parent(&mut self) -> bool {
        if let Some(parent) = self.parent.take() {
            *self = *parent;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    names: DefaultStringInterner,
    universe: HashMap<DefaultSymbol, DeclId>,
    modules: HashMap<DefaultSymbol, HashMap<DefaultSymbol, DeclId>>,
    aliases: HashMap<DefaultSymbol, DefaultSymbol>,
    scope: Scope,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            names: DefaultStringInterner::new(),
            universe: HashMap::new(),
            modules: HashMap::new(),
            aliases: HashMap::new(),
            scope: Scope::new(MODULE_LEVEL),
        }
    }

    /// Register a predefined declaration.
    pub fn insert_global(&mut self, name: &str, decl: DeclId) {
        let symbol = self.names.get_or_intern(name);
        self.universe.insert(symbol, decl);
    }

    /// Start compiling a module with an empty top-level scope.
    pub fn enter_module(&mut self, name: &str) {
        self.scope = Scope::new(MODULE_LEVEL);
        let symbol = self.names.get_or_intern(name);
        self.aliases.insert(symbol, symbol);
    }

    pub fn open_scope(&mut self) {
        self.scope.push_child();
    }

    pub fn close_scope(&mut self) {
        self.scope.pop_to_parent();
    }

    /// Level of the innermost open scope.
    pub fn level(&self) -> u32 {
        self.scope.level
    }

    /// Insert into the innermost scope, replacing a previous definition.
    pub fn insert(&mut self, name: &str, decl: DeclId) {
        let symbol = self.names.get_or_intern(name);
        self.scope.symbols.insert(symbol, decl);
    }

    /// Name already defined in the innermost scope.
    pub fn is_duplicate(&self, name: &str) -> bool {
        self.names
            .get(name)
            .is_some_and(|symbol| self.scope.symbols.contains_key(&symbol))
    }

    /// Name of a predefined declaration.
    pub fn is_global(&self, name: &str) -> bool {
        self.names.get(name).is_some_and(|symbol| self.universe.contains_key(&symbol))
    }

    /// Resolve an unqualified name through the scope chain and the universe.
    pub fn lookup_local(&self, name: &str) -> Option<DeclId> {
        let symbol = self.names.get(name)?;
        self.scope.lookup(symbol).or_else(|| self.universe.get(&symbol).copied())
    }

    /// Resolve a possibly qualified identifier. Qualifiers name an import
    /// alias or the module being compiled.
    pub fn lookup(&self, ident: &QualIdent) -> Option<DeclId> {
        match &ident.qualifier {
            None => self.lookup_local(&ident.name),
            Some(qualifier) => {
                let alias = self.names.get(qualifier.as_str())?;
                let module = *self.aliases.get(&alias)?;
                let name = self.names.get(ident.name.as_str())?;
                if let Some(scope) = self.modules.get(&module) {
                    scope.get(&name).copied()
                } else {
                    // Qualified reference to the module being compiled.
                    self.scope_root_lookup(name)
                }
            }
        }
    }

    fn scope_root_lookup(&self, name: DefaultSymbol) -> Option<DeclId> {
        let mut scope = &self.scope;
        while let Some(parent) = &scope.parent {
            scope = parent;
        }
        scope.symbols.get(&name).copied()
    }

    pub fn lookup_in_module(&self, module: &str, name: &str) -> Option<DeclId> {
        let module = self.names.get(module)?;
        let name = self.names.get(name)?;
        self.modules.get(&module)?.get(&name).copied()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.names.get(name).is_some_and(|symbol| self.modules.contains_key(&symbol))
    }

    /// Create the scope of an imported module if it does not exist yet.
    pub fn add_module(&mut self, name: &str) {
        let symbol = self.names.get_or_intern(name);
        self.modules.entry(symbol).or_default();
    }

    /// Add an exported declaration of an imported module.
    pub fn import(&mut self, module: &str, name: &str, decl: DeclId) {
        let module = self.names.get_or_intern(module);
        let name = self.names.get_or_intern(name);
        self.modules.entry(module).or_default().insert(name, decl);
    }

    pub fn add_alias(&mut self, alias: &str, module: &str) {
        let alias = self.names.get_or_intern(alias);
        let module = self.names.get_or_intern(module);
        self.aliases.insert(alias, module);
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scope_chain() {
        let mut table = SymbolTable::new();
        table.insert_global("INTEGER", DeclId(0));
        table.enter_module("M");
        table.insert("x", DeclId(1));
        assert_eq!(table.level(), MODULE_LEVEL);
        table.open_scope();
        table.insert("x", DeclId(2));
        assert_eq!(table.level(), MODULE_LEVEL + 1);
        assert_eq!(table.lookup_local("x"), Some(DeclId(2)));
        assert_eq!(table.lookup_local("INTEGER"), Some(DeclId(0)));
        assert!(table.is_duplicate("x"));
        assert!(!table.is_duplicate("INTEGER"));
        table.close_scope();
        assert_eq!(table.lookup_local("x"), Some(DeclId(1)));
        assert_eq!(table.lookup_local("y"), None);
    }

    #[test]
    fn test_qualified_lookup_through_alias() {
        let mut table = SymbolTable::new();
        table.enter_module("Main");
        table.import("Lists", "Node", DeclId(7));
        table.add_alias("L", "Lists");
        let ident = QualIdent::qualified("L", "Node", Span::default());
        assert_eq!(table.lookup(&ident), Some(DeclId(7)));
        let unknown = QualIdent::qualified("Lists", "Node", Span::default());
        assert_eq!(table.lookup(&unknown), None);
        assert!(table.has_module("Lists"));
    }
}
