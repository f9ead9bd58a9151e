//! Symbol records and the chained-scope table.
//!
//! Symbols live in an arena owned by the [`ScopeChain`]; scopes map
//! case-folded names to [`SymbolId`]s. The chain is always
//! `[reserved, global, proc₁, proc₂, ...]`: the reserved and global scopes
//! are permanent, procedure scopes are pushed and popped in strict stack
//! order while procedure bodies parse. Popped scopes stay in the arena (and
//! keep their symbols alive for handles already given out) but stop being
//! visible to lookups.

use std::collections::HashMap;

use crate::backend::ir::IrStorage;
use crate::frontend::token;
use crate::frontend::types::ValueType;

/// Index of a symbol in the arena.
pub type SymbolId = usize;

/// Index of a scope in the scope arena.
pub type ScopeId = usize;

/// What a declared name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRole {
    Reserved,
    ProgramName,
    Variable,
    Procedure,
}

/// A declared name's permanent record.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Canonical (uppercase) spelling.
    pub name: String,
    pub role: SymbolRole,
    pub ty: ValueType,
    /// Element count: 1 for scalars, the declared bound for arrays.
    pub len: i64,
    /// Backing storage, allocated by the IR backend. Variables only.
    pub storage: Option<IrStorage>,
    /// Declared parameter types in order. Procedures only.
    pub params: Vec<ValueType>,
}

impl Symbol {
    /// A variable record without storage yet (parameters get storage once
    /// their owning function begins).
    pub fn variable(name: String, ty: ValueType, len: i64) -> Self {
        Self {
            name,
            role: SymbolRole::Variable,
            ty,
            len,
            storage: None,
            params: Vec::new(),
        }
    }

    pub fn procedure(name: String, return_type: ValueType, len: i64) -> Self {
        Self {
            name,
            role: SymbolRole::Procedure,
            ty: return_type,
            len,
            storage: None,
            params: Vec::new(),
        }
    }

    pub fn program_name(name: String) -> Self {
        Self {
            name,
            role: SymbolRole::ProgramName,
            ty: ValueType::None,
            len: 1,
            storage: None,
            params: Vec::new(),
        }
    }

    fn reserved(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: SymbolRole::Reserved,
            ty: ValueType::None,
            len: 1,
            storage: None,
            params: Vec::new(),
        }
    }
}

/// Which scope a declaration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSelector {
    Reserved,
    Global,
    Current,
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, SymbolId>,
}

/// The ordered scope chain plus the symbol arena behind it.
#[derive(Debug)]
pub struct ScopeChain {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    /// Stack of active scopes; indices 0 and 1 are the permanent reserved
    /// and global scopes.
    active: Vec<ScopeId>,
}

const RESERVED: usize = 0;
const GLOBAL: usize = 1;

impl ScopeChain {
    /// Create the chain with the reserved-word scope pre-populated and an
    /// empty global scope.
    pub fn new() -> Self {
        let mut chain = Self {
            symbols: Vec::new(),
            scopes: vec![Scope::default(), Scope::default()],
            active: vec![0, 1],
        };
        for spelling in token::RESERVED_WORDS {
            let id = chain.symbols.len();
            chain.symbols.push(Symbol::reserved(spelling));
            chain.scopes[RESERVED].names.insert((*spelling).to_string(), id);
        }
        chain
    }

    /// Open a procedure scope.
    pub fn push_scope(&mut self) {
        let id = self.scopes.len();
        self.scopes.push(Scope::default());
        self.active.push(id);
    }

    /// Close the innermost procedure scope. The reserved and global scopes
    /// are permanent; attempting to pop them is a no-op with a warning.
    pub fn pop_scope(&mut self) {
        if self.active.len() <= 2 {
            tracing::warn!("attempted to pop the global scope");
            return;
        }
        self.active.pop();
    }

    /// Number of active scopes, counting reserved and global.
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Insert a symbol into the selected scope, keyed by its canonical name.
    ///
    /// The caller is responsible for rejecting duplicates first; visible
    /// names are unique per scope.
    pub fn declare(&mut self, selector: ScopeSelector, symbol: Symbol) -> SymbolId {
        let scope = match selector {
            ScopeSelector::Reserved => RESERVED,
            ScopeSelector::Global => GLOBAL,
            ScopeSelector::Current => *self.active.last().expect("INVARIANT: global scope always active"),
        };
        let id = self.symbols.len();
        let name = symbol.name.clone();
        self.symbols.push(symbol);
        self.scopes[scope].names.insert(name, id);
        id
    }

    /// Reserved-word scope only.
    pub fn lookup_reserved(&self, name: &str) -> Option<SymbolId> {
        self.scopes[RESERVED].names.get(name).copied()
    }

    /// Global scope only. Used to detect duplicate global declarations
    /// regardless of the current nesting.
    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        self.scopes[GLOBAL].names.get(name).copied()
    }

    /// Innermost scope only. Used to detect duplicates within one scope.
    pub fn lookup_current(&self, name: &str) -> Option<SymbolId> {
        let current = *self.active.last().expect("INVARIANT: global scope always active");
        self.scopes[current].names.get(name).copied()
    }

    /// Standard identifier resolution: innermost scope outward through the
    /// global scope, excluding reserved words.
    pub fn lookup_visible(&self, name: &str) -> Option<SymbolId> {
        for &scope in self.active.iter().skip(GLOBAL).rev() {
            if let Some(&id) = self.scopes[scope].names.get(name) {
                return Some(id);
            }
        }
        None
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_scope_is_seeded() {
        let chain = ScopeChain::new();
        let id = chain.lookup_reserved("PROGRAM").expect("PROGRAM is reserved");
        assert_eq!(chain.symbol(id).role, SymbolRole::Reserved);
        // Reserved words never leak into identifier resolution.
        assert!(chain.lookup_visible("PROGRAM").is_none());
    }

    #[test]
    fn test_visible_walks_outward() {
        let mut chain = ScopeChain::new();
        let outer = chain.declare(
            ScopeSelector::Global,
            Symbol::variable("X".to_string(), ValueType::Int, 1),
        );

        chain.push_scope();
        assert_eq!(chain.lookup_visible("X"), Some(outer));
        assert!(chain.lookup_current("X").is_none());

        let inner = chain.declare(
            ScopeSelector::Current,
            Symbol::variable("X".to_string(), ValueType::Float, 1),
        );
        // Shadowing: innermost wins.
        assert_eq!(chain.lookup_visible("X"), Some(inner));
        assert_eq!(chain.lookup_global("X"), Some(outer));

        chain.pop_scope();
        assert_eq!(chain.lookup_visible("X"), Some(outer));
    }

    #[test]
    fn test_pop_never_removes_global() {
        let mut chain = ScopeChain::new();
        assert_eq!(chain.depth(), 2);
        chain.pop_scope();
        chain.pop_scope();
        assert_eq!(chain.depth(), 2);
    }

    #[test]
    fn test_interned_lookup_is_stable() {
        let mut chain = ScopeChain::new();
        let id = chain.declare(
            ScopeSelector::Global,
            Symbol::variable("COUNT".to_string(), ValueType::Int, 1),
        );
        // Every occurrence of the spelling resolves to the same record.
        assert_eq!(chain.lookup_visible("COUNT"), Some(id));
        assert_eq!(chain.lookup_visible("COUNT"), Some(id));
        chain.push_scope();
        assert_eq!(chain.lookup_visible("COUNT"), Some(id));
        chain.pop_scope();
    }
}
