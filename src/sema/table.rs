//! Scope stack
//!
//! A stack of name-to-symbol maps, innermost last. The table also carries
//! two ambient fields used by name analysis: whether processing is at
//! global scope, and the frame-allocation cursor inside a function body.
//!
//! Failures here are compiler bugs, not user errors: callers check
//! `lookup_local` before `add_decl`, so a duplicate at insertion time means
//! the check was skipped, and popping an empty stack means push/pop calls
//! are unbalanced.

use crate::sema::symbol::SymbolId;
use crate::utils::{Error, Result};
use std::collections::HashMap;

/// One level of the scope stack.
pub type Scope = HashMap<String, SymbolId>;

#[derive(Debug)]
pub struct SymTable {
    scopes: Vec<Scope>,
    global_scope: bool,
    offset: i32,
}

impl SymTable {
    /// Create a table with the outermost scope already open.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            global_scope: true,
            offset: 0,
        }
    }

    /// Open a new innermost scope.
    pub fn add_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Close the innermost scope and return it.
    pub fn remove_scope(&mut self) -> Result<Scope> {
        self.scopes.pop().ok_or(Error::EmptyScope)
    }

    /// Insert a declaration into the innermost scope.
    pub fn add_decl(&mut self, name: &str, id: SymbolId) -> Result<()> {
        if name.is_empty() {
            return Err(Error::IllegalName);
        }
        let scope = self.scopes.last_mut().ok_or(Error::EmptyScope)?;
        if scope.contains_key(name) {
            return Err(Error::DuplicateDecl {
                name: name.to_string(),
            });
        }
        scope.insert(name.to_string(), id);
        Ok(())
    }

    /// Look a name up in the innermost scope only.
    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().and_then(|s| s.get(name)).copied()
    }

    /// Look a name up from the innermost scope outward.
    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Some(*id);
            }
        }
        None
    }

    pub fn is_global_scope(&self) -> bool {
        self.global_scope
    }

    pub fn set_global_scope(&mut self, global: bool) {
        self.global_scope = global;
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }
}

impl Default for SymTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::symbol::SymbolId;

    fn id(n: usize) -> SymbolId {
        SymbolId::from_index(n)
    }

    #[test]
    fn test_local_lookup_sees_only_innermost_scope() {
        let mut table = SymTable::new();
        table.add_decl("x", id(0)).expect("add should succeed");
        table.add_scope();

        assert_eq!(table.lookup_local("x"), None);
        assert_eq!(table.lookup_global("x"), Some(id(0)));
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut table = SymTable::new();
        table.add_decl("x", id(0)).expect("add should succeed");
        table.add_scope();
        table.add_decl("x", id(1)).expect("shadowing add should succeed");

        assert_eq!(table.lookup_global("x"), Some(id(1)));
        let popped = table.remove_scope().expect("scope should pop");
        assert_eq!(popped.get("x"), Some(&id(1)));
        assert_eq!(table.lookup_global("x"), Some(id(0)));
    }

    #[test]
    fn test_duplicate_in_same_scope_is_an_error() {
        let mut table = SymTable::new();
        table.add_decl("x", id(0)).expect("add should succeed");
        assert!(matches!(
            table.add_decl("x", id(1)),
            Err(Error::DuplicateDecl { .. })
        ));
    }

    #[test]
    fn test_remove_on_empty_stack_is_an_error() {
        let mut table = SymTable::new();
        table.remove_scope().expect("outermost scope should pop");
        assert!(matches!(table.remove_scope(), Err(Error::EmptyScope)));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut table = SymTable::new();
        assert!(matches!(table.add_decl("", id(0)), Err(Error::IllegalName)));
    }
}
