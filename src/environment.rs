//! The scope chain (§3, §4.4): a per-scope identifier map with a parent
//! link forming a chain up to the global scope.
//!
//! Scopes are reference-counted because a user function or bound method
//! must be able to outlive the block that declared it, capturing the
//! environment active at its declaration (§3, "Environments may outlive
//! their lexical block"). `Rc<RefCell<_>>` is the idiomatic shape for this
//! in a single-threaded tree-walker; method closures legitimately form
//! reference cycles with the instances they're bound to (§3, §9), which
//! this crate accepts rather than threading `Weak` back-edges through every
//! lookup (see DESIGN.md).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

struct Scope {
    table: HashMap<Rc<str>, Value>,
    parent: Option<Environment>,
}

/// A handle to one scope in the chain. Cloning an `Environment` clones the
/// handle, not the scope: all clones observe the same bindings.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// Create the global environment (no parent).
    pub fn global() -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            table: HashMap::new(),
            parent: None,
        })))
    }

    /// Push a new scope whose parent is `self`.
    pub fn child_of(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            table: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// `declare` (§4.4): adds a fresh binding in *this* scope. Shadowing an
    /// outer scope is never an error; same-scope duplicate declaration is
    /// rejected earlier, by the parser/resolver, not here.
    pub fn declare(&self, name: impl Into<Rc<str>>, value: Value) {
        self.0.borrow_mut().table.insert(name.into(), value);
    }

    /// Walk `depth` parent links, then read `name` from that scope. Used
    /// for resolved identifier uses: no fallback walk is performed (§3).
    pub fn get_at(&self, depth: usize, name: &str) -> Option<Value> {
        self.ancestor(depth).0.borrow().table.get(name).cloned()
    }

    /// Walk `depth` parent links, then overwrite an *existing* binding for
    /// `name` in that scope. Returns a runtime error if absent.
    pub fn assign_at(
        &self,
        depth: usize,
        name: &str,
        value: Value,
        token: &Token,
    ) -> Result<(), RuntimeError> {
        let scope = self.ancestor(depth);
        let mut scope = scope.0.borrow_mut();
        if let Some(slot) = scope.table.get_mut(name) {
            *slot = value;
            Ok(())
        } else {
            Err(RuntimeError::at(
                token,
                format!("reference to non-existent identifier '{name}'"),
            ))
        }
    }

    /// Dynamic lookup from the root (global) scope, for identifiers the
    /// resolver did not resolve with a depth — the global scope's fallback
    /// path used to reach native built-ins (§4.4).
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.root().0.borrow().table.get(name).cloned()
    }

    /// Dynamic assignment to an *existing* binding in the root (global)
    /// scope, the write-side counterpart of [`Environment::get_global`]. An
    /// identifier the resolver left unresolved is always a reference to a
    /// prior top-level declaration (§4.4); assigning to one that was never
    /// declared is a runtime error.
    pub fn assign_global(&self, name: &str, value: Value, token: &Token) -> Result<(), RuntimeError> {
        let root = self.root();
        let mut scope = root.0.borrow_mut();
        if let Some(slot) = scope.table.get_mut(name) {
            *slot = value;
            Ok(())
        } else {
            Err(RuntimeError::at(
                token,
                format!("reference to non-existent identifier '{name}'"),
            ))
        }
    }

    fn root(&self) -> Environment {
        let mut env = self.clone();
        loop {
            let next = env.parent();
            match next {
                Some(p) => env = p,
                None => return env,
            }
        }
    }

    fn ancestor(&self, depth: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..depth {
            env = env.parent().expect("resolved depth exceeds scope chain");
        }
        env
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::TokenKind;

    fn tok() -> Token {
        Token::new(TokenKind::Identifier, "x", Value::Nil, 1)
    }

    #[test]
    fn declare_and_get_same_scope() {
        let env = Environment::global();
        env.declare("x", Value::Number(1.0));
        assert!(matches!(env.get_at(0, "x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn child_scope_reads_through_depth() {
        let global = Environment::global();
        global.declare("x", Value::Number(9.0));
        let inner = Environment::child_of(&global);
        assert!(matches!(inner.get_at(1, "x"), Some(Value::Number(n)) if n == 9.0));
        assert!(inner.get_at(0, "x").is_none());
    }

    #[test]
    fn assign_at_missing_binding_errors() {
        let env = Environment::global();
        let err = env
            .assign_at(0, "missing", Value::Nil, &tok())
            .unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn shadowing_does_not_clobber_outer_scope() {
        let global = Environment::global();
        global.declare("x", Value::Number(1.0));
        let inner = Environment::child_of(&global);
        inner.declare("x", Value::Number(2.0));
        assert!(matches!(inner.get_at(0, "x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(global.get_at(0, "x"), Some(Value::Number(n)) if n == 1.0));
    }
}
