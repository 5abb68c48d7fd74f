//! Variable binding scopes and the binding context handed to the template
//! interpolator.
//!
//! A [`BindingContext`] pairs two read-only scopes, locals and globals, of
//! one active invocation. Names resolve against locals first:
//! ```text
//! context.lookup("x")  ->  locals.lookup("x").or_else(|| globals.lookup("x"))
//! ```
//!
//! Scopes hand out cloned values; every heap value is reference counted so a
//! lookup never copies container contents.

use std::fmt;

use ecow::EcoString;
use hashbrown::HashMap;

use crate::values::{Globals, Value};

/// Trait for anything names can be resolved against.
pub trait Scope {
    /// Look up a name in this scope.
    ///
    /// Returns `Some(value)` if the name is bound, `None` otherwise.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A complete, immutable scope over a sorted slice.
///
/// Bindings are pre-populated and sorted for binary search.
pub struct CompleteScope<'a>(&'a [(&'a str, Value)]);

impl<'a> CompleteScope<'a> {
    /// Create a new complete scope from sorted bindings.
    ///
    /// The bindings slice must be sorted by name for binary search to work.
    pub fn from_sorted(bindings: &'a [(&'a str, Value)]) -> Self {
        debug_assert!(is_sorted(bindings), "Bindings must be sorted by name");
        CompleteScope(bindings)
    }
}

impl Scope for CompleteScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.0
            .binary_search_by_key(&name, |(n, _)| *n)
            .ok()
            .map(|idx| self.0[idx].1.clone())
    }
}

/// An owned scope, convenient for host code building a context by hand.
#[derive(Debug, Clone, Default)]
pub struct Bindings(HashMap<EcoString, Value>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<EcoString>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<EcoString>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }
}

impl Scope for Bindings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

impl Scope for Globals {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

/// A scope with no bindings.
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

static EMPTY: EmptyScope = EmptyScope;

/// Locals and globals of one invocation.
#[derive(Clone, Copy)]
pub struct BindingContext<'a> {
    locals: &'a dyn Scope,
    globals: &'a dyn Scope,
}

impl<'a> BindingContext<'a> {
    pub fn new(locals: &'a dyn Scope, globals: &'a dyn Scope) -> Self {
        Self { locals, globals }
    }

    /// A context that resolves nothing.
    pub fn empty() -> BindingContext<'static> {
        BindingContext {
            locals: &EMPTY,
            globals: &EMPTY,
        }
    }

    /// Locals only; globals are empty.
    pub fn from_locals(locals: &'a dyn Scope) -> Self {
        Self {
            locals,
            globals: &EMPTY,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .lookup(name)
            .or_else(|| self.globals.lookup(name))
    }

    pub fn locals(&self) -> &'a dyn Scope {
        self.locals
    }

    pub fn globals(&self) -> &'a dyn Scope {
        self.globals
    }
}

impl fmt::Debug for BindingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext").finish_non_exhaustive()
    }
}

/// Helper function to check if a slice is sorted by name.
fn is_sorted<T>(bindings: &[(&str, T)]) -> bool {
    bindings.windows(2).all(|w| w[0].0 <= w[1].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_scope_lookup() {
        let bindings = [("a", Value::Int(1)), ("b", Value::Int(2))];
        let scope = CompleteScope::from_sorted(&bindings);
        assert_eq!(scope.lookup("a"), Some(Value::Int(1)));
        assert_eq!(scope.lookup("b"), Some(Value::Int(2)));
        assert_eq!(scope.lookup("c"), None);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let locals = Bindings::new().with("x", 1);
        let globals = Globals::new();
        globals.set("x", 2);
        globals.set("y", 3);

        let ctx = BindingContext::new(&locals, &globals);
        assert_eq!(ctx.lookup("x"), Some(Value::Int(1)));
        assert_eq!(ctx.lookup("y"), Some(Value::Int(3)));
        assert_eq!(ctx.lookup("z"), None);
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(BindingContext::empty().lookup("anything"), None);
    }

    #[test]
    fn test_context_is_debug_inside_results() {
        let locals = Bindings::new().with("x", 1);
        let found: Result<BindingContext<'_>, &str> = Ok(BindingContext::from_locals(&locals));
        assert_eq!(found.unwrap().lookup("x"), Some(Value::Int(1)));

        let missing: Result<BindingContext<'_>, &str> = Err("no frame");
        assert_eq!(missing.unwrap_err(), "no frame");
        assert_eq!(
            format!("{:?}", BindingContext::empty()),
            "BindingContext { .. }"
        );
    }

    #[test]
    fn test_is_sorted() {
        assert!(is_sorted::<i32>(&[]));
        assert!(is_sorted(&[("a", 1), ("b", 2)]));
        assert!(!is_sorted(&[("b", 1), ("a", 2)]));
    }
}
