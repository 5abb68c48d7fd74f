use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use ecow::EcoString;
use hashbrown::HashMap;

use super::Value;

/// A module-level namespace shared by every function defined in it.
///
/// Cloning shares the namespace; use [`ptr_eq`](Self::ptr_eq) to compare
/// identity.
#[derive(Clone, Default)]
pub struct Globals(Rc<RefCell<HashMap<EcoString, Value>>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<EcoString>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn ptr_eq(&self, other: &Globals) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.0.borrow();
        let mut names: Vec<&EcoString> = map.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}
