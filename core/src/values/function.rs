//! Callable values: bytecode functions and native Rust functions.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use ecow::EcoString;

use super::{Globals, Value};
use crate::vm::{CallContext, CodeObject, ExecutionError};

/// A closure cell shared between the defining frame and the closures
/// capturing it. `None` means the variable is not bound yet.
pub type Cell = Rc<RefCell<Option<Value>>>;

pub fn new_cell(value: Option<Value>) -> Cell {
    Rc::new(RefCell::new(value))
}

/// A bytecode function: a code object bound to its defining environment.
#[derive(Clone)]
pub struct Function {
    pub code: Rc<CodeObject>,
    pub globals: Globals,
    pub name: EcoString,
    /// Default values for the trailing parameters.
    pub defaults: Vec<Value>,
    /// Cells for the code object's free variables, in `free_vars` order.
    pub closure: Vec<Cell>,
}

impl Function {
    /// A function without defaults or closure, named after its code object.
    pub fn new(code: Rc<CodeObject>, globals: Globals) -> Self {
        let name = code.name.clone();
        Self {
            code,
            globals,
            name,
            defaults: Vec::new(),
            closure: Vec::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: Vec<Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_closure(mut self, closure: Vec<Cell>) -> Self {
        self.closure = closure;
        self
    }

    /// Same environment, different code.
    pub fn with_code(&self, code: Rc<CodeObject>) -> Self {
        Self {
            code,
            globals: self.globals.clone(),
            name: self.name.clone(),
            defaults: self.defaults.clone(),
            closure: self.closure.clone(),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("code", &self.code.identity())
            .field("defaults", &self.defaults)
            .field("closure", &self.closure.len())
            .finish()
    }
}

/// Signature of native functions callable from bytecode.
///
/// The [`CallContext`] gives read access to the interpreter's active frames,
/// innermost last.
pub type NativeFn = dyn Fn(&CallContext<'_>, &[Value]) -> Result<Value, ExecutionError>;

/// Wrapper for native Rust closures.
///
/// # Example
///
/// ```ignore
/// let len = NativeFunction::new("len", |_ctx, args| match args {
///     [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
///     _ => Err(RuntimeError::type_error("len() expects a list").into()),
/// });
/// globals.set("len", Value::Native(len));
/// ```
#[derive(Clone)]
pub struct NativeFunction {
    name: EcoString,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<EcoString>,
        func: impl Fn(&CallContext<'_>, &[Value]) -> Result<Value, ExecutionError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, ExecutionError> {
        (self.func)(ctx, args)
    }

    pub fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}
