//! Runtime value model shared by the interpreter, the rewriter and the
//! logging facility.

mod function;
mod globals;
mod value;

#[cfg(test)]
mod display_test;

pub use function::{Cell, Function, NativeFn, NativeFunction, new_cell};
pub use globals::Globals;
pub use value::{Repr, Value};
