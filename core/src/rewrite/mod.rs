//! Print-statement redirection.
//!
//! The rewriter takes a function's code object and replaces every
//! `PrintItem` / `PrintNewline` with a call into a redirection handler,
//! keeping the line table, jump targets and every other instruction intact.

mod error;
mod marker;
mod rewriter;

#[cfg(test)]
mod rewriter_test;

pub use error::RewriteError;
pub use marker::PrintMarker;
pub use rewriter::{PrintRedirect, PrintRewriter, rewrite_code, rewrite_function};
