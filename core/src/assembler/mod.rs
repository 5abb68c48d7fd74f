//! Assembler producing well-formed code objects.
//!
//! The interpreter has no source language of its own; host code and tests
//! build functions through [`CodeBuilder`].

mod builder;
mod error;


pub use builder::{CodeBuilder, JumpLabel};
pub use error::AssembleError;
