//! Rendering errors as Python-style tracebacks.
//!
//! ```text
//! Traceback (most recent call last):
//!   File "main.py", line 3, in main
//!   File "lib.py", line 12, in divide
//! RuntimeError: division by zero
//! ```

use std::io::Write;

use smartlog_core::vm::{ErrorKind, ExecutionError};

use crate::Error;

/// Render an error to stderr
pub fn render_error(error: &Error) {
    render_error_to(error, &mut std::io::stderr()).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, writer: &mut dyn Write) -> std::io::Result<()> {
    match error {
        Error::Execution(e) => render_execution_error(e, writer),
        Error::Assemble(e) => writeln!(writer, "AssembleError: {}", e),
        Error::Rewrite(e) => writeln!(writer, "RewriteError: {}", e),
        Error::Log(e) => writeln!(writer, "LogError: {}", e),
    }
}

/// Render an error to a String (useful for tests)
pub fn render_error_to_string(error: &Error) -> String {
    let mut buf = Vec::new();
    render_error_to(error, &mut buf).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_execution_error(error: &ExecutionError, writer: &mut dyn Write) -> std::io::Result<()> {
    if !error.traceback.is_empty() {
        writeln!(writer, "Traceback (most recent call last):")?;
        // Stored innermost first, shown outermost first.
        for entry in error.traceback.iter().rev() {
            writeln!(
                writer,
                "  File \"{}\", line {}, in {}",
                entry.filename, entry.line, entry.function
            )?;
        }
    }

    let label = match &error.kind {
        ErrorKind::Runtime(_) => "RuntimeError",
        ErrorKind::ResourceExceeded(_) => "ResourceExceeded",
        ErrorKind::Internal(_) => "InternalError",
    };
    writeln!(writer, "{}: {}", label, error.kind)
}
