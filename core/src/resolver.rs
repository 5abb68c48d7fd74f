//! Locating binding contexts on the interpreter's active call stack.
//!
//! Logging layers are Rust code and never show up as frames, so "the
//! caller" of a native logging function is simply the innermost script
//! frame.

use crate::scope::BindingContext;
use crate::vm::{CallContext, CodeIdentity, Frame, InvocationId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot skip {skip} frames on a stack of depth {depth}")]
    StackExhausted { skip: usize, depth: usize },

    #[error("no active invocation of {identity}")]
    OriginNotFound { identity: CodeIdentity },
}

/// An active invocation found on the call stack.
#[derive(Debug, Clone, Copy)]
pub struct ActiveInvocation<'a> {
    pub id: InvocationId,
    pub frame: &'a Frame,
}

impl<'a> ActiveInvocation<'a> {
    pub fn line(&self) -> u32 {
        self.frame.current_line()
    }

    pub fn binding_context(&self) -> BindingContext<'a> {
        self.frame.binding_context()
    }
}

/// Binding context of the script frame `skip` levels below the innermost
/// one.
pub fn resolve_caller_context<'a>(
    ctx: &CallContext<'a>,
    skip: usize,
) -> Result<BindingContext<'a>, ResolveError> {
    let frames = ctx.frames();
    frames
        .iter()
        .rev()
        .nth(skip)
        .map(Frame::binding_context)
        .ok_or(ResolveError::StackExhausted {
            skip,
            depth: frames.len(),
        })
}

/// Walk from the innermost frame outward to the first invocation of the
/// code identified by `identity`.
pub fn locate_originating_invocation<'a>(
    ctx: &CallContext<'a>,
    identity: &CodeIdentity,
) -> Result<ActiveInvocation<'a>, ResolveError> {
    ctx.frames()
        .iter()
        .rev()
        .find(|frame| {
            let code = frame.code();
            code.first_line == identity.first_line
                && code.name == identity.name
                && code.filename == identity.filename
        })
        .map(|frame| ActiveInvocation {
            id: frame.id(),
            frame,
        })
        .ok_or_else(|| ResolveError::OriginNotFound {
            identity: identity.clone(),
        })
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::assembler::CodeBuilder;
    use crate::values::{Function, Globals, NativeFunction, Value};
    use crate::vm::{ExecutionOptions, ExecutionError, SharedWriter, VM};

    type Inspector = Rc<dyn Fn(&CallContext<'_>) -> Result<Value, ExecutionError>>;

    /// `outer(x)` calls `inner(y)` which calls the native capture.
    fn run_nested(capture: Inspector) -> Result<Value, ExecutionError> {
        let globals = Globals::new();
        globals.set("g", "global");
        globals.set(
            "capture",
            Value::Native(NativeFunction::new("capture", move |ctx, _| capture(ctx))),
        );

        let mut inner = CodeBuilder::new("inner", "nested.py", 10);
        inner.param("y");
        inner.load_global("capture").call(0).return_value();
        globals.set(
            "inner",
            Value::Function(Rc::new(Function::new(
                Rc::new(inner.build().unwrap()),
                globals.clone(),
            ))),
        );

        let mut outer = CodeBuilder::new("outer", "nested.py", 1);
        outer.param("x");
        outer.load_global("inner").load_const("inner-y").call(1).return_value();
        let outer = Rc::new(Function::new(Rc::new(outer.build().unwrap()), globals));

        let stdout: SharedWriter = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut vm = VM::new(ExecutionOptions {
            stdout,
            ..ExecutionOptions::default()
        });
        vm.call(&outer, &[Value::str("outer-x")])
    }

    #[test]
    fn test_resolve_caller_context_skips_frames() {
        let result = run_nested(Rc::new(|ctx: &CallContext<'_>| -> Result<Value, ExecutionError> {
            let innermost = resolve_caller_context(ctx, 0)?;
            let below = resolve_caller_context(ctx, 1)?;
            Ok(Value::tuple([
                innermost.lookup("y").unwrap_or(Value::None),
                innermost.lookup("x").unwrap_or(Value::None),
                below.lookup("x").unwrap_or(Value::None),
                below.lookup("g").unwrap_or(Value::None),
            ]))
        }));
        assert_eq!(
            result.unwrap(),
            Value::tuple([
                Value::str("inner-y"),
                Value::None,
                Value::str("outer-x"),
                Value::str("global"),
            ])
        );
    }

    #[test]
    fn test_resolve_beyond_bottom() {
        let result = run_nested(Rc::new(|ctx: &CallContext<'_>| -> Result<Value, ExecutionError> {
            let err = resolve_caller_context(ctx, 2).unwrap_err();
            Ok(Value::str(err.to_string()))
        }));
        assert_eq!(
            result.unwrap(),
            Value::str("cannot skip 2 frames on a stack of depth 2")
        );
    }

    #[test]
    fn test_locate_originating_invocation() {
        let result = run_nested(Rc::new(|ctx: &CallContext<'_>| -> Result<Value, ExecutionError> {
            let outer_identity = ctx.frames()[0].identity();
            let found = locate_originating_invocation(ctx, &outer_identity)?;
            assert_eq!(found.id, ctx.frames()[0].id());
            Ok(Value::Int(i64::from(found.line())))
        }));
        assert_eq!(result.unwrap(), Value::Int(1));
    }

    #[test]
    fn test_missing_origin_is_internal_error() {
        let result = run_nested(Rc::new(|ctx: &CallContext<'_>| -> Result<Value, ExecutionError> {
            let stranger = CodeIdentity {
                filename: "elsewhere.py".into(),
                name: "stranger".into(),
                first_line: 1,
            };
            locate_originating_invocation(ctx, &stranger)?;
            Ok(Value::None)
        }));
        let err = result.unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.traceback.len(), 2);
    }
}
