//! Turning redirected print output into log records.
//!
//! Rewritten print sites call the handler built by [`print_handler`]:
//! `h(marker, value)` for each item and `h(marker)` at the end of the
//! statement. Items are buffered per invocation so that recursive or nested
//! instrumented calls never mix their fragments; the terminator joins the
//! buffer and emits one record.

use ecow::EcoString;

use super::level::{Level, LevelRegistry};
use super::logger::Logger;
use super::record::Origin;
use crate::rewrite::PrintMarker;
use crate::template::interpolate;
use crate::values::{NativeFunction, Value};
use crate::vm::{CallContext, ExecutionError, InvocationId, RuntimeError};

/// Fragment buffers of the invocations currently printing.
#[derive(Debug, Default)]
pub struct Dispatcher {
    buffers: Vec<(InvocationId, Vec<String>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one print item to the buffer of `invocation`.
    pub fn on_fragment(&mut self, ctx: &CallContext<'_>, invocation: InvocationId, text: String) {
        self.prune(ctx);
        match self.buffers.iter_mut().rev().find(|(id, _)| *id == invocation) {
            Some((_, fragments)) => fragments.push(text),
            None => self.buffers.push((invocation, vec![text])),
        }
    }

    /// Remove the buffer of `invocation` and join its fragments with single
    /// spaces. An invocation that printed nothing yields an empty message.
    pub fn take_message(&mut self, ctx: &CallContext<'_>, invocation: InvocationId) -> String {
        self.prune(ctx);
        match self.buffers.iter().rposition(|(id, _)| *id == invocation) {
            Some(index) => self.buffers.remove(index).1.join(" "),
            None => String::new(),
        }
    }

    /// Number of invocations with buffered fragments.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    /// Discard buffers of invocations that are no longer on the stack.
    fn prune(&mut self, ctx: &CallContext<'_>) {
        let before = self.buffers.len();
        self.buffers.retain(|(id, _)| ctx.is_active(*id));
        let dropped = before - self.buffers.len();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded print buffers of finished invocations");
        }
    }
}

/// Severity of a flushed message: the first level name it starts with,
/// then the decoration's default, then the logger's threshold.
pub fn infer_severity(
    registry: &LevelRegistry,
    message: &str,
    default_severity: Option<Level>,
    threshold: Level,
) -> Level {
    let inferred = registry.infer(message);
    let level = inferred.or(default_severity).unwrap_or(threshold);
    tracing::debug!(
        %level,
        inferred = inferred.is_some(),
        "severity of redirected print"
    );
    level
}

/// The native function rewritten print sites call for `logger`.
pub(super) fn print_handler(logger: Logger, tee: bool) -> NativeFunction {
    let name: EcoString = ecow::eco_format!("{}.smart_print", logger.name());
    let function = name.clone();
    NativeFunction::new(name, move |ctx, args| {
        let (marker, item) = match args {
            [marker] => (marker, None),
            [marker, item] => (marker, Some(item)),
            _ => {
                return Err(RuntimeError::Arity {
                    function: function.clone(),
                    expected: "1 to 2".into(),
                    given: args.len(),
                }
                .into());
            }
        };
        let marker = PrintMarker::from_value(marker)
            .ok_or_else(|| RuntimeError::type_error("print handler called without a print marker"))?;
        match item {
            Some(item) => on_fragment(&logger, ctx, &marker, item)?,
            None => on_flush(&logger, ctx, &marker, tee)?,
        }
        Ok(Value::None)
    })
}

fn on_fragment(
    logger: &Logger,
    ctx: &CallContext<'_>,
    marker: &PrintMarker,
    item: &Value,
) -> Result<(), ExecutionError> {
    let invocation = ctx.originating_invocation(&marker.origin.identity())?;
    logger
        .dispatcher()
        .borrow_mut()
        .on_fragment(ctx, invocation.id, item.to_string());
    Ok(())
}

fn on_flush(
    logger: &Logger,
    ctx: &CallContext<'_>,
    marker: &PrintMarker,
    tee: bool,
) -> Result<(), ExecutionError> {
    let invocation = ctx.originating_invocation(&marker.origin.identity())?;
    let message = logger.dispatcher().borrow_mut().take_message(ctx, invocation.id);

    let level = infer_severity(
        logger.registry(),
        &message,
        marker.default_severity.map(Level),
        logger.level(),
    );
    let message = interpolate(&message, &invocation.binding_context());
    logger.emit(level, message, Some(Origin::of(invocation.frame)), tee)?;
    Ok(())
}
