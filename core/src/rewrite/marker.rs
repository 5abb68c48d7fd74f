use std::rc::Rc;

use crate::values::Value;
use crate::vm::CodeObject;

/// Constant passed to the redirection handler by every rewritten print
/// site: the decoration's default severity and the code it was applied to.
#[derive(Debug, Clone)]
pub struct PrintMarker {
    pub default_severity: Option<u32>,
    pub origin: Rc<CodeObject>,
}

impl PrintMarker {
    pub fn new(default_severity: Option<u32>, origin: Rc<CodeObject>) -> Self {
        Self {
            default_severity,
            origin,
        }
    }

    /// Encode as the `(severity or None, code)` constant tuple.
    pub fn to_value(&self) -> Value {
        let severity = self
            .default_severity
            .map_or(Value::None, |level| Value::Int(i64::from(level)));
        Value::tuple([severity, Value::Code(self.origin.clone())])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Tuple(items) = value else {
            return None;
        };
        match &items[..] {
            [severity, Value::Code(origin)] => {
                let default_severity = match severity {
                    Value::None => None,
                    other => Some(u32::try_from(other.as_int()?).ok()?),
                };
                Some(Self::new(default_severity, origin.clone()))
            }
            _ => None,
        }
    }
}
