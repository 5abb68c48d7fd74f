//! Interpolation of caller variables into message templates.
//!
//! Two marker syntaxes are recognized:
//!
//! | Marker         | Substitution                     |
//! |----------------|----------------------------------|
//! | `[[name]]`     | plain form (`Display`)           |
//! | `{{name}}`     | diagnostic form (`Value::repr`)  |
//! | `[[name?]]`    | `name:` followed by plain form   |
//! | `{{name?}}`    | `name:` followed by diagnostic   |
//!
//! Whitespace is allowed inside the brackets (`[[ name ]]`). Names resolve
//! against the locals of the binding context, then its globals. Markers
//! whose name is not bound are left untouched.
//!
//! Both syntaxes are matched by a single regex in one left-to-right pass, so
//! substituted text is never scanned again: a value that itself contains
//! `[[x]]` comes out verbatim.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::scope::BindingContext;

lazy_static! {
    static ref MARKER: Regex =
        Regex::new(r"\[\[\s*(\w+)(\?)?\s*\]\]|\{\{\s*(\w+)(\?)?\s*\}\}").unwrap();
}

/// Replace every bound marker in `template` with the value it names.
pub fn interpolate(template: &str, context: &BindingContext<'_>) -> String {
    MARKER
        .replace_all(template, |caps: &Captures<'_>| substitute(caps, context))
        .into_owned()
}

fn substitute(caps: &Captures<'_>, context: &BindingContext<'_>) -> String {
    let (name, echo, diagnostic) = match (caps.get(1), caps.get(3)) {
        (Some(name), _) => (name.as_str(), caps.get(2).is_some(), false),
        (None, Some(name)) => (name.as_str(), caps.get(4).is_some(), true),
        (None, None) => return caps[0].to_string(),
    };

    let Some(value) = context.lookup(name) else {
        return caps[0].to_string();
    };

    let prefix = if echo { format!("{}:", name) } else { String::new() };
    if diagnostic {
        format!("{}{}", prefix, value.repr())
    } else {
        format!("{}{}", prefix, value)
    }
}

/// Whether `template` contains at least one marker, bound or not.
pub fn has_markers(template: &str) -> bool {
    MARKER.is_match(template)
}

#[cfg(test)]
#[path = "template_test.rs"]
mod template_test;
