//! Warning analyses over a validated rule set.
//!
//! Nothing here rejects a grammar: left recursion and zero-width repetition
//! are also caught while parsing. The warnings point at them earlier.

mod lints;
mod nullable;
mod recursion;


use std::sync::Arc;

use indexmap::IndexMap;

use crate::diagnostics::Diagnostics;
use crate::registry::Rule;

pub use nullable::Nullability;

pub(crate) fn analyze(rules: &IndexMap<Arc<str>, Rule>) -> Diagnostics {
    let nullability = Nullability::compute(rules);
    let mut diagnostics = Diagnostics::new();
    lints::check(rules, &nullability, &mut diagnostics);
    recursion::check(rules, &nullability, &mut diagnostics);
    diagnostics
}
