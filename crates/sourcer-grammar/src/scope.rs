//! Names bound by `Bind` expressions, visible to predicates and actions.

use std::sync::Arc;

use sourcer_core::Value;

/// Bindings visible at one point of a parse.
///
/// The engine opens a frame per sequence (with [`Scope::mark`]) and drops it on
/// exit (with [`Scope::restore`]). Lookups see the innermost binding first.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: Vec<(Arc<str>, Value)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v)
    }

    pub fn bind(&mut self, name: Arc<str>, value: Value) {
        self.bindings.push((name, value));
    }

    pub fn mark(&self) -> usize {
        self.bindings.len()
    }

    /// Drop every binding made after `mark`.
    pub fn restore(&mut self, mark: usize) {
        self.bindings.truncate(mark);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(n, v)| (&**n, v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
