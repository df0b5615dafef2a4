//! Read-only, pre-order traversal of a syntax tree.
//!
//! Implement [`Visitor`] and override `visit_node`. Call [`walk_node`] inside
//! the override to descend into children (omit it to prune the subtree).
//!
//! ```ignore
//! impl Visitor for Counter {
//!     fn visit_node(&mut self, node: &Node) {
//!         self.seen += 1;
//!         walk_node(self, node);
//!     }
//! }
//! ```
//!
//! For dispatch by rule name without a dedicated type, use [`VisitTable`].

use std::collections::HashMap;

use crate::tree::{Node, Value};

pub trait Visitor: Sized {
    fn visit_node(&mut self, node: &Node) {
        walk_node(self, node);
    }
}

/// Visit `root` and everything below it.
pub fn visit<V: Visitor>(root: &Node, visitor: &mut V) {
    visitor.visit_node(root);
}

pub fn walk_node<V: Visitor>(visitor: &mut V, node: &Node) {
    walk_value(visitor, &node.value);
}

/// Visit every node nested in `value`, in match order.
pub fn walk_value<V: Visitor>(visitor: &mut V, value: &Value) {
    match value {
        Value::Node(node) => visitor.visit_node(node),
        Value::Array(items) => {
            for item in items {
                walk_value(visitor, item);
            }
        }
        Value::Object(fields) => {
            for (_, item) in fields {
                walk_value(visitor, item);
            }
        }
        Value::Operation(op) => {
            for item in op.operands() {
                walk_value(visitor, item);
            }
        }
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {}
    }
}

/// What a [`VisitTable`] handler wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
}

type Handler<'f> = Box<dyn FnMut(&Node) -> Walk + 'f>;

/// Visitor that dispatches on node names.
///
/// Lookup order: the node's rule, then its class, then the fallback.
/// Nodes with no handler are descended into.
#[derive(Default)]
pub struct VisitTable<'f> {
    handlers: HashMap<String, Handler<'f>>,
    fallback: Option<Handler<'f>>,
}

impl<'f> VisitTable<'f> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    pub fn on(mut self, name: impl Into<String>, handler: impl FnMut(&Node) -> Walk + 'f) -> Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn fallback(mut self, handler: impl FnMut(&Node) -> Walk + 'f) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    fn dispatch(&mut self, node: &Node) -> Walk {
        if let Some(handler) = self.handlers.get_mut(&*node.rule) {
            return handler(node);
        }
        if let Some(handler) = node
            .class
            .as_deref()
            .and_then(|class| self.handlers.get_mut(class))
        {
            return handler(node);
        }
        match &mut self.fallback {
            Some(handler) => handler(node),
            None => Walk::Continue,
        }
    }
}

impl Visitor for VisitTable<'_> {
    fn visit_node(&mut self, node: &Node) {
        if self.dispatch(node) == Walk::Continue {
            walk_node(self, node);
        }
    }
}
