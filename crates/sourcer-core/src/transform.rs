//! Bottom-up rewriting of a syntax tree into a new value.
//!
//! A [`Transformer`] sees each node after all of its children were replaced by
//! their own transformed values. The input tree is borrowed and never modified.

use std::collections::HashMap;
use std::convert::Infallible;

use crate::tree::{Node, Operation, Value};

pub trait Transformer {
    type Error;

    /// Rewrite one node whose nested nodes are already transformed.
    fn transform_node(&mut self, node: Node) -> Result<Value, Self::Error>;

    /// Run `next` on every node this transformer leaves as a node.
    fn then<T>(self, next: T) -> Chain<Self, T>
    where
        Self: Sized,
        T: Transformer<Error = Self::Error>,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

/// Transform `root` bottom-up.
pub fn transform<T: Transformer>(root: &Node, transformer: &mut T) -> Result<Value, T::Error> {
    let value = transform_value(&root.value, transformer)?;
    transformer.transform_node(Node {
        rule: root.rule.clone(),
        class: root.class.clone(),
        span: root.span,
        value,
    })
}

/// Rebuild `value`, transforming every nested node.
pub fn transform_value<T: Transformer>(
    value: &Value,
    transformer: &mut T,
) -> Result<Value, T::Error> {
    Ok(match value {
        Value::Node(node) => transform(node, transformer)?,
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| transform_value(item, transformer))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| {
                    Ok::<_, T::Error>((key.clone(), transform_value(item, transformer)?))
                })
                .collect::<Result<_, _>>()?,
        ),
        Value::Operation(op) => {
            let op = match &**op {
                Operation::Infix {
                    left,
                    operator,
                    right,
                } => Operation::Infix {
                    left: transform_value(left, transformer)?,
                    operator: transform_value(operator, transformer)?,
                    right: transform_value(right, transformer)?,
                },
                Operation::Prefix { operator, operand } => Operation::Prefix {
                    operator: transform_value(operator, transformer)?,
                    operand: transform_value(operand, transformer)?,
                },
                Operation::Postfix { operand, operator } => Operation::Postfix {
                    operand: transform_value(operand, transformer)?,
                    operator: transform_value(operator, transformer)?,
                },
            };
            Value::Operation(Box::new(op))
        }
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
            value.clone()
        }
    })
}

/// Two transformers applied in order. See [`Transformer::then`].
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Transformer for Chain<A, B>
where
    A: Transformer,
    B: Transformer<Error = A::Error>,
{
    type Error = A::Error;

    fn transform_node(&mut self, node: Node) -> Result<Value, Self::Error> {
        match self.first.transform_node(node)? {
            Value::Node(node) => self.second.transform_node(*node),
            other => Ok(other),
        }
    }
}

type Handler<'f, E> = Box<dyn FnMut(Node) -> Result<Value, E> + 'f>;

/// Transformer that dispatches on node names.
///
/// Lookup order: the node's rule, then its class, then the fallback.
/// Without a fallback, unmatched nodes are kept as nodes.
pub struct TransformTable<'f, E = Infallible> {
    handlers: HashMap<String, Handler<'f, E>>,
    fallback: Option<Handler<'f, E>>,
}

impl<E> Default for TransformTable<'_, E> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }
}

impl<'f, E> TransformTable<'f, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        name: impl Into<String>,
        handler: impl FnMut(Node) -> Result<Value, E> + 'f,
    ) -> Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn fallback(mut self, handler: impl FnMut(Node) -> Result<Value, E> + 'f) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }
}

impl<E> Transformer for TransformTable<'_, E> {
    type Error = E;

    fn transform_node(&mut self, node: Node) -> Result<Value, E> {
        if let Some(handler) = self.handlers.get_mut(&*node.rule) {
            return handler(node);
        }
        let class = node.class.clone();
        if let Some(handler) = class.as_deref().and_then(|c| self.handlers.get_mut(c)) {
            return handler(node);
        }
        match &mut self.fallback {
            Some(handler) => handler(node),
            None => Ok(Value::Node(Box::new(node))),
        }
    }
}
