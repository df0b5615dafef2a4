//! Syntax tree produced by a successful parse.
//!
//! Every rule success yields exactly one [`Node`]. Everything below a node is a
//! [`Value`]: matched text, lists from sequences and repetitions, named fields
//! from bindings, folded operator applications, and nested nodes.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::colors::Colors;
use crate::position::Span;

/// Result of one successful rule invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Name of the rule that matched.
    pub rule: Arc<str>,
    /// Enclosing class, when the rule was matched as an alternative of one.
    pub class: Option<Arc<str>>,
    pub span: Span,
    pub value: Value,
}

/// Operator application folded by an operator-precedence expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Infix {
        left: Value,
        operator: Value,
        right: Value,
    },
    Prefix {
        operator: Value,
        operand: Value,
    },
    Postfix {
        operand: Value,
        operator: Value,
    },
}

/// Semantic value carried through the combinators.
///
/// `Object` keeps fields in match order.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    Node(Box<Node>),
    Operation(Box<Operation>),
}

impl Node {
    pub fn new(rule: impl Into<Arc<str>>, span: Span, value: Value) -> Self {
        Self {
            rule: rule.into(),
            class: None,
            span,
            value,
        }
    }

    /// True if `name` is this node's rule or its class.
    pub fn is(&self, name: &str) -> bool {
        &*self.rule == name || self.class.as_deref() == Some(name)
    }

    /// The source text this node covers.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        self.span.slice(source)
    }

    /// Field of an object value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }

    /// Nodes nested directly in this node's value, in match order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        collect_nodes(&self.value, &mut out);
        out
    }

    /// Pre-order iterator over this node and every node below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

fn collect_nodes<'a>(value: &'a Value, out: &mut Vec<&'a Node>) {
    match value {
        Value::Node(node) => out.push(node),
        Value::Array(items) => items.iter().for_each(|v| collect_nodes(v, out)),
        Value::Object(fields) => fields.iter().for_each(|(_, v)| collect_nodes(v, out)),
        Value::Operation(op) => op.operands().into_iter().for_each(|v| collect_nodes(v, out)),
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {}
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}

impl Operation {
    /// Operands and operators in source order.
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Operation::Infix {
                left,
                operator,
                right,
            } => vec![left, operator, right],
            Operation::Prefix { operator, operand } => vec![operator, operand],
            Operation::Postfix { operand, operator } => vec![operand, operator],
        }
    }

    pub fn operator(&self) -> &Value {
        match self {
            Operation::Infix { operator, .. }
            | Operation::Prefix { operator, .. }
            | Operation::Postfix { operator, .. } => operator,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Operation::Infix { .. } => "infix",
            Operation::Prefix { .. } => "prefix",
            Operation::Postfix { .. } => "postfix",
        }
    }

    fn fields(&self) -> Vec<(&'static str, &Value)> {
        match self {
            Operation::Infix {
                left,
                operator,
                right,
            } => vec![("left", left), ("operator", operator), ("right", right)],
            Operation::Prefix { operator, operand } => {
                vec![("operator", operator), ("operand", operand)]
            }
            Operation::Postfix { operand, operator } => {
                vec![("operand", operand), ("operator", operator)]
            }
        }
    }
}

impl Value {
    pub fn infix(left: Value, operator: Value, right: Value) -> Self {
        Value::Operation(Box::new(Operation::Infix {
            left,
            operator,
            right,
        }))
    }

    pub fn prefix(operator: Value, operand: Value) -> Self {
        Value::Operation(Box::new(Operation::Prefix { operator, operand }))
    }

    pub fn postfix(operand: Value, operator: Value) -> Self {
        Value::Operation(Box::new(Operation::Postfix { operand, operator }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Value::Operation(op) => Some(op),
            _ => None,
        }
    }

    /// Named field of an `Object`, looking through a `Node` wrapper.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            Value::Node(node) => node.value.get(name),
            _ => None,
        }
    }

    /// Positional item of an `Array` or `Object`, looking through a `Node` wrapper.
    pub fn index(&self, index: usize) -> Option<&Value> {
        match self {
            Value::Array(items) => items.get(index),
            Value::Object(fields) => fields.get(index).map(|(_, v)| v),
            Value::Node(node) => node.value.index(index),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Value::Node(node) => Some(*node),
            _ => None,
        }
    }

    /// Format as colored JSON-like text.
    ///
    /// Keys and rule names are blue, strings green, structure dim.
    pub fn format(&self, pretty: bool, colors: Colors) -> String {
        let mut w = Writer {
            out: String::new(),
            c: colors,
            pretty,
        };
        w.value(self, 0);
        w.out
    }
}

impl Node {
    /// Format as colored JSON-like text. See [`Value::format`].
    pub fn format(&self, pretty: bool, colors: Colors) -> String {
        let mut w = Writer {
            out: String::new(),
            c: colors,
            pretty,
        };
        w.node(self, 0);
        w.out
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(Box::new(node))
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Node(node) => node.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Operation(op) => {
                let fields = op.fields();
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("$op", op.kind())?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.class.is_some() { 4 } else { 3 };
        let mut s = serializer.serialize_struct("Node", len)?;
        s.serialize_field("rule", &*self.rule)?;
        if let Some(class) = &self.class {
            s.serialize_field("class", &**class)?;
        } else {
            s.skip_field("class")?;
        }
        s.serialize_field("span", &self.span)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}

struct Writer {
    out: String,
    c: Colors,
    pretty: bool,
}

impl Writer {
    fn dim(&mut self, s: &str) {
        self.out.push_str(self.c.dim);
        self.out.push_str(s);
        self.out.push_str(self.c.reset);
    }

    fn string(&mut self, color: &'static str, s: &str) {
        self.out.push_str(color);
        self.out.push('"');
        self.out.push_str(&escape_json_string(s));
        self.out.push('"');
        self.out.push_str(self.c.reset);
    }

    fn newline(&mut self, indent: usize) {
        if self.pretty {
            self.out.push('\n');
            self.out.push_str(&" ".repeat(indent));
        }
    }

    fn value(&mut self, value: &Value, indent: usize) {
        match value {
            Value::Null => self.dim("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => self.out.push_str(&n.to_string()),
            Value::Float(n) => self.out.push_str(&n.to_string()),
            Value::String(s) => self.string(self.c.green, s),
            Value::Node(node) => self.node(node, indent),
            Value::Array(items) => self.array(items, indent),
            Value::Object(fields) => {
                let fields: Vec<(&str, Field<'_>)> = fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), Field::Value(v)))
                    .collect();
                self.object(&fields, indent);
            }
            Value::Operation(op) => {
                let mut fields = vec![("$op", Field::Name(op.kind()))];
                fields.extend(op.fields().into_iter().map(|(k, v)| (k, Field::Value(v))));
                self.object(&fields, indent);
            }
        }
    }

    fn node(&mut self, node: &Node, indent: usize) {
        let span = node.span.range();
        let mut fields = vec![("$rule", Field::Name(&node.rule))];
        if let Some(class) = &node.class {
            fields.push(("$class", Field::Name(class)));
        }
        fields.push(("$span", Field::Range(span.start, span.end)));
        fields.push(("value", Field::Value(&node.value)));
        self.object(&fields, indent);
    }

    fn array(&mut self, items: &[Value], indent: usize) {
        self.dim("[");
        if items.is_empty() {
            self.dim("]");
            return;
        }

        let inner = if self.pretty { indent + 2 } else { 0 };
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.dim(",");
            }
            self.newline(inner);
            self.value(item, inner);
        }
        self.newline(indent);
        self.dim("]");
    }

    fn object(&mut self, fields: &[(&str, Field<'_>)], indent: usize) {
        self.dim("{");
        if fields.is_empty() {
            self.dim("}");
            return;
        }

        let inner = if self.pretty { indent + 2 } else { 0 };
        for (i, (key, field)) in fields.iter().enumerate() {
            if i > 0 {
                self.dim(",");
            }
            self.newline(inner);
            self.string(self.c.blue, key);
            self.dim(":");
            if self.pretty {
                self.out.push(' ');
            }
            match field {
                Field::Value(v) => self.value(v, inner),
                Field::Name(name) => self.string(self.c.blue, name),
                Field::Range(start, end) => {
                    self.dim("[");
                    self.out.push_str(&start.to_string());
                    self.dim(", ");
                    self.out.push_str(&end.to_string());
                    self.dim("]");
                }
            }
        }
        self.newline(indent);
        self.dim("}");
    }
}

enum Field<'a> {
    Value(&'a Value),
    Name(&'a str),
    Range(usize, usize),
}

fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
