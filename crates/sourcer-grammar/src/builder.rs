//! Functions for writing grammars as Rust expressions.
//!
//! ```ignore
//! let sum = seq([rule("Number"), bind("op", lit("+")), rule("Number")]);
//! ```

use std::sync::Arc;

use sourcer_core::Value;

use crate::expr::{
    Action, ActionError, Expr, OperatorTable, Polarity, Predicate, RuleRef, Selector, Terminal,
};
use crate::matcher::{Matcher, RegexMatcher};
use crate::scope::Scope;

/// Matches `text` exactly.
pub fn lit(text: impl Into<String>) -> Expr {
    terminal(Matcher::Literal(text.into()))
}

/// Matches `pattern` anchored at the cursor. Invalid patterns are reported by `build`.
pub fn regex(pattern: &str) -> Expr {
    terminal(Matcher::Regex(RegexMatcher::new(pattern)))
}

fn terminal(matcher: Matcher) -> Expr {
    Expr::Terminal(Terminal {
        matcher,
        skip_ignored: false,
    })
}

pub fn seq(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Sequence(items.into_iter().collect())
}

pub fn choice(alternatives: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Choice(alternatives.into_iter().collect())
}

pub fn repeat(expr: Expr, min: usize, max: Option<usize>) -> Expr {
    Expr::Repeat {
        expr: Box::new(expr),
        min,
        max,
    }
}

/// Zero or more.
pub fn many(expr: Expr) -> Expr {
    repeat(expr, 0, None)
}

/// One or more.
pub fn some(expr: Expr) -> Expr {
    repeat(expr, 1, None)
}

/// `expr`'s value, or `null` without consuming input.
pub fn opt(expr: Expr) -> Expr {
    choice([expr, constant(Value::Null)])
}

pub fn followed_by(expr: Expr) -> Expr {
    Expr::Lookahead {
        expr: Box::new(expr),
        polarity: Polarity::Positive,
    }
}

pub fn not_followed_by(expr: Expr) -> Expr {
    Expr::Lookahead {
        expr: Box::new(expr),
        polarity: Polarity::Negative,
    }
}

/// Succeeds only at the end of input.
pub fn eof() -> Expr {
    not_followed_by(regex("(?s:.)"))
}

pub fn predicate<F>(label: &str, f: F) -> Expr
where
    F: Fn(&Scope) -> bool + Send + Sync + 'static,
{
    Expr::Predicate(Predicate::new(label, f))
}

pub fn bind(name: &str, expr: Expr) -> Expr {
    Expr::Bind {
        name: name.into(),
        expr: Box::new(expr),
    }
}

/// Sequence where every item is bound, producing an object with these fields.
pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Expr)>) -> Expr {
    seq(fields.into_iter().map(|(name, expr)| bind(name, expr)))
}

/// Item `index` of `expr`'s value.
pub fn project(expr: Expr, index: usize) -> Expr {
    Expr::Project {
        expr: Box::new(expr),
        selector: Selector::Index(index),
    }
}

/// Field `name` of `expr`'s value.
pub fn field(expr: Expr, name: &str) -> Expr {
    Expr::Project {
        expr: Box::new(expr),
        selector: Selector::Name(name.into()),
    }
}

/// Match `keep` then `discard`, keeping the first value.
///
/// The kept item is bound, so a silent `discard` does not shift it.
pub fn left(keep: Expr, discard: Expr) -> Expr {
    field(seq([bind("0", keep), discard]), "0")
}

/// Match `discard` then `keep`, keeping the second value.
pub fn right(discard: Expr, keep: Expr) -> Expr {
    field(seq([discard, bind("1", keep)]), "1")
}

pub fn apply<F>(expr: Expr, label: &str, f: F) -> Expr
where
    F: Fn(Value, &Scope) -> Result<Value, ActionError> + Send + Sync + 'static,
{
    Expr::Apply {
        expr: Box::new(expr),
        action: Action::new(label, f),
    }
}

/// Infallible [`apply`].
pub fn map<F>(expr: Expr, label: &str, f: F) -> Expr
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    apply(expr, label, move |value, _| Ok(f(value)))
}

/// Produces `value` without consuming input.
pub fn constant(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Always fails with `message`.
pub fn fail(message: &str) -> Expr {
    Expr::Fail(message.into())
}

/// Reference to a rule (or to a parameter of the enclosing template).
pub fn rule(name: &str) -> Expr {
    call(name, [])
}

/// Instantiate a parameterized rule.
pub fn call(name: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Ref(RuleRef {
        name: Arc::from(name),
        args: args.into_iter().collect(),
    })
}

/// Zero or more `item`s separated by `sep`, without a trailing separator.
pub fn separated(item: Expr, sep: Expr) -> Expr {
    separated_with(item, sep, false, true)
}

pub fn separated_with(item: Expr, sep: Expr, allow_trailer: bool, allow_empty: bool) -> Expr {
    Expr::Separated {
        item: Box::new(item),
        sep: Box::new(sep),
        allow_trailer,
        allow_empty,
    }
}

pub fn precedence(table: OperatorTable) -> Expr {
    Expr::Precedence(Box::new(table))
}
