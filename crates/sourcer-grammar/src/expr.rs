//! Parsing expressions.
//!
//! A grammar is a set of named rules whose bodies are [`Expr`] trees. The
//! engine interprets these trees directly; nothing here knows about input
//! positions or caching.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sourcer_core::{Colors, Value};

use crate::matcher::Matcher;
use crate::scope::Scope;

#[derive(Clone, Debug)]
pub enum Expr {
    Terminal(Terminal),
    Sequence(Vec<Expr>),
    /// Ordered choice: the first alternative that succeeds wins.
    Choice(Vec<Expr>),
    Repeat {
        expr: Box<Expr>,
        min: usize,
        max: Option<usize>,
    },
    Lookahead {
        expr: Box<Expr>,
        polarity: Polarity,
    },
    Predicate(Predicate),
    Bind {
        name: Arc<str>,
        expr: Box<Expr>,
    },
    Project {
        expr: Box<Expr>,
        selector: Selector,
    },
    Apply {
        expr: Box<Expr>,
        action: Action,
    },
    Precedence(Box<OperatorTable>),
    Ref(RuleRef),
    /// Template parameter, substituted when a parameterized rule is instantiated.
    Param(Param),
    /// `item (sep item)*`, optionally empty and optionally ending with `sep`.
    Separated {
        item: Box<Expr>,
        sep: Box<Expr>,
        allow_trailer: bool,
        allow_empty: bool,
    },
    Constant(Value),
    Fail(Arc<str>),
}

#[derive(Clone, Debug)]
pub struct Terminal {
    pub matcher: Matcher,
    /// Skip ignored rules after a match. Set by `GrammarBuilder::build` for
    /// terminals that belong to non-ignored rules.
    pub skip_ignored: bool,
}

#[derive(Clone, Debug)]
pub struct RuleRef {
    pub name: Arc<str>,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub index: usize,
    pub name: Arc<str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Index(usize),
    Name(Arc<str>),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(i) => write!(f, "{i}"),
            Selector::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fixity {
    Left,
    Right,
    /// Binary, folds at most once per chain.
    NonAssoc,
    Prefix,
    Postfix,
}

impl Fixity {
    pub fn is_binary(self) -> bool {
        matches!(self, Fixity::Left | Fixity::Right | Fixity::NonAssoc)
    }

    fn keyword(self) -> &'static str {
        match self {
            Fixity::Left => "left",
            Fixity::Right => "right",
            Fixity::NonAssoc => "nonassoc",
            Fixity::Prefix => "prefix",
            Fixity::Postfix => "postfix",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OperatorLevel {
    pub fixity: Fixity,
    /// Higher binds tighter.
    pub precedence: u32,
    pub operator: Expr,
}

/// Operand expression plus operator levels for precedence climbing.
#[derive(Clone, Debug)]
pub struct OperatorTable {
    pub operand: Expr,
    pub levels: Vec<OperatorLevel>,
}

impl OperatorTable {
    pub fn new(operand: Expr) -> Self {
        Self {
            operand,
            levels: Vec::new(),
        }
    }

    pub fn level(mut self, fixity: Fixity, precedence: u32, operator: Expr) -> Self {
        self.levels.push(OperatorLevel {
            fixity,
            precedence,
            operator,
        });
        self
    }

    pub fn left(self, precedence: u32, operator: Expr) -> Self {
        self.level(Fixity::Left, precedence, operator)
    }

    pub fn right(self, precedence: u32, operator: Expr) -> Self {
        self.level(Fixity::Right, precedence, operator)
    }

    pub fn non_assoc(self, precedence: u32, operator: Expr) -> Self {
        self.level(Fixity::NonAssoc, precedence, operator)
    }

    pub fn prefix(self, precedence: u32, operator: Expr) -> Self {
        self.level(Fixity::Prefix, precedence, operator)
    }

    pub fn postfix(self, precedence: u32, operator: Expr) -> Self {
        self.level(Fixity::Postfix, precedence, operator)
    }

    pub fn binary(&self) -> impl Iterator<Item = &OperatorLevel> {
        self.levels.iter().filter(|l| l.fixity.is_binary())
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &OperatorLevel> {
        self.levels.iter().filter(|l| l.fixity == Fixity::Prefix)
    }

    pub fn postfixes(&self) -> impl Iterator<Item = &OperatorLevel> {
        self.levels.iter().filter(|l| l.fixity == Fixity::Postfix)
    }
}

/// Failure reported by a host action.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    abort: bool,
}

impl ActionError {
    /// Fails the current alternative; the parse may still backtrack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            abort: false,
        }
    }

    /// Stops the whole parse.
    pub fn abort(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            abort: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_abort(&self) -> bool {
        self.abort
    }
}

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(0);

fn next_callback_id() -> u64 {
    NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed)
}

type ActionFn = dyn Fn(Value, &Scope) -> Result<Value, ActionError> + Send + Sync;
type PredicateFn = dyn Fn(&Scope) -> bool + Send + Sync;

/// Host function mapping a matched value to a new one.
#[derive(Clone)]
pub struct Action {
    id: u64,
    label: Arc<str>,
    f: Arc<ActionFn>,
}

impl Action {
    pub fn new<F>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Value, &Scope) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        Self {
            id: next_callback_id(),
            label: label.into(),
            f: Arc::new(f),
        }
    }

    pub fn call(&self, value: Value, scope: &Scope) -> Result<Value, ActionError> {
        (self.f)(value, scope)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({}#{})", self.label, self.id)
    }
}

/// Host condition over the bindings in scope.
#[derive(Clone)]
pub struct Predicate {
    id: u64,
    label: Arc<str>,
    f: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(label: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&Scope) -> bool + Send + Sync + 'static,
    {
        Self {
            id: next_callback_id(),
            label: label.into(),
            f: Arc::new(f),
        }
    }

    pub fn test(&self, scope: &Scope) -> bool {
        (self.f)(scope)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({}#{})", self.label, self.id)
    }
}

impl Expr {
    /// Visit direct children.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match self {
            Expr::Sequence(items) | Expr::Choice(items) => items.iter().for_each(f),
            Expr::Repeat { expr, .. }
            | Expr::Lookahead { expr, .. }
            | Expr::Bind { expr, .. }
            | Expr::Project { expr, .. }
            | Expr::Apply { expr, .. } => f(expr.as_ref()),
            Expr::Precedence(table) => {
                f(&table.operand);
                table.levels.iter().for_each(|l| f(&l.operator));
            }
            Expr::Ref(r) => r.args.iter().for_each(f),
            Expr::Separated { item, sep, .. } => {
                f(item.as_ref());
                f(sep.as_ref());
            }
            Expr::Terminal(_)
            | Expr::Predicate(_)
            | Expr::Param(_)
            | Expr::Constant(_)
            | Expr::Fail(_) => {}
        }
    }

    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Expr)) {
        match self {
            Expr::Sequence(items) | Expr::Choice(items) => items.iter_mut().for_each(f),
            Expr::Repeat { expr, .. }
            | Expr::Lookahead { expr, .. }
            | Expr::Bind { expr, .. }
            | Expr::Project { expr, .. }
            | Expr::Apply { expr, .. } => f(expr.as_mut()),
            Expr::Precedence(table) => {
                f(&mut table.operand);
                table.levels.iter_mut().for_each(|l| f(&mut l.operator));
            }
            Expr::Ref(r) => r.args.iter_mut().for_each(f),
            Expr::Separated { item, sep, .. } => {
                f(item.as_mut());
                f(sep.as_mut());
            }
            Expr::Terminal(_)
            | Expr::Predicate(_)
            | Expr::Param(_)
            | Expr::Constant(_)
            | Expr::Fail(_) => {}
        }
    }

    /// Replace every `Param(i)` with `args[i]`.
    ///
    /// Parameters without a matching argument are left in place.
    pub fn substitute(&self, args: &[Expr]) -> Expr {
        let mut out = self.clone();
        if !args.is_empty() {
            substitute_in_place(&mut out, args);
        }
        out
    }

    /// Structural identity used to tell rule instantiations apart.
    ///
    /// Strings are escaped, so distinct expressions never share a key. Host
    /// callbacks are distinguished by identity, not by label.
    pub fn fingerprint(&self) -> String {
        Key(self).to_string()
    }

    fn is_choice(&self) -> bool {
        matches!(self, Expr::Choice(_))
    }
}

fn substitute_in_place(expr: &mut Expr, args: &[Expr]) {
    if let Expr::Param(param) = expr {
        if let Some(arg) = args.get(param.index) {
            *expr = arg.clone();
        }
        return;
    }
    expr.for_each_child_mut(|child| substitute_in_place(child, args));
}

/// Writes `expr`, parenthesized when it is a choice used as an operand.
fn operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if expr.is_choice() {
        f.write_str("(")?;
        fmt::Display::fmt(expr, f)?;
        f.write_str(")")
    } else {
        fmt::Display::fmt(expr, f)
    }
}

/// Comma-separated list, keeping the formatter's flags.
fn list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt::Display::fmt(item, f)?;
    }
    Ok(())
}

/// Tagged rendering behind [`Expr::fingerprint`].
struct Key<'a>(&'a Expr);

impl Key<'_> {
    fn call(f: &mut fmt::Formatter<'_>, tag: &str, items: &[Expr]) -> fmt::Result {
        write!(f, "{tag}(")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", Key(item))?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Terminal(t) => {
                let skip = if t.skip_ignored { "~" } else { "" };
                match &t.matcher {
                    Matcher::Literal(lit) => write!(f, "lit{skip}({lit:?})"),
                    Matcher::Regex(re) => write!(f, "re{skip}({:?})", re.pattern()),
                }
            }
            Expr::Sequence(items) => Key::call(f, "seq", items),
            Expr::Choice(alts) => Key::call(f, "alt", alts),
            Expr::Repeat { expr, min, max } => {
                write!(f, "rep({min},{max:?},{})", Key(expr))
            }
            Expr::Lookahead { expr, polarity } => {
                write!(f, "look({polarity:?},{})", Key(expr))
            }
            Expr::Predicate(p) => write!(f, "pred({})", p.id),
            Expr::Bind { name, expr } => write!(f, "bind({name:?},{})", Key(expr)),
            Expr::Project { expr, selector } => {
                write!(f, "proj({selector:?},{})", Key(expr))
            }
            Expr::Apply { expr, action } => write!(f, "apply({},{})", action.id, Key(expr)),
            Expr::Precedence(table) => {
                write!(f, "prec({}", Key(&table.operand))?;
                for level in &table.levels {
                    write!(
                        f,
                        ",{:?}({},{})",
                        level.fixity,
                        level.precedence,
                        Key(&level.operator)
                    )?;
                }
                f.write_str(")")
            }
            Expr::Ref(r) => Key::call(f, &format!("ref{:?}", r.name), &r.args),
            Expr::Param(param) => write!(f, "param({},{:?})", param.index, param.name),
            Expr::Separated {
                item,
                sep,
                allow_trailer,
                allow_empty,
            } => write!(
                f,
                "sep({allow_trailer},{allow_empty},{},{})",
                Key(item),
                Key(sep)
            ),
            Expr::Constant(value) => write!(f, "const({value:?})"),
            Expr::Fail(message) => write!(f, "fail({message:?})"),
        }
    }
}

/// Grammar-like rendering, used in expectations and diagnostics.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Terminal(t) => write!(f, "{}", t.matcher),
            Expr::Sequence(items) => {
                f.write_str("[")?;
                list(f, items)?;
                f.write_str("]")
            }
            Expr::Choice(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    operand(f, alt)?;
                }
                Ok(())
            }
            Expr::Repeat { expr, min, max } => {
                operand(f, expr)?;
                match (min, max) {
                    (0, None) => f.write_str("*"),
                    (1, None) => f.write_str("+"),
                    (0, Some(1)) => f.write_str("?"),
                    (min, None) => write!(f, "{{{min},}}"),
                    (min, Some(max)) => write!(f, "{{{min},{max}}}"),
                }
            }
            Expr::Lookahead { expr, polarity } => {
                f.write_str(match polarity {
                    Polarity::Positive => "&",
                    Polarity::Negative => "!",
                })?;
                operand(f, expr)
            }
            Expr::Predicate(p) => write!(f, "?{}", p.label),
            Expr::Bind { name, expr } => {
                write!(f, "{name}: ")?;
                operand(f, expr)
            }
            Expr::Project { expr, selector } => {
                operand(f, expr)?;
                write!(f, ".{selector}")
            }
            Expr::Apply { expr, action } => {
                operand(f, expr)?;
                write!(f, " |> {}", action.label)
            }
            Expr::Precedence(table) => {
                f.write_str("Precedence(")?;
                fmt::Display::fmt(&table.operand, f)?;
                for level in &table.levels {
                    write!(f, "; {} {} ", level.fixity.keyword(), level.precedence)?;
                    operand(f, &level.operator)?;
                }
                f.write_str(")")
            }
            Expr::Ref(r) => {
                f.write_str(&r.name)?;
                if !r.args.is_empty() {
                    f.write_str("(")?;
                    list(f, &r.args)?;
                    f.write_str(")")?;
                }
                Ok(())
            }
            Expr::Param(param) => f.write_str(&param.name),
            Expr::Separated {
                item,
                sep,
                allow_trailer,
                allow_empty,
            } => {
                f.write_str("Separated(")?;
                fmt::Display::fmt(&**item, f)?;
                f.write_str(", ")?;
                fmt::Display::fmt(&**sep, f)?;
                write!(f, ", trailer: {allow_trailer}, empty: {allow_empty})")
            }
            Expr::Constant(value) => write!(f, "const {}", value.format(false, Colors::OFF)),
            Expr::Fail(message) => write!(f, "Fail({message:?})"),
        }
    }
}
