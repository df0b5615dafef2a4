//! Result of evaluating one expression at one offset.

use std::fmt;
use std::ops::Range;

use indexmap::IndexSet;
use sourcer_core::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum ParseResult {
    Success(Success),
    Failure(Failure),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn success(self) -> Option<Success> {
        match self {
            ParseResult::Success(s) => Some(s),
            ParseResult::Failure(_) => None,
        }
    }

    pub fn failure(self) -> Option<Failure> {
        match self {
            ParseResult::Success(_) => None,
            ParseResult::Failure(f) => Some(f),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Success {
    pub start: usize,
    pub end: usize,
    pub value: Value,
    /// Consumed or tested input without producing a value: ignored rules,
    /// lookaheads and predicates. Sequences and repetitions leave these out.
    pub silent: bool,
}

impl Success {
    pub(crate) fn new(start: usize, end: usize, value: Value) -> Self {
        Self {
            start,
            end,
            value,
            silent: false,
        }
    }

    pub(crate) fn silent(at: usize) -> Self {
        Self {
            start: at,
            end: at,
            value: Value::Null,
            silent: true,
        }
    }

    pub fn consumed(&self) -> usize {
        self.end - self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Failure at `offset`. Carries what would have been accepted there, never a length.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub offset: usize,
    pub expected: IndexSet<Expectation>,
}

impl Failure {
    pub fn new(offset: usize, expectation: Expectation) -> Self {
        Self {
            offset,
            expected: IndexSet::from([expectation]),
        }
    }

    /// Keep the failure that got further; union the expectations on a tie.
    pub fn merge(mut self, other: Failure) -> Failure {
        match self.offset.cmp(&other.offset) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => {
                self.expected.extend(other.expected);
                self
            }
        }
    }
}

/// What a failed expression wanted, or why it gave up.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expectation {
    Literal(String),
    Pattern(String),
    EndOfInput,
    /// Negative lookahead matched.
    Absent(String),
    Predicate(String),
    Message(String),
    ActionError(String),
    ProjectionOutOfRange(String),
    /// A repetition iteration succeeded without consuming input.
    AmbiguousZeroWidthRepetition(String),
}

impl Expectation {
    /// Failures that explain a problem rather than name acceptable input.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Expectation::Message(_)
                | Expectation::ActionError(_)
                | Expectation::ProjectionOutOfRange(_)
                | Expectation::AmbiguousZeroWidthRepetition(_)
        )
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Literal(lit) => write!(f, "{lit:?}"),
            Expectation::Pattern(p) => write!(f, "`{p}`"),
            Expectation::EndOfInput => f.write_str("end of input"),
            Expectation::Absent(expr) => write!(f, "not {expr}"),
            Expectation::Predicate(label) => write!(f, "predicate `{label}`"),
            Expectation::Message(msg) | Expectation::ActionError(msg) => f.write_str(msg),
            Expectation::ProjectionOutOfRange(selector) => {
                write!(f, "no item `{selector}` to project")
            }
            Expectation::AmbiguousZeroWidthRepetition(expr) => {
                write!(f, "repetition of `{expr}` matched empty input")
            }
        }
    }
}

/// `a`, `a or b`, `a, b or c`.
pub(crate) fn one_of(items: &[&Expectation]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(if i + 1 == items.len() { " or " } else { ", " });
        }
        out.push_str(&item.to_string());
    }
    out
}

/// Problems first, then the acceptable input.
pub(crate) fn describe(expected: &[Expectation]) -> String {
    let (problems, wanted): (Vec<_>, Vec<_>) = expected.iter().partition(|e| e.is_problem());
    let mut parts: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
    if !wanted.is_empty() {
        parts.push(format!("expected {}", one_of(&wanted)));
    }
    parts.join("; ")
}
