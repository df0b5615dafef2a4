//! Errors that end a parse.

use std::sync::Arc;

use sourcer_core::{Position, SpanError};
use sourcer_grammar::GrammarError;

use super::outcome::{Expectation, describe};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The start rule cannot be used, or the grammar is inconsistent.
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("left recursion: rule `{rule}` re-entered at {position} without consuming input")]
    LeftRecursionDetected { rule: String, position: Position },

    #[error("parse aborted: {0}")]
    Aborted(AbortReason),

    #[error(transparent)]
    Span(#[from] SpanError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("execution limit of {0} steps exceeded")]
    ExecFuelExhausted(u32),

    #[error("recursion limit of {0} nested rule calls exceeded")]
    RecursionLimitExceeded(u32),

    #[error("{0}")]
    Action(String),
}

/// The deepest point the parse reached, and what it would have accepted there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at {position}: {}", describe(.expected))]
pub struct SyntaxError {
    pub position: Position,
    pub expected: Vec<Expectation>,
}

impl SyntaxError {
    pub fn message(&self) -> String {
        describe(&self.expected)
    }
}

/// Fatal conditions raised while evaluating, before positions are resolved.
#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum RuntimeError {
    #[error("rule `{rule}` re-entered at offset {offset}")]
    LeftRecursion { rule: Arc<str>, offset: usize },

    #[error(transparent)]
    Aborted(#[from] AbortReason),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Span(#[from] SpanError),
}
