//! Sourcer: PEG grammars as Rust values, parsed with packrat memoization.
//!
//! # Example
//!
//! ```
//! use sourcer::prelude::*;
//!
//! let mut g = Grammar::builder();
//! g.register("Sum", seq([rule("Number"), bind("op", lit("+")), rule("Number")]))?;
//! g.register("Number", regex("[0-9]+"))?;
//! let grammar = g.build()?;
//!
//! let sum = sourcer::parse_complete(&grammar, "Sum", "12+7")?;
//! assert_eq!(sum.get("op").and_then(Value::as_str), Some("+"));
//! # Ok::<(), sourcer::Error>(())
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use sourcer_core::{
    Chain, Colors, Descendants, LineIndex, Node, Operation, Position, Span, SpanError,
    TransformTable, Transformer, Value, VisitTable, Visitor, Walk, locate, transform, visit,
    walk_node, walk_value,
};
pub use sourcer_engine::{
    AbortReason, ErrorPrinter, Expectation, Failure, FuelLimits, NoopTracer, ParseError,
    ParseResult, Parser, ParserBuilder, PrintTracer, Success, SyntaxError, Tracer, Verbosity,
};
pub use sourcer_grammar::{
    ActionError, Diagnostic, DiagnosticKind, Diagnostics, Expr, Fixity, Grammar, GrammarBuilder,
    GrammarError, OperatorTable, Rule, RuleKind, Scope, Severity,
};

/// Grammar-building functions and the types needed to use them.
pub mod prelude {
    pub use sourcer_grammar::builder::*;

    pub use crate::{
        ActionError, Grammar, GrammarBuilder, Node, OperatorTable, Parser, Scope, Value,
    };
}

#[cfg(test)]
mod scenario_tests;

/// Errors from building a grammar or running a parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse a prefix of `input` with rule `start`, using default limits.
pub fn parse(grammar: &Grammar, start: &str, input: &str) -> Result<Node> {
    Ok(Parser::new(grammar).parse(start, input)?)
}

/// Parse all of `input` with rule `start`, using default limits.
pub fn parse_complete(grammar: &Grammar, start: &str, input: &str) -> Result<Node> {
    Ok(Parser::new(grammar).parse_complete(start, input)?)
}
