//! Packrat evaluation of a frozen grammar.
//!
//! A [`Parser`] borrows a [`sourcer_grammar::Grammar`] and runs each parse in
//! its own session with a private memo table keyed by rule instance and
//! offset. Nothing is shared between parses except the read-only grammar.

mod cache;
mod error;
mod outcome;
mod parser;
mod precedence;
mod session;
mod trace;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod trace_tests;

pub use error::{AbortReason, ParseError, SyntaxError};
pub use outcome::{Expectation, Failure, ParseResult, Success};
pub use parser::{FuelLimits, Parser, ParserBuilder};
pub use trace::{NoopTracer, PrintTracer, Tracer, Verbosity};
