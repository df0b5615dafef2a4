//! Packrat evaluator for Sourcer grammars.
//!
//! Takes a [`sourcer_grammar::Grammar`] and an input string and produces a
//! [`sourcer_core::Node`] tree, or the deepest syntax error.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod engine;
pub mod render;


pub use engine::{
    AbortReason, Expectation, Failure, FuelLimits, NoopTracer, ParseError, ParseResult, Parser,
    ParserBuilder, PrintTracer, Success, SyntaxError, Tracer, Verbosity,
};
pub use render::ErrorPrinter;
