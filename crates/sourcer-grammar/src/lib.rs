#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Grammar construction for Sourcer.
//!
//! Grammars are written as Rust expressions with the functions in
//! [`builder`], registered into a [`GrammarBuilder`], and frozen with
//! [`GrammarBuilder::build`]. The resulting [`Grammar`] is immutable and can be
//! shared by any number of concurrent parses.
//!
//! ```ignore
//! use sourcer_grammar::builder::*;
//!
//! let mut g = GrammarBuilder::new();
//! g.register("Number", regex("[0-9]+"))?
//!     .register("Sum", seq([rule("Number"), bind("op", lit("+")), rule("Number")]))?;
//! let grammar = g.build()?;
//! ```

pub mod analyze;
pub mod builder;
pub mod diagnostics;
pub mod expr;
pub mod matcher;
pub mod registry;
pub mod scope;
pub mod visitor;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use expr::{
    Action, ActionError, Expr, Fixity, OperatorLevel, OperatorTable, Param, Polarity, Predicate,
    RuleRef, Selector, Terminal,
};
pub use matcher::{Matcher, RegexMatcher};
pub use registry::{Grammar, GrammarBuilder, GrammarError, Rule, RuleKind};
pub use scope::Scope;

/// Result type for grammar construction.
pub type Result<T> = std::result::Result<T, GrammarError>;
