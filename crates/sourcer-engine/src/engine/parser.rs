//! Parser configuration and entry points.

use sourcer_core::Node;
use sourcer_grammar::{Grammar, GrammarError};

use super::error::ParseError;
use super::outcome::{Expectation, Failure, ParseResult};
use super::session::Session;
use super::trace::{NoopTracer, Tracer};

/// Runtime limits for a single parse.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum number of evaluation steps (default: 10,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum depth of nested rule calls (default: 1,024).
    pub(crate) recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 10_000_000,
            recursion_limit: 1024,
        }
    }
}

impl FuelLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_exec_fuel(&self) -> u32 {
        self.exec_fuel
    }

    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// Parses inputs against a frozen grammar.
///
/// A `Parser` only borrows the grammar. Each call builds its own memo table,
/// so one grammar can serve any number of parses, on any number of threads.
#[derive(Clone, Copy, Debug)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    limits: FuelLimits,
    memoize: bool,
}

pub struct ParserBuilder<'g> {
    grammar: &'g Grammar,
    limits: FuelLimits,
    memoize: bool,
}

impl<'g> ParserBuilder<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            limits: FuelLimits::default(),
            memoize: true,
        }
    }

    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.limits = self.limits.recursion_limit(limit);
        self
    }

    /// Turn result memoization off. Results stay the same; only
    /// backtracking-heavy grammars get slower. Left recursion is still detected.
    pub fn memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn build(self) -> Parser<'g> {
        Parser {
            grammar: self.grammar,
            limits: self.limits,
            memoize: self.memoize,
        }
    }
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        ParserBuilder::new(grammar).build()
    }

    pub fn builder(grammar: &'g Grammar) -> ParserBuilder<'g> {
        ParserBuilder::new(grammar)
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Parse a prefix of `input` with rule `start`. Input after the match is ignored.
    pub fn parse(&self, start: &str, input: &str) -> Result<Node, ParseError> {
        self.parse_with(start, input, &mut NoopTracer)
    }

    /// Parse all of `input` with rule `start`.
    pub fn parse_complete(&self, start: &str, input: &str) -> Result<Node, ParseError> {
        self.run(start, input, true, &mut NoopTracer)
    }

    /// [`Parser::parse`] with a tracer observing the evaluation.
    pub fn parse_with<T: Tracer>(
        &self,
        start: &str,
        input: &str,
        tracer: &mut T,
    ) -> Result<Node, ParseError> {
        self.run(start, input, false, tracer)
    }

    /// [`Parser::parse_complete`] with a tracer observing the evaluation.
    pub fn parse_complete_with<T: Tracer>(
        &self,
        start: &str,
        input: &str,
        tracer: &mut T,
    ) -> Result<Node, ParseError> {
        self.run(start, input, true, tracer)
    }

    /// Evaluate `start` at byte `offset`, returning the raw result.
    ///
    /// Failures come back as [`ParseResult::Failure`] rather than errors;
    /// only fatal conditions are `Err`.
    pub fn parse_at(
        &self,
        start: &str,
        input: &str,
        offset: usize,
    ) -> Result<ParseResult, ParseError> {
        let rule_id = self.start_rule(start)?;
        let mut tracer = NoopTracer;
        let mut session = Session::new(self.grammar, input, self.limits, self.memoize, &mut tracer);
        session.start(rule_id, offset).map_err(|err| session.fatal(err))
    }

    fn start_rule(&self, start: &str) -> Result<usize, ParseError> {
        self.grammar.start_rule(start)?;
        self.grammar
            .rule_id(start)
            .ok_or_else(|| unknown_rule(start))
    }

    fn run<T: Tracer>(
        &self,
        start: &str,
        input: &str,
        complete: bool,
        tracer: &mut T,
    ) -> Result<Node, ParseError> {
        let rule_id = self.start_rule(start)?;
        let mut session = Session::new(self.grammar, input, self.limits, self.memoize, tracer);
        let result = session.start(rule_id, 0).map_err(|err| session.fatal(err))?;

        let success = match result {
            ParseResult::Success(s) => s,
            ParseResult::Failure(f) => return Err(session.syntax_error(f)),
        };
        if complete && success.end < input.len() {
            let trailing = Failure::new(success.end, Expectation::EndOfInput);
            return Err(session.syntax_error(trailing));
        }
        success
            .value
            .into_node()
            .ok_or_else(|| ParseError::Grammar(GrammarError::IgnoredStartRule(start.to_owned())))
    }
}

fn unknown_rule(name: &str) -> ParseError {
    ParseError::Grammar(GrammarError::UnknownRule {
        name: name.to_owned(),
        referenced_from: None,
    })
}
