//! Terminal matchers: literal strings and anchored regular expressions.

use std::fmt;
use std::sync::Arc;

use regex_automata::{Anchored, Input, meta};

#[derive(Clone, Debug)]
pub enum Matcher {
    Literal(String),
    Regex(RegexMatcher),
}

impl Matcher {
    /// Length of the match starting exactly at `pos`, if any.
    ///
    /// `pos` must be a char boundary of `input`.
    pub fn match_at(&self, input: &str, pos: usize) -> Option<usize> {
        match self {
            Matcher::Literal(lit) => input
                .as_bytes()
                .get(pos..)
                .is_some_and(|rest| rest.starts_with(lit.as_bytes()))
                .then_some(lit.len()),
            Matcher::Regex(re) => re.match_at(input, pos),
        }
    }

    /// True if the matcher may succeed without consuming input.
    pub fn can_match_empty(&self) -> bool {
        match self {
            Matcher::Literal(lit) => lit.is_empty(),
            Matcher::Regex(re) => re.min_len == Some(0),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(lit) => write!(f, "{lit:?}"),
            Matcher::Regex(re) => write!(f, "`{}`", re.pattern),
        }
    }
}

/// A compiled pattern, matched anchored at the cursor with leftmost-first semantics.
///
/// Compilation errors are kept rather than raised so grammars can be written
/// as plain expressions; `GrammarBuilder::build` reports them.
#[derive(Clone, Debug)]
pub struct RegexMatcher {
    pattern: Arc<str>,
    compiled: Result<meta::Regex, String>,
    /// Shortest possible match; `None` if the pattern can never match.
    min_len: Option<usize>,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Self {
        let compiled = meta::Regex::new(pattern).map_err(|e| e.to_string());
        let min_len = regex_syntax::parse(pattern)
            .ok()
            .and_then(|hir| hir.properties().minimum_len());
        Self {
            pattern: pattern.into(),
            compiled,
            min_len,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Compilation error, if the pattern is invalid.
    pub fn error(&self) -> Option<&str> {
        self.compiled.as_ref().err().map(String::as_str)
    }

    fn match_at(&self, input: &str, pos: usize) -> Option<usize> {
        let re = self.compiled.as_ref().ok()?;
        if pos > input.len() {
            return None;
        }
        // The full haystack is kept so `^`, `$` and `\b` see the real context.
        let search = Input::new(input).range(pos..).anchored(Anchored::Yes);
        re.find(search).map(|m| m.end() - pos)
    }
}
