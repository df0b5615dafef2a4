//! Tracing hooks for debugging a parse.
//!
//! The evaluator is generic over [`Tracer`]. With [`NoopTracer`] every hook is
//! an empty `#[inline(always)]` function and compiles away, so the untraced
//! parse pays nothing. [`PrintTracer`] collects an indented call tree.

use sourcer_core::Colors;
use sourcer_grammar::Matcher;

const CALL: &str = "▶";
const RETURN: &str = "◀";
const MATCH_SUCCESS: &str = "●";
const MATCH_FAILURE: &str = "○";
const CACHED: &str = "◇";
const BACKTRACK: &str = "❮❮❮";
const RECURSION: &str = "✖";

/// Verbosity level for trace output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Rule calls, returns and cache hits.
    #[default]
    Default,
    /// Adds terminals, backtracking and matched text on return.
    Verbose,
    /// Adds matched text on terminals.
    VeryVerbose,
}

/// Instrumentation points of the evaluator.
///
/// Rule hooks come in pairs: every `trace_enter_rule` is followed by exactly
/// one `trace_rule_success` or `trace_rule_failure` for the same rule, unless
/// the parse aborts in between.
pub trait Tracer {
    /// A rule is about to be evaluated at `offset` (not served from the cache).
    fn trace_enter_rule(&mut self, rule: &str, offset: usize);

    fn trace_rule_success(&mut self, rule: &str, start: usize, end: usize);

    fn trace_rule_failure(&mut self, rule: &str, offset: usize);

    /// The result for `rule` at `offset` was already memoized.
    fn trace_cache_hit(&mut self, rule: &str, offset: usize, success: bool);

    /// A terminal was tried. `matched` is the match length.
    fn trace_terminal(&mut self, matcher: &Matcher, offset: usize, matched: Option<usize>);

    /// A choice alternative failed; the next one restarts at `offset`.
    fn trace_backtrack(&mut self, offset: usize);

    fn trace_left_recursion(&mut self, rule: &str, offset: usize);
}

/// Tracer that does nothing.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_enter_rule(&mut self, _rule: &str, _offset: usize) {}

    #[inline(always)]
    fn trace_rule_success(&mut self, _rule: &str, _start: usize, _end: usize) {}

    #[inline(always)]
    fn trace_rule_failure(&mut self, _rule: &str, _offset: usize) {}

    #[inline(always)]
    fn trace_cache_hit(&mut self, _rule: &str, _offset: usize, _success: bool) {}

    #[inline(always)]
    fn trace_terminal(&mut self, _matcher: &Matcher, _offset: usize, _matched: Option<usize>) {}

    #[inline(always)]
    fn trace_backtrack(&mut self, _offset: usize) {}

    #[inline(always)]
    fn trace_left_recursion(&mut self, _rule: &str, _offset: usize) {}
}

/// Tracer that collects one line per event, indented by rule depth.
///
/// Each line starts with the input offset the event happened at.
pub struct PrintTracer<'s> {
    source: &'s str,
    verbosity: Verbosity,
    lines: Vec<String>,
    depth: usize,
    offset_width: usize,
    colors: Colors,
}

impl<'s> PrintTracer<'s> {
    pub fn new(source: &'s str, verbosity: Verbosity, colors: Colors) -> Self {
        Self {
            source,
            verbosity,
            lines: Vec::new(),
            depth: 0,
            offset_width: source.len().to_string().len(),
            colors,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined with newlines.
    pub fn dump(&self) -> String {
        self.lines.join("\n")
    }

    /// Print all trace lines.
    pub fn print(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
    }

    fn add_line(&mut self, offset: usize, symbol: &str, content: &str) {
        let c = self.colors;
        let line = format!(
            "{}{:>w$}{} {:indent$}{} {}",
            c.dim,
            offset,
            c.reset,
            "",
            symbol,
            content,
            w = self.offset_width,
            indent = self.depth * 2,
        );
        self.lines.push(line.trim_end().to_owned());
    }

    fn rule_name(&self, rule: &str) -> String {
        self.colors.paint(self.colors.blue, rule)
    }

    fn text(&self, start: usize, end: usize) -> String {
        let text = self.source.get(start..end).unwrap_or_default();
        let escaped = truncate_text(&text.escape_debug().to_string(), 24);
        format!(" {}", self.colors.paint(self.colors.green, &escaped))
    }
}

impl Tracer for PrintTracer<'_> {
    fn trace_enter_rule(&mut self, rule: &str, offset: usize) {
        let content = self.rule_name(rule);
        self.add_line(offset, CALL, &content);
        self.depth += 1;
    }

    fn trace_rule_success(&mut self, rule: &str, start: usize, end: usize) {
        self.depth = self.depth.saturating_sub(1);
        let range = self.colors.paint(self.colors.dim, &format!("{start}..{end}"));
        let mut content = format!("{} {range}", self.rule_name(rule));
        if self.verbosity != Verbosity::Default {
            content.push_str(&self.text(start, end));
        }
        self.add_line(start, RETURN, &content);
    }

    fn trace_rule_failure(&mut self, rule: &str, offset: usize) {
        self.depth = self.depth.saturating_sub(1);
        let content = self.rule_name(rule);
        self.add_line(offset, MATCH_FAILURE, &content);
    }

    fn trace_cache_hit(&mut self, rule: &str, offset: usize, success: bool) {
        let outcome = if success { "hit" } else { "miss" };
        let note = self.colors.paint(self.colors.dim, &format!("(cached {outcome})"));
        let content = format!("{} {note}", self.rule_name(rule));
        self.add_line(offset, CACHED, &content);
    }

    fn trace_terminal(&mut self, matcher: &Matcher, offset: usize, matched: Option<usize>) {
        if self.verbosity == Verbosity::Default {
            return;
        }
        let Some(len) = matched else {
            self.add_line(offset, MATCH_FAILURE, &matcher.to_string());
            return;
        };
        let mut content = matcher.to_string();
        if self.verbosity == Verbosity::VeryVerbose {
            content.push_str(&self.text(offset, offset + len));
        }
        self.add_line(offset, MATCH_SUCCESS, &content);
    }

    fn trace_backtrack(&mut self, offset: usize) {
        if self.verbosity == Verbosity::Default {
            return;
        }
        self.add_line(offset, BACKTRACK, "");
    }

    fn trace_left_recursion(&mut self, rule: &str, offset: usize) {
        let note = self.colors.paint(self.colors.red, "left recursion");
        let content = format!("{} {note}", self.rule_name(rule));
        self.add_line(offset, RECURSION, &content);
    }
}

fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}
