//! One parse of one input: evaluates grammar expressions with packrat memoization.

use std::sync::Arc;

use sourcer_core::{LineIndex, Node, Value};
use sourcer_grammar::{
    Expr, Grammar, GrammarError, Matcher, Polarity, RuleKind, Scope, Selector, Terminal,
};

use super::cache::{Entry, InstanceId, Instances, PackratCache};
use super::error::{AbortReason, ParseError, RuntimeError, SyntaxError};
use super::outcome::ParseResult::{Failure as Failed, Success as Matched};
use super::outcome::{Expectation, Failure, ParseResult, Success};
use super::parser::FuelLimits;
use super::trace::Tracer;

/// Evaluation state. The grammar is shared; everything else belongs to this parse.
pub(crate) struct Session<'g, 'i, 't, T: Tracer> {
    grammar: &'g Grammar,
    input: &'i str,
    lines: LineIndex,
    instances: Instances<'g>,
    cache: PackratCache,
    ignored: Vec<usize>,
    /// Deepest failure recorded so far in the current rule call. Folded into
    /// the caller's when the call returns; at the top it becomes the syntax error.
    furthest: Option<Failure>,
    /// While > 0 failures are not recorded: inside negative lookahead and
    /// while skipping ignored rules. Each rule call starts again from 0.
    suppress_depth: u32,
    exec_fuel: u32,
    recursion_depth: u32,
    limits: FuelLimits,
    pub(super) tracer: &'t mut T,
}

impl<'g, 'i, 't, T: Tracer> Session<'g, 'i, 't, T> {
    pub fn new(
        grammar: &'g Grammar,
        input: &'i str,
        limits: FuelLimits,
        memoize: bool,
        tracer: &'t mut T,
    ) -> Self {
        let ignored = grammar
            .ignored()
            .iter()
            .filter_map(|name| grammar.rule_id(name))
            .collect();
        Self {
            grammar,
            input,
            lines: LineIndex::new(input),
            instances: Instances::default(),
            cache: PackratCache::new(memoize),
            ignored,
            furthest: None,
            suppress_depth: 0,
            exec_fuel: limits.get_exec_fuel(),
            recursion_depth: 0,
            limits,
            tracer,
        }
    }

    /// Skip leading ignored input, then evaluate the start rule.
    pub fn start(&mut self, rule_id: usize, offset: usize) -> Result<ParseResult, RuntimeError> {
        let offset = self.skip_ignored(offset)?;
        self.call(rule_id, &[], offset)
    }

    /// Turn the top-level failure into a syntax error at the deepest point reached.
    pub fn syntax_error(&mut self, failure: Failure) -> ParseError {
        let failure = match self.furthest.take() {
            Some(furthest) => furthest.merge(failure),
            None => failure,
        };
        match self.lines.locate(self.input, failure.offset) {
            Ok(position) => ParseError::Syntax(SyntaxError {
                position,
                expected: failure.expected.into_iter().collect(),
            }),
            Err(err) => ParseError::Span(err),
        }
    }

    pub fn fatal(&self, err: RuntimeError) -> ParseError {
        match err {
            RuntimeError::LeftRecursion { rule, offset } => {
                match self.lines.locate(self.input, offset) {
                    Ok(position) => ParseError::LeftRecursionDetected {
                        rule: rule.to_string(),
                        position,
                    },
                    Err(err) => ParseError::Span(err),
                }
            }
            RuntimeError::Aborted(reason) => ParseError::Aborted(reason),
            RuntimeError::Grammar(err) => ParseError::Grammar(err),
            RuntimeError::Span(err) => ParseError::Span(err),
        }
    }

    /// A local failure, also recorded as the deepest one if it got furthest.
    pub(super) fn fail(&mut self, offset: usize, expectation: Expectation) -> ParseResult {
        let failure = Failure::new(offset, expectation);
        self.record(Some(failure.clone()));
        Failed(failure)
    }

    fn record(&mut self, failure: Option<Failure>) {
        if self.suppress_depth > 0 {
            return;
        }
        let Some(failure) = failure else {
            return;
        };
        self.furthest = Some(match self.furthest.take() {
            Some(furthest) => furthest.merge(failure),
            None => failure,
        });
    }

    fn call(
        &mut self,
        rule_id: usize,
        args: &[Expr],
        pos: usize,
    ) -> Result<ParseResult, RuntimeError> {
        let instance = self.instances.intern(self.grammar, rule_id, args)?;
        self.call_instance(instance, pos)
    }

    fn call_instance(&mut self, id: InstanceId, pos: usize) -> Result<ParseResult, RuntimeError> {
        let (rule, body) = {
            let instance = self.instances.get(id);
            (instance.rule, instance.body.clone())
        };
        let key = (id, pos);

        match self.cache.lookup(key) {
            Some(Entry::InFlight) => {
                self.tracer.trace_left_recursion(rule.name(), pos);
                return Err(RuntimeError::LeftRecursion {
                    rule: rule.name().clone(),
                    offset: pos,
                });
            }
            Some(Entry::Done { result, deepest }) => {
                let (result, deepest) = (result.clone(), deepest.clone());
                self.tracer
                    .trace_cache_hit(rule.name(), pos, result.is_success());
                self.record(deepest);
                return Ok(result);
            }
            None => {}
        }

        if self.recursion_depth >= self.limits.get_recursion_limit() {
            return Err(RuntimeError::Aborted(AbortReason::RecursionLimitExceeded(
                self.limits.get_recursion_limit(),
            )));
        }

        self.cache.begin(key);
        self.tracer.trace_enter_rule(rule.name(), pos);
        self.recursion_depth += 1;
        // Bindings never leak across rule boundaries.
        let mut scope = Scope::new();
        // Failures are collected per call so a cache hit can replay them.
        let outer = self.furthest.take();
        let outer_suppress = std::mem::replace(&mut self.suppress_depth, 0);
        let outcome = self.eval(&body, pos, &mut scope);
        let deepest = std::mem::replace(&mut self.furthest, outer);
        self.suppress_depth = outer_suppress;
        self.recursion_depth -= 1;

        let result = match outcome? {
            Matched(s) => {
                self.tracer.trace_rule_success(rule.name(), s.start, s.end);
                Matched(self.wrap(rule.name(), rule.kind(), rule.class(), s)?)
            }
            Failed(f) => {
                self.tracer.trace_rule_failure(rule.name(), pos);
                Failed(f)
            }
        };
        self.cache.finish(key, &result, &deepest);
        self.record(deepest);
        Ok(result)
    }

    /// Shape a rule body's success into the rule's result.
    fn wrap(
        &self,
        name: &Arc<str>,
        kind: RuleKind,
        class: Option<&Arc<str>>,
        success: Success,
    ) -> Result<Success, RuntimeError> {
        match kind {
            RuleKind::Ignored => Ok(Success {
                value: Value::Null,
                silent: true,
                ..success
            }),
            // The body is a choice of alternative rules; pass the alternative's node up.
            RuleKind::Class => Ok(Success {
                silent: false,
                ..success
            }),
            RuleKind::Plain => {
                let span = self.lines.span(self.input, success.start..success.end)?;
                let mut node = Node::new(name.clone(), span, success.value);
                node.class = class.cloned();
                Ok(Success::new(
                    success.start,
                    success.end,
                    Value::Node(Box::new(node)),
                ))
            }
        }
    }

    /// Advance over any run of ignored-rule matches starting at `pos`.
    fn skip_ignored(&mut self, mut pos: usize) -> Result<usize, RuntimeError> {
        if self.ignored.is_empty() {
            return Ok(pos);
        }
        self.suppress_depth += 1;
        'skip: loop {
            for i in 0..self.ignored.len() {
                let rule_id = self.ignored[i];
                if let Matched(s) = self.call(rule_id, &[], pos)?
                    && s.end > pos
                {
                    pos = s.end;
                    continue 'skip;
                }
            }
            break;
        }
        self.suppress_depth -= 1;
        Ok(pos)
    }

    fn consume_fuel(&mut self) -> Result<(), RuntimeError> {
        if self.exec_fuel == 0 {
            return Err(RuntimeError::Aborted(AbortReason::ExecFuelExhausted(
                self.limits.get_exec_fuel(),
            )));
        }
        self.exec_fuel -= 1;
        Ok(())
    }

    pub(super) fn eval(
        &mut self,
        expr: &Expr,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        self.consume_fuel()?;
        match expr {
            Expr::Terminal(terminal) => self.terminal(terminal, pos),
            Expr::Sequence(items) => self.sequence(items, pos, scope),
            Expr::Choice(alternatives) => self.choice(alternatives, pos, scope),
            Expr::Repeat { expr, min, max } => self.repeat(expr, *min, *max, pos, scope),
            Expr::Lookahead { expr, polarity } => self.lookahead(expr, *polarity, pos, scope),
            Expr::Predicate(predicate) => {
                if predicate.test(scope) {
                    Ok(Matched(Success::silent(pos)))
                } else {
                    let label = predicate.label().to_owned();
                    Ok(self.fail(pos, Expectation::Predicate(label)))
                }
            }
            Expr::Bind { name, expr } => {
                let result = self.eval(expr, pos, scope)?;
                let Matched(success) = result else {
                    return Ok(result);
                };
                scope.bind(name.clone(), success.value.clone());
                Ok(Matched(Success {
                    silent: false,
                    ..success
                }))
            }
            Expr::Project { expr, selector } => self.project(expr, selector, pos, scope),
            Expr::Apply { expr, action } => {
                let result = self.eval(expr, pos, scope)?;
                let Matched(success) = result else {
                    return Ok(result);
                };
                match action.call(success.value, scope) {
                    Ok(value) => Ok(Matched(Success::new(success.start, success.end, value))),
                    Err(err) if err.is_abort() => Err(RuntimeError::Aborted(
                        AbortReason::Action(err.message().to_owned()),
                    )),
                    Err(err) => {
                        Ok(self.fail(pos, Expectation::ActionError(err.message().to_owned())))
                    }
                }
            }
            Expr::Precedence(table) => self.precedence(table, pos, scope),
            Expr::Ref(r) => {
                let rule_id =
                    self.grammar
                        .rule_id(&r.name)
                        .ok_or_else(|| GrammarError::UnknownRule {
                            name: r.name.to_string(),
                            referenced_from: None,
                        })?;
                self.call(rule_id, &r.args, pos)
            }
            // Parameters are substituted when a rule is instantiated.
            Expr::Param(param) => Err(RuntimeError::Grammar(GrammarError::UnknownParameter {
                rule: param.name.to_string(),
                index: param.index,
            })),
            Expr::Separated {
                item,
                sep,
                allow_trailer,
                allow_empty,
            } => self.separated(item, sep, *allow_trailer, *allow_empty, pos, scope),
            Expr::Constant(value) => Ok(Matched(Success::new(pos, pos, value.clone()))),
            Expr::Fail(message) => Ok(self.fail(pos, Expectation::Message(message.to_string()))),
        }
    }

    fn terminal(&mut self, terminal: &Terminal, pos: usize) -> Result<ParseResult, RuntimeError> {
        let matched = terminal.matcher.match_at(self.input, pos);
        self.tracer.trace_terminal(&terminal.matcher, pos, matched);

        let Some(len) = matched else {
            let expectation = match &terminal.matcher {
                Matcher::Literal(text) => Expectation::Literal(text.clone()),
                Matcher::Regex(re) => Expectation::Pattern(re.pattern().to_owned()),
            };
            return Ok(self.fail(pos, expectation));
        };

        let end = pos + len;
        let text = self.input.get(pos..end).unwrap_or_default();
        let value = Value::String(text.to_owned());
        let end = if terminal.skip_ignored {
            self.skip_ignored(end)?
        } else {
            end
        };
        Ok(Matched(Success::new(pos, end, value)))
    }

    fn sequence(
        &mut self,
        items: &[Expr],
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mark = scope.mark();
        let mut cursor = pos;
        let mut kept: Vec<(Option<&Arc<str>>, Value)> = Vec::with_capacity(items.len());

        for item in items {
            let success = match self.eval(item, cursor, scope)? {
                Matched(s) => s,
                Failed(f) => {
                    scope.restore(mark);
                    return Ok(Failed(f));
                }
            };
            cursor = success.end;
            if success.silent {
                continue;
            }
            let name = match item {
                Expr::Bind { name, .. } => Some(name),
                _ => None,
            };
            kept.push((name, success.value));
        }
        scope.restore(mark);

        let value = if kept.iter().any(|(name, _)| name.is_some()) {
            Value::Object(
                kept.into_iter()
                    .enumerate()
                    .map(|(i, (name, value))| {
                        (name.map_or_else(|| i.to_string(), |n| n.to_string()), value)
                    })
                    .collect(),
            )
        } else {
            Value::Array(kept.into_iter().map(|(_, value)| value).collect())
        };
        Ok(Matched(Success::new(pos, cursor, value)))
    }

    fn choice(
        &mut self,
        alternatives: &[Expr],
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mut failure: Option<Failure> = None;
        for alternative in alternatives {
            match self.eval(alternative, pos, scope)? {
                Matched(s) => return Ok(Matched(s)),
                Failed(f) => {
                    self.tracer.trace_backtrack(pos);
                    failure = Some(match failure {
                        Some(prev) => prev.merge(f),
                        None => f,
                    });
                }
            }
        }
        match failure {
            Some(f) => Ok(Failed(f)),
            None => Ok(self.fail(pos, Expectation::Message("empty choice".to_owned()))),
        }
    }

    fn repeat(
        &mut self,
        expr: &Expr,
        min: usize,
        max: Option<usize>,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mut cursor = pos;
        let mut count = 0;
        let mut items = Vec::new();

        while max.is_none_or(|max| count < max) {
            match self.eval(expr, cursor, scope)? {
                Matched(s) => {
                    if s.end == cursor {
                        let expectation =
                            Expectation::AmbiguousZeroWidthRepetition(expr.to_string());
                        return Ok(self.fail(cursor, expectation));
                    }
                    cursor = s.end;
                    count += 1;
                    if !s.silent {
                        items.push(s.value);
                    }
                }
                Failed(f) => {
                    if count < min {
                        return Ok(Failed(f));
                    }
                    break;
                }
            }
        }
        if count < min {
            let expectation = Expectation::Message(format!("at least {min} repetitions"));
            return Ok(self.fail(cursor, expectation));
        }
        Ok(Matched(Success::new(pos, cursor, Value::Array(items))))
    }

    fn lookahead(
        &mut self,
        expr: &Expr,
        polarity: Polarity,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mark = scope.mark();
        let result = match polarity {
            Polarity::Positive => match self.eval(expr, pos, scope)? {
                Matched(_) => Matched(Success::silent(pos)),
                Failed(f) => Failed(f),
            },
            Polarity::Negative => {
                self.suppress_depth += 1;
                let inner = self.eval(expr, pos, scope);
                self.suppress_depth -= 1;
                match inner? {
                    Matched(_) => self.fail(pos, Expectation::Absent(expr.to_string())),
                    Failed(_) => Matched(Success::silent(pos)),
                }
            }
        };
        scope.restore(mark);
        Ok(result)
    }

    fn project(
        &mut self,
        expr: &Expr,
        selector: &Selector,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let result = self.eval(expr, pos, scope)?;
        let Matched(success) = result else {
            return Ok(result);
        };
        let selected = match selector {
            Selector::Index(i) => success.value.index(*i),
            Selector::Name(name) => success.value.get(name),
        };
        match selected.cloned() {
            Some(value) => Ok(Matched(Success::new(success.start, success.end, value))),
            None => Ok(self.fail(pos, Expectation::ProjectionOutOfRange(selector.to_string()))),
        }
    }

    fn separated(
        &mut self,
        item: &Expr,
        sep: &Expr,
        allow_trailer: bool,
        allow_empty: bool,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mut items = Vec::new();
        let mut matched_any = false;
        let mut cursor = pos;
        let mut end = pos;

        loop {
            let success = match self.eval(item, cursor, scope)? {
                Matched(s) => s,
                Failed(f) if !matched_any && !allow_empty => return Ok(Failed(f)),
                Failed(_) => break,
            };
            matched_any = true;
            end = success.end;
            if !success.silent {
                items.push(success.value);
            }

            let Matched(separator) = self.eval(sep, end, scope)? else {
                break;
            };
            if separator.end == cursor {
                let expectation = Expectation::AmbiguousZeroWidthRepetition(item.to_string());
                return Ok(self.fail(cursor, expectation));
            }
            if allow_trailer {
                end = separator.end;
            }
            cursor = separator.end;
        }
        Ok(Matched(Success::new(pos, end, Value::Array(items))))
    }
}
