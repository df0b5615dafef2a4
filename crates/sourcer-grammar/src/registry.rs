//! Rule registration and the frozen grammar.
//!
//! Rules are collected in a [`GrammarBuilder`], which rejects duplicate names
//! immediately. [`GrammarBuilder::build`] then:
//!
//! 1. resolves references to template parameters,
//! 2. checks every reference, argument count and regex,
//! 3. marks terminals that skip ignored rules after matching,
//! 4. runs the warning analyses,
//!
//! and returns an immutable [`Grammar`] that can be shared between threads.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::analyze;
use crate::diagnostics::Diagnostics;
use crate::expr::{Expr, Param, RuleRef, Terminal};
use crate::matcher::Matcher;
use crate::visitor::{ExprVisitor, ExprVisitorMut, walk_expr_mut, walk_ref};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("rule `{0}` is already defined")]
    DuplicateRule(String),

    #[error("rule `{name}` is not defined{}", origin(.referenced_from))]
    UnknownRule {
        name: String,
        referenced_from: Option<String>,
    },

    #[error("rule `{name}` takes {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("rule `{rule}` has no parameter #{index}")]
    UnknownParameter { rule: String, index: usize },

    #[error("invalid pattern `{pattern}` in rule `{rule}`: {message}")]
    InvalidRegex {
        rule: String,
        pattern: String,
        message: String,
    },

    #[error("repetition in rule `{rule}` has minimum {min} above maximum {max}")]
    InvalidRepeat { rule: String, min: usize, max: usize },

    #[error("class `{0}` has no alternatives")]
    EmptyClass(String),

    #[error("rule `{0}` is ignored and cannot start a parse")]
    IgnoredStartRule(String),
}

fn origin(referenced_from: &Option<String>) -> String {
    match referenced_from {
        Some(rule) => format!(" (referenced from `{rule}`)"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Plain,
    /// Matched input is skipped and leaves no trace in the tree.
    Ignored,
    /// Ordered choice over alternative rules; yields the alternative's node.
    Class,
}

#[derive(Debug, Clone)]
pub struct Rule {
    name: Arc<str>,
    params: Vec<Arc<str>>,
    body: Arc<Expr>,
    kind: RuleKind,
    class: Option<Arc<str>>,
}

impl Rule {
    fn new(name: &str, params: Vec<Arc<str>>, body: Expr, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            params,
            body: Arc::new(body),
            kind,
            class: None,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn params(&self) -> &[Arc<str>] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn body(&self) -> &Arc<Expr> {
        &self.body
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_ignored(&self) -> bool {
        self.kind == RuleKind::Ignored
    }

    /// The class this rule is an alternative of.
    pub fn class(&self) -> Option<&Arc<str>> {
        self.class.as_ref()
    }

    /// Body with `args` substituted for the parameters.
    pub fn instantiate(&self, args: &[Expr]) -> Result<Arc<Expr>, GrammarError> {
        if args.len() != self.params.len() {
            return Err(GrammarError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        if args.is_empty() {
            return Ok(self.body.clone());
        }
        Ok(Arc::new(self.body.substitute(args)))
    }
}

/// Mutable rule registry.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: IndexMap<Arc<str>, Rule>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, body: Expr) -> Result<&mut Self, GrammarError> {
        self.insert(Rule::new(name, Vec::new(), body, RuleKind::Plain))
    }

    /// Register a rule taking parameters. Inside `body`, `rule(param)` refers to
    /// the argument passed for `param`.
    pub fn register_template<'p>(
        &mut self,
        name: &str,
        params: impl IntoIterator<Item = &'p str>,
        body: Expr,
    ) -> Result<&mut Self, GrammarError> {
        let params = params.into_iter().map(Arc::from).collect();
        self.insert(Rule::new(name, params, body, RuleKind::Plain))
    }

    /// Register a rule whose matches are skipped between tokens and left out of the tree.
    pub fn register_ignored(&mut self, name: &str, body: Expr) -> Result<&mut Self, GrammarError> {
        self.insert(Rule::new(name, Vec::new(), body, RuleKind::Ignored))
    }

    /// Register each alternative as its own rule, plus a rule `name` that tries
    /// them in order.
    pub fn register_class<'a>(
        &mut self,
        name: &str,
        alternatives: impl IntoIterator<Item = (&'a str, Expr)>,
    ) -> Result<&mut Self, GrammarError> {
        let alternatives: Vec<_> = alternatives.into_iter().collect();
        if alternatives.is_empty() {
            return Err(GrammarError::EmptyClass(name.to_owned()));
        }

        self.check_free(name)?;
        for (i, (alt, _)) in alternatives.iter().enumerate() {
            self.check_free(alt)?;
            if *alt == name || alternatives[..i].iter().any(|(prev, _)| prev == alt) {
                return Err(GrammarError::DuplicateRule((*alt).to_owned()));
            }
        }

        let class: Arc<str> = name.into();
        let mut refs = Vec::with_capacity(alternatives.len());
        for (alt, body) in alternatives {
            let mut rule = Rule::new(alt, Vec::new(), body, RuleKind::Plain);
            rule.class = Some(class.clone());
            self.insert(rule)?;
            refs.push(crate::builder::rule(alt));
        }
        self.insert(Rule::new(name, Vec::new(), Expr::Choice(refs), RuleKind::Class))
    }

    fn check_free(&self, name: &str) -> Result<(), GrammarError> {
        if self.rules.contains_key(name) {
            return Err(GrammarError::DuplicateRule(name.to_owned()));
        }
        Ok(())
    }

    fn insert(&mut self, rule: Rule) -> Result<&mut Self, GrammarError> {
        self.check_free(&rule.name)?;
        self.rules.insert(rule.name.clone(), rule);
        Ok(self)
    }

    pub fn build(mut self) -> Result<Grammar, GrammarError> {
        for rule in self.rules.values_mut() {
            let mut resolver = ParamResolver {
                params: &rule.params,
                error: None,
            };
            let body = Arc::make_mut(&mut rule.body);
            resolver.visit_expr_mut(body);
            if let Some(err) = resolver.error {
                return Err(err);
            }
        }

        for rule in self.rules.values() {
            let mut checker = RefChecker {
                rules: &self.rules,
                rule,
                error: None,
            };
            checker.visit_expr(&rule.body);
            if let Some(err) = checker.error {
                return Err(err);
            }
        }

        let ignored: Vec<Arc<str>> = self
            .rules
            .values()
            .filter(|r| r.is_ignored())
            .map(|r| r.name.clone())
            .collect();
        if !ignored.is_empty() {
            for rule in self.rules.values_mut().filter(|r| !r.is_ignored()) {
                SkipMarker.visit_expr_mut(Arc::make_mut(&mut rule.body));
            }
        }

        let diagnostics = analyze::analyze(&self.rules);

        Ok(Grammar {
            rules: self.rules,
            ignored,
            diagnostics,
        })
    }
}

/// Immutable, validated set of rules.
#[derive(Debug)]
pub struct Grammar {
    rules: IndexMap<Arc<str>, Rule>,
    ignored: Vec<Arc<str>>,
    diagnostics: Diagnostics,
}

impl Grammar {
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Dense rule id, stable for the lifetime of the grammar.
    pub fn rule_id(&self, name: &str) -> Option<usize> {
        self.rules.get_index_of(name)
    }

    pub fn rule_by_id(&self, id: usize) -> Option<&Rule> {
        self.rules.get_index(id).map(|(_, rule)| rule)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ignored rules, in registration order.
    pub fn ignored(&self) -> &[Arc<str>] {
        &self.ignored
    }

    /// Warnings found while building.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Body of `name` specialized with `args`.
    pub fn resolve(&self, name: &str, args: &[Expr]) -> Result<Arc<Expr>, GrammarError> {
        let rule = self.get(name).ok_or_else(|| GrammarError::UnknownRule {
            name: name.to_owned(),
            referenced_from: None,
        })?;
        rule.instantiate(args)
    }

    /// Check that `name` can start a parse.
    pub fn start_rule(&self, name: &str) -> Result<&Rule, GrammarError> {
        let rule = self.get(name).ok_or_else(|| GrammarError::UnknownRule {
            name: name.to_owned(),
            referenced_from: None,
        })?;
        if rule.arity() != 0 {
            return Err(GrammarError::ArityMismatch {
                name: name.to_owned(),
                expected: rule.arity(),
                found: 0,
            });
        }
        if rule.is_ignored() {
            return Err(GrammarError::IgnoredStartRule(name.to_owned()));
        }
        Ok(rule)
    }
}

/// Turns `rule(p)` into `Param` when `p` names a parameter of the enclosing rule.
struct ParamResolver<'a> {
    params: &'a [Arc<str>],
    error: Option<GrammarError>,
}

impl ExprVisitorMut for ParamResolver<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if let Expr::Ref(RuleRef { name, args }) = expr
            && let Some(index) = self.params.iter().position(|p| p == name)
        {
            if !args.is_empty() {
                self.error.get_or_insert(GrammarError::ArityMismatch {
                    name: name.to_string(),
                    expected: 0,
                    found: args.len(),
                });
                return;
            }
            *expr = Expr::Param(Param {
                index,
                name: name.clone(),
            });
            return;
        }
        walk_expr_mut(self, expr);
    }
}

struct RefChecker<'a> {
    rules: &'a IndexMap<Arc<str>, Rule>,
    rule: &'a Rule,
    error: Option<GrammarError>,
}

impl RefChecker<'_> {
    fn fail(&mut self, err: GrammarError) {
        self.error.get_or_insert(err);
    }
}

impl ExprVisitor for RefChecker<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Param(param) = expr
            && param.index >= self.rule.arity()
        {
            self.fail(GrammarError::UnknownParameter {
                rule: self.rule.name.to_string(),
                index: param.index,
            });
        }
        if let Expr::Repeat {
            min,
            max: Some(max),
            ..
        } = expr
            && min > max
        {
            self.fail(GrammarError::InvalidRepeat {
                rule: self.rule.name.to_string(),
                min: *min,
                max: *max,
            });
        }
        crate::visitor::walk_expr(self, expr);
    }

    fn visit_terminal(&mut self, terminal: &Terminal) {
        if let Matcher::Regex(re) = &terminal.matcher
            && let Some(message) = re.error()
        {
            self.fail(GrammarError::InvalidRegex {
                rule: self.rule.name.to_string(),
                pattern: re.pattern().to_owned(),
                message: message.to_owned(),
            });
        }
    }

    fn visit_ref(&mut self, r: &RuleRef) {
        match self.rules.get(&r.name) {
            None => self.fail(GrammarError::UnknownRule {
                name: r.name.to_string(),
                referenced_from: Some(self.rule.name.to_string()),
            }),
            Some(target) if target.arity() != r.args.len() => {
                self.fail(GrammarError::ArityMismatch {
                    name: r.name.to_string(),
                    expected: target.arity(),
                    found: r.args.len(),
                })
            }
            Some(_) => {}
        }
        walk_ref(self, r);
    }
}

struct SkipMarker;

impl ExprVisitorMut for SkipMarker {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if let Expr::Terminal(terminal) = expr {
            terminal.skip_ignored = true;
        }
        walk_expr_mut(self, expr);
    }
}
