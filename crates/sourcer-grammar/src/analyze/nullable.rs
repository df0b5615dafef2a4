use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::expr::Expr;
use crate::matcher::Matcher;
use crate::registry::Rule;

/// Which rules can succeed without consuming input.
///
/// Least fixpoint over all rule bodies. Template parameters count as
/// non-nullable, so results for templates are approximate.
#[derive(Debug, Default)]
pub struct Nullability {
    rules: HashMap<Arc<str>, bool>,
}

impl Nullability {
    pub fn compute(rules: &IndexMap<Arc<str>, Rule>) -> Self {
        let mut this = Self {
            rules: rules.keys().map(|name| (name.clone(), false)).collect(),
        };

        loop {
            let mut changed = false;
            for rule in rules.values() {
                if this.rule(rule.name()) || !this.expr(rule.body()) {
                    continue;
                }
                this.rules.insert(rule.name().clone(), true);
                changed = true;
            }
            if !changed {
                return this;
            }
        }
    }

    pub fn rule(&self, name: &str) -> bool {
        self.rules.get(name).copied().unwrap_or(false)
    }

    pub fn expr(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Terminal(t) => t.matcher.can_match_empty(),
            Expr::Sequence(items) => items.iter().all(|e| self.expr(e)),
            Expr::Choice(alts) => alts.iter().any(|e| self.expr(e)),
            Expr::Repeat { expr, min, .. } => *min == 0 || self.expr(expr),
            Expr::Lookahead { .. } | Expr::Predicate(_) | Expr::Constant(_) => true,
            Expr::Bind { expr, .. } | Expr::Project { expr, .. } | Expr::Apply { expr, .. } => {
                self.expr(expr)
            }
            Expr::Precedence(table) => self.expr(&table.operand),
            Expr::Ref(r) => self.rule(&r.name),
            Expr::Separated {
                item, allow_empty, ..
            } => *allow_empty || self.expr(item),
            Expr::Param(_) | Expr::Fail(_) => false,
        }
    }

    /// True if `expr` cannot fail (short of aborting the parse).
    pub fn always_succeeds(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Constant(_) => true,
            Expr::Terminal(t) => matches!(&t.matcher, Matcher::Literal(lit) if lit.is_empty()),
            Expr::Repeat { expr, min: 0, .. } => !self.expr(expr),
            Expr::Separated {
                item,
                allow_empty: true,
                ..
            } => !self.expr(item),
            Expr::Sequence(items) => items.iter().all(|e| self.always_succeeds(e)),
            Expr::Choice(alts) => alts.iter().any(|e| self.always_succeeds(e)),
            Expr::Bind { expr, .. } => self.always_succeeds(expr),
            _ => false,
        }
    }
}
