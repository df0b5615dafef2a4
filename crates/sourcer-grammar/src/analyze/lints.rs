use std::sync::Arc;

use indexmap::IndexMap;

use super::Nullability;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::Expr;
use crate::registry::Rule;
use crate::visitor::{ExprVisitor, walk_expr};

pub(super) fn check(
    rules: &IndexMap<Arc<str>, Rule>,
    nullability: &Nullability,
    diagnostics: &mut Diagnostics,
) {
    for rule in rules.values() {
        let mut lints = Lints {
            nullability,
            rule: rule.name(),
            diagnostics: &mut *diagnostics,
        };
        lints.visit_expr(rule.body());
    }
}

struct Lints<'a> {
    nullability: &'a Nullability,
    rule: &'a Arc<str>,
    diagnostics: &'a mut Diagnostics,
}

impl Lints<'_> {
    fn report(&mut self, kind: DiagnosticKind, expr: &Expr) {
        self.diagnostics
            .report(kind, self.rule, Some(&expr.to_string()));
    }
}

impl ExprVisitor for Lints<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Repeat { expr: body, .. } if self.nullability.expr(body) => {
                self.report(DiagnosticKind::NullableRepetition, body);
            }
            Expr::Separated { item, sep, .. }
                if self.nullability.expr(item) && self.nullability.expr(sep) =>
            {
                self.report(DiagnosticKind::NullableRepetition, item);
            }
            Expr::Choice(alts) => {
                let shadowed = alts
                    .iter()
                    .position(|alt| self.nullability.always_succeeds(alt))
                    .and_then(|i| alts.get(i + 1));
                if let Some(alt) = shadowed {
                    self.report(DiagnosticKind::UnreachableAlternative, alt);
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}
