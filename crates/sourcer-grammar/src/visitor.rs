//! Traversal of parsing expressions.
//!
//! Implement `ExprVisitor` and override the hooks you need. Call `walk_expr`
//! inside `visit_expr` to keep descending.
//!
//! ```ignore
//! impl ExprVisitor for CollectRefs {
//!     fn visit_ref(&mut self, r: &RuleRef) {
//!         self.names.insert(r.name.clone());
//!         walk_ref(self, r);
//!     }
//! }
//! ```

use crate::expr::{Expr, RuleRef, Terminal};

pub trait ExprVisitor: Sized {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_terminal(&mut self, _terminal: &Terminal) {}

    fn visit_ref(&mut self, r: &RuleRef) {
        walk_ref(self, r);
    }
}

pub fn walk_expr<V: ExprVisitor>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Terminal(t) => visitor.visit_terminal(t),
        Expr::Ref(r) => visitor.visit_ref(r),
        _ => expr.for_each_child(|child| visitor.visit_expr(child)),
    }
}

pub fn walk_ref<V: ExprVisitor>(visitor: &mut V, r: &RuleRef) {
    for arg in &r.args {
        visitor.visit_expr(arg);
    }
}

/// Mutable counterpart of [`ExprVisitor`], used by the build passes.
pub trait ExprVisitorMut: Sized {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_expr_mut<V: ExprVisitorMut>(visitor: &mut V, expr: &mut Expr) {
    expr.for_each_child_mut(|child| visitor.visit_expr_mut(child));
}
