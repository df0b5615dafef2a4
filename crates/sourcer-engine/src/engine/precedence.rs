//! Operator-precedence parsing by precedence climbing.
//!
//! Levels with a higher precedence bind tighter. A binary operator at level
//! `p` takes its right operand at `p + 1` (left and non-associative) or `p`
//! (right). Prefix operators parse their operand at their own level, so
//! `-a * b` is `(-a) * b` when `-` binds tighter than `*`. Postfix operators
//! apply greedily to the operand they follow.
//!
//! An operator whose right operand fails to parse is given back: the
//! expression ends before it.

use sourcer_core::Value;
use sourcer_grammar::{Fixity, OperatorTable, Scope};

use super::error::RuntimeError;
use super::outcome::ParseResult::{Failure as Failed, Success as Matched};
use super::outcome::{ParseResult, Success};
use super::session::Session;
use super::trace::Tracer;

impl<T: Tracer> Session<'_, '_, '_, T> {
    pub(super) fn precedence(
        &mut self,
        table: &OperatorTable,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        self.climb(table, 0, pos, scope)
    }

    /// Parse an expression whose binary operators all bind at least `min`.
    fn climb(
        &mut self,
        table: &OperatorTable,
        min: u32,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mut lhs = match self.unary(table, min, pos, scope)? {
            Matched(s) => s,
            failure => return Ok(failure),
        };
        // A non-associative level folds at most once per chain.
        let mut closed: Option<u32> = None;

        'fold: loop {
            for level in table.binary() {
                if level.precedence < min || closed == Some(level.precedence) {
                    continue;
                }
                let Matched(operator) = self.eval(&level.operator, lhs.end, scope)? else {
                    continue;
                };
                let next_min = match level.fixity {
                    Fixity::Right => level.precedence,
                    _ => level.precedence + 1,
                };
                let Matched(rhs) = self.climb(table, next_min, operator.end, scope)? else {
                    continue;
                };
                if rhs.end == lhs.end {
                    continue;
                }
                if level.fixity == Fixity::NonAssoc {
                    closed = Some(level.precedence);
                }
                lhs = Success::new(
                    lhs.start,
                    rhs.end,
                    Value::infix(lhs.value, operator.value, rhs.value),
                );
                continue 'fold;
            }
            break;
        }
        Ok(Matched(lhs))
    }

    /// An operand, possibly behind prefix operators, then any postfix
    /// operators binding at least `min`.
    fn unary(
        &mut self,
        table: &OperatorTable,
        min: u32,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<ParseResult, RuntimeError> {
        let mut operand = match self.prefixed(table, pos, scope)? {
            Some(s) => s,
            None => match self.eval(&table.operand, pos, scope)? {
                Matched(s) => s,
                failure => return Ok(failure),
            },
        };

        'apply: loop {
            for level in table.postfixes() {
                if level.precedence < min {
                    continue;
                }
                if let Matched(operator) = self.eval(&level.operator, operand.end, scope)?
                    && operator.end > operand.end
                {
                    let value = Value::postfix(operand.value, operator.value);
                    operand = Success::new(operand.start, operator.end, value);
                    continue 'apply;
                }
            }
            break;
        }
        Ok(Matched(operand))
    }

    fn prefixed(
        &mut self,
        table: &OperatorTable,
        pos: usize,
        scope: &mut Scope,
    ) -> Result<Option<Success>, RuntimeError> {
        for level in table.prefixes() {
            let Matched(operator) = self.eval(&level.operator, pos, scope)? else {
                continue;
            };
            if operator.end == pos {
                continue;
            }
            if let Matched(operand) = self.climb(table, level.precedence, operator.end, scope)? {
                let value = Value::prefix(operator.value, operand.value);
                return Ok(Some(Success::new(pos, operand.end, value)));
            }
        }
        Ok(None)
    }
}
