//! Left-recursion detection.
//!
//! Builds the graph of rules reachable before any input is consumed, finds
//! its strongly connected components (Tarjan) and reports one cycle per
//! cyclic component.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::Nullability;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::{Expr, Fixity};
use crate::registry::Rule;

type Graph = IndexMap<Arc<str>, IndexSet<Arc<str>>>;

pub(super) fn check(
    rules: &IndexMap<Arc<str>, Rule>,
    nullability: &Nullability,
    diagnostics: &mut Diagnostics,
) {
    let graph: Graph = rules
        .values()
        .map(|rule| {
            let mut refs = IndexSet::new();
            leftmost_refs(rule.body(), nullability, &mut refs);
            refs.retain(|name| rules.contains_key(name));
            (rule.name().clone(), refs)
        })
        .collect();

    for scc in find_sccs(&graph) {
        let members: IndexSet<&Arc<str>> = scc.iter().collect();
        let Some(cycle) = find_cycle(&scc, &members, &graph) else {
            continue;
        };
        let mut path: Vec<&str> = cycle.iter().map(|name| &**name).collect();
        path.push(&cycle[0]);
        diagnostics.report(DiagnosticKind::LeftRecursion, &cycle[0], Some(&path.join(" -> ")));
    }
}

/// Rules that `expr` may invoke at its starting position.
///
/// Arguments of template calls are not followed.
fn leftmost_refs(expr: &Expr, nullability: &Nullability, out: &mut IndexSet<Arc<str>>) {
    match expr {
        Expr::Ref(r) => {
            out.insert(r.name.clone());
        }
        Expr::Sequence(items) => {
            for item in items {
                leftmost_refs(item, nullability, out);
                if !nullability.expr(item) {
                    break;
                }
            }
        }
        Expr::Separated { item, sep, .. } => {
            leftmost_refs(item, nullability, out);
            if nullability.expr(item) {
                leftmost_refs(sep, nullability, out);
            }
        }
        Expr::Precedence(table) => {
            leftmost_refs(&table.operand, nullability, out);
            for level in table.levels.iter().filter(|l| l.fixity == Fixity::Prefix) {
                leftmost_refs(&level.operator, nullability, out);
            }
        }
        Expr::Choice(_)
        | Expr::Repeat { .. }
        | Expr::Lookahead { .. }
        | Expr::Bind { .. }
        | Expr::Project { .. }
        | Expr::Apply { .. } => expr.for_each_child(|child| leftmost_refs(child, nullability, out)),
        Expr::Terminal(_)
        | Expr::Predicate(_)
        | Expr::Param(_)
        | Expr::Constant(_)
        | Expr::Fail(_) => {}
    }
}

/// Components that contain a cycle: more than one rule, or a rule calling itself.
fn find_sccs(graph: &Graph) -> Vec<Vec<Arc<str>>> {
    struct State<'a> {
        graph: &'a Graph,
        index: usize,
        stack: Vec<Arc<str>>,
        on_stack: IndexSet<Arc<str>>,
        indices: IndexMap<Arc<str>, usize>,
        lowlinks: IndexMap<Arc<str>, usize>,
        sccs: Vec<Vec<Arc<str>>>,
    }

    fn strongconnect(name: &Arc<str>, state: &mut State<'_>) {
        state.indices.insert(name.clone(), state.index);
        state.lowlinks.insert(name.clone(), state.index);
        state.index += 1;
        state.stack.push(name.clone());
        state.on_stack.insert(name.clone());

        let graph = state.graph;
        for next in graph.get(name).into_iter().flatten() {
            let lowlink = if !state.indices.contains_key(next) {
                strongconnect(next, state);
                state.lowlinks[next]
            } else if state.on_stack.contains(next) {
                state.indices[next]
            } else {
                continue;
            };
            let mine = &mut state.lowlinks[name];
            *mine = (*mine).min(lowlink);
        }

        if state.lowlinks[name] == state.indices[name] {
            let mut scc = Vec::new();
            while let Some(member) = state.stack.pop() {
                state.on_stack.swap_remove(&member);
                let done = member == *name;
                scc.push(member);
                if done {
                    break;
                }
            }
            state.sccs.push(scc);
        }
    }

    let mut state = State {
        graph,
        index: 0,
        stack: Vec::new(),
        on_stack: IndexSet::new(),
        indices: IndexMap::new(),
        lowlinks: IndexMap::new(),
        sccs: Vec::new(),
    };

    for name in graph.keys() {
        if !state.indices.contains_key(name) {
            strongconnect(name, &mut state);
        }
    }

    state
        .sccs
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph[&scc[0]].contains(&scc[0]))
        .map(|mut scc| {
            scc.reverse();
            scc
        })
        .collect()
}

/// A concrete cycle through the component, in call order.
fn find_cycle(
    scc: &[Arc<str>],
    members: &IndexSet<&Arc<str>>,
    graph: &Graph,
) -> Option<Vec<Arc<str>>> {
    fn walk(
        node: &Arc<str>,
        members: &IndexSet<&Arc<str>>,
        graph: &Graph,
        visited: &mut IndexSet<Arc<str>>,
        stack: &mut IndexSet<Arc<str>>,
    ) -> Option<Arc<str>> {
        if stack.contains(node) {
            return Some(node.clone());
        }
        if !visited.insert(node.clone()) {
            return None;
        }
        stack.insert(node.clone());

        for next in graph.get(node).into_iter().flatten() {
            if !members.contains(next) {
                continue;
            }
            if let Some(target) = walk(next, members, graph, visited, stack) {
                return Some(target);
            }
        }

        stack.pop();
        None
    }

    let mut visited = IndexSet::new();
    let mut stack = IndexSet::new();
    for start in scc {
        if let Some(target) = walk(start, members, graph, &mut visited, &mut stack) {
            let from = stack.get_index_of(&target)?;
            return Some(stack.iter().skip(from).cloned().collect());
        }
    }
    None
}
