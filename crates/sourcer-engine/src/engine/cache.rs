//! Packrat memo table and rule instantiation.

use std::collections::HashMap;
use std::sync::Arc;

use sourcer_grammar::{Expr, Grammar, GrammarError, Rule};

use super::outcome::{Failure, ParseResult};

/// Dense id of a rule specialized with concrete arguments.
pub(crate) type InstanceId = u32;

pub(crate) struct Instance<'g> {
    pub rule: &'g Rule,
    pub body: Arc<Expr>,
}

/// Rule instances seen during one parse.
///
/// Parameterless rules share the grammar's body; templates are specialized
/// once per distinct argument list.
#[derive(Default)]
pub(crate) struct Instances<'g> {
    ids: HashMap<(usize, String), InstanceId>,
    instances: Vec<Instance<'g>>,
}

impl<'g> Instances<'g> {
    pub fn intern(
        &mut self,
        grammar: &'g Grammar,
        rule_id: usize,
        args: &[Expr],
    ) -> Result<InstanceId, GrammarError> {
        let key = (rule_id, fingerprint(args));
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }

        let rule = grammar
            .rule_by_id(rule_id)
            .ok_or_else(|| GrammarError::UnknownRule {
                name: format!("#{rule_id}"),
                referenced_from: None,
            })?;
        let body = rule.instantiate(args)?;
        let id = self.instances.len() as InstanceId;
        self.instances.push(Instance { rule, body });
        self.ids.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: InstanceId) -> &Instance<'g> {
        &self.instances[id as usize]
    }
}

fn fingerprint(args: &[Expr]) -> String {
    args.iter()
        .map(Expr::fingerprint)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) enum Entry {
    /// Evaluation started and has not returned yet.
    InFlight,
    Done {
        result: ParseResult,
        /// Deepest failure seen while evaluating, replayed on every hit.
        deepest: Option<Failure>,
    },
}

/// Results keyed by `(instance, offset)`. Lives for one parse.
pub(crate) struct PackratCache {
    entries: HashMap<(InstanceId, usize), Entry>,
    memoize: bool,
}

impl PackratCache {
    /// With `memoize` off only in-flight markers are kept, so left recursion
    /// is still detected.
    pub fn new(memoize: bool) -> Self {
        Self {
            entries: HashMap::new(),
            memoize,
        }
    }

    pub fn lookup(&self, key: (InstanceId, usize)) -> Option<&Entry> {
        self.entries.get(&key)
    }

    pub fn begin(&mut self, key: (InstanceId, usize)) {
        self.entries.insert(key, Entry::InFlight);
    }

    pub fn finish(
        &mut self,
        key: (InstanceId, usize),
        result: &ParseResult,
        deepest: &Option<Failure>,
    ) {
        if self.memoize {
            let entry = Entry::Done {
                result: result.clone(),
                deepest: deepest.clone(),
            };
            self.entries.insert(key, entry);
        } else {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
