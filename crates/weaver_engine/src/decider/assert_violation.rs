//! Blame extraction from dynamic assertion violations.
//!
//! When the interpreter rejects an argument at run time, the violated
//! predicate is a reusable witness: re-checking it against every other
//! literal of the failing argument's enum type tells us exactly which
//! substitutions are equally doomed. Each doomed substitution becomes one
//! blame set, so the enumerator skips the whole family in one update.

use weaver_dsl::{bfs, Ast, NodeRef};
use weaver_spec::Spec;

use crate::interpreter::{AssertionViolation, Interpreter};

use super::blame::{Blame, BlameSet};

/// Computes blame sets for assertion violations on enum-typed arguments.
pub struct AssertionViolationHandler<'s> {
    spec: &'s Spec,
}

impl<'s> AssertionViolationHandler<'s> {
    pub fn new(spec: &'s Spec) -> Self {
        AssertionViolationHandler { spec }
    }

    /// The fixed part of every blame set: the applying node itself plus the
    /// full subtrees of the arguments the assertion captured. The failing
    /// argument is excluded; it is the part being substituted.
    fn blame_base<V>(&self, violation: &AssertionViolation<V>) -> BlameSet {
        let node = violation.node();
        let mut base = vec![Blame::new(node.clone(), node.production().clone())];
        for &capture in violation.captures() {
            if capture == violation.index() {
                continue;
            }
            let Some(capture_node) = node.children().get(capture) else {
                continue;
            };
            for sub in bfs(capture_node) {
                base.push(Blame::new(sub.clone(), sub.production().clone()));
            }
        }
        base
    }

    /// One blame set per alternative enum literal that would also violate
    /// the assertion, or `None` when the failing argument is not an atom.
    pub fn handle<I: Interpreter>(
        &self,
        interp: &I,
        violation: &AssertionViolation<I::Value>,
    ) -> Option<Vec<BlameSet>> {
        let arg_node = violation.arg();
        let prod = arg_node.production();
        if !prod.is_enum() {
            return None;
        }

        let base = self.blame_base(violation);
        let mut blames = Vec::new();
        for alt in self.spec.productions_with_lhs(prod.lhs().name()) {
            let Ok(alt_node) = Ast::atom(alt.clone()) else {
                continue;
            };
            // An isolated atom evaluates without inputs.
            let Ok(value) = interp.eval(&alt_node, &[]) else {
                continue;
            };
            if !violation.holds_for(&value) {
                let mut set = base.clone();
                set.push(Blame::new(arg_node.clone(), alt.clone()));
                blames.push(set);
            }
        }
        Some(blames)
    }
}
