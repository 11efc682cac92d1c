//! The pruning decider: lock-step concrete and symbolic evaluation.
//!
//! Like [`ExampleConstraintDecider`](super::constraint::ExampleConstraintDecider),
//! every apply constraint is asserted up front. But instead of only judging
//! the finished candidate, this decider re-checks satisfiability *while*
//! interpreting: after each apply node evaluates, the properties its
//! constraints mention are pinned to their freshly observed values. The
//! moment the symbolic context goes unsatisfiable, the remaining tree
//! cannot matter: evaluation stops and the offending subtree (plus every
//! constrained non-leaf ancestor) is returned as a single blame set.

use weaver_dsl::{bfs, NodeIndexer, NodeRef, ParentFinder};
use weaver_spec::{Expr, Sort, Spec};

use crate::error::EngineResult;
use crate::interpreter::{Interpreter, InterpreterError};

use super::assert_violation::AssertionViolationHandler;
use super::blame::{Blame, BlameSet};
use super::constraint::AlignmentEncoder;
use super::example::{Example, ExampleDecider, OutputEq};
use super::{Decider, Outcome};

/// Example checking that aborts mid-evaluation on abstract contradiction.
pub struct ExampleConstraintPruningDecider<'s, I: Interpreter> {
    spec: &'s Spec,
    base: ExampleDecider<I>,
}

enum Interrupt<V> {
    /// The symbolic context became unsat at this node.
    Pruned(NodeRef),
    /// The interpreter failed; propagates out of `analyze`.
    Error(InterpreterError<V>),
}

impl<V> From<InterpreterError<V>> for Interrupt<V> {
    fn from(err: InterpreterError<V>) -> Self {
        Interrupt::Error(err)
    }
}

/// Property references `(name, sort, slot)` occurring in a constraint.
fn collect_properties(expr: &Expr, out: &mut Vec<(String, Sort, usize)>) {
    match expr {
        Expr::Const(_) | Expr::Param(_) => {}
        Expr::Property {
            name,
            sort,
            operand,
        } => {
            if let Expr::Param(slot) = operand.as_ref() {
                out.push((name.clone(), *sort, *slot));
            }
        }
        Expr::Unary { operand, .. } => collect_properties(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_properties(lhs, out);
            collect_properties(rhs, out);
        }
        Expr::Cond {
            cond,
            then_val,
            else_val,
        } => {
            collect_properties(cond, out);
            collect_properties(then_val, out);
            collect_properties(else_val, out);
        }
    }
}

impl<'s, I: Interpreter> ExampleConstraintPruningDecider<'s, I>
where
    I::Value: PartialEq,
{
    /// Builds the decider with `==` output comparison.
    pub fn new(
        spec: &'s Spec,
        interp: I,
        examples: Vec<Example<I::Value>>,
    ) -> EngineResult<Self> {
        let base = ExampleDecider::new(interp, examples)?;
        Ok(ExampleConstraintPruningDecider { spec, base })
    }
}

impl<'s, I: Interpreter> ExampleConstraintPruningDecider<'s, I> {
    /// Builds the decider with a custom output equality.
    pub fn with_equality(
        spec: &'s Spec,
        interp: I,
        examples: Vec<Example<I::Value>>,
        equal: OutputEq<I::Value>,
    ) -> EngineResult<Self> {
        let base = ExampleDecider::with_equality(interp, examples, equal)?;
        Ok(ExampleConstraintPruningDecider { spec, base })
    }

    /// Evaluates `node` while installing observed property values into the
    /// symbolic context, failing fast when the context goes unsat.
    fn eval_checked(
        &self,
        encoder: &mut AlignmentEncoder<'_>,
        indexer: &NodeIndexer,
        node: &NodeRef,
        inputs: &[I::Value],
    ) -> Result<I::Value, Interrupt<I::Value>> {
        let interp = self.base.interpreter();
        if !node.is_apply() {
            return Ok(interp.eval(node, inputs)?);
        }

        let mut args = Vec::with_capacity(node.children().len());
        for child in node.children() {
            args.push(self.eval_checked(encoder, indexer, child, inputs)?);
        }
        let name = node
            .name()
            .ok_or_else(|| InterpreterError::general("apply node without a name"))?;
        let result = interp.eval_apply(node, name, &args)?;

        let constraints = node.production().constraints();
        if constraints.is_empty() {
            return Ok(result);
        }

        let mut references = Vec::new();
        for constraint in constraints {
            collect_properties(constraint, &mut references);
        }
        for (pname, sort, slot) in references {
            let (target, value) = if slot == 0 {
                (node, &result)
            } else {
                (&node.children()[slot - 1], &args[slot - 1])
            };
            let observed = interp.apply_property(&pname, value)?;
            let var = encoder.node_property_var(indexer, target, &pname, sort);
            encoder
                .assert_observed(&var, observed)
                .map_err(|e| InterpreterError::general(e.to_string()))?;
        }

        if encoder.is_unsat() {
            return Err(Interrupt::Pruned(node.clone()));
        }
        Ok(result)
    }

    /// The blame set for a pruned node: its whole subtree plus every
    /// constrained non-leaf ancestor.
    fn pruned_blame(&self, prog: &NodeRef, node: &NodeRef) -> BlameSet {
        let mut set: BlameSet = bfs(node)
            .map(|n| Blame::new(n.clone(), n.production().clone()))
            .collect();
        let parents = ParentFinder::new(prog);
        let mut cursor = node.clone();
        while let Some(parent) = parents.get_parent(&cursor) {
            if parent.is_apply() && !parent.production().constraints().is_empty() {
                set.push(Blame::new(parent.clone(), parent.production().clone()));
            }
            cursor = parent.clone();
        }
        set
    }
}

impl<'s, I: Interpreter> Decider for ExampleConstraintPruningDecider<'s, I> {
    type Value = I::Value;

    fn analyze(&self, prog: &NodeRef) -> Result<Outcome, InterpreterError<I::Value>> {
        let interp = self.base.interpreter();
        let indexer = NodeIndexer::new(prog);
        let mut blames: Vec<BlameSet> = Vec::new();
        let mut all_ok = true;

        for example in self.base.examples() {
            let ctx = super::constraint::fresh_context();
            let mut encoder = AlignmentEncoder::new(&ctx);
            encoder.encode_candidate(interp, &indexer, prog, example)?;

            if encoder.is_unsat() {
                all_ok = false;
                let blamed = encoder.blame_nodes(&indexer);
                if !blamed.is_empty() {
                    blames.push(
                        blamed
                            .iter()
                            .map(|(n, _)| Blame::new(n.clone(), n.production().clone()))
                            .collect(),
                    );
                }
                continue;
            }

            match self.eval_checked(&mut encoder, &indexer, prog, &example.inputs) {
                Ok(actual) => {
                    if !(self.base.equal())(&actual, &example.output) {
                        all_ok = false;
                    }
                }
                Err(Interrupt::Pruned(node)) => {
                    return Ok(Outcome::Rejected(vec![self.pruned_blame(prog, &node)]));
                }
                Err(Interrupt::Error(err)) => return Err(err),
            }
        }

        if all_ok {
            Ok(Outcome::Accepted)
        } else {
            Ok(Outcome::Rejected(blames))
        }
    }

    fn explain_error(&self, error: &InterpreterError<I::Value>) -> Option<Vec<BlameSet>> {
        let InterpreterError::Assertion(violation) = error else {
            return None;
        };
        AssertionViolationHandler::new(self.spec).handle(self.base.interpreter(), violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{EvalResult, PropValue};
    use std::rc::Rc;
    use weaver_dsl::Builder;
    use weaver_spec::{parse, TypeRef};

    fn sign_spec() -> Spec {
        parse(
            r#"
            value IntExpr {
                pos: bool;
                neg: bool;
            }

            program Foo(IntExpr, IntExpr) -> IntExpr;
            func plus: IntExpr -> IntExpr, IntExpr;
            func mult: IntExpr r -> IntExpr a, IntExpr b {
                pos(a) && neg(b) ==> neg(r);
            }
            "#,
        )
        .unwrap()
    }

    struct SignInterp;

    impl Interpreter for SignInterp {
        type Value = i64;

        fn eval_atom(&self, _ty: &TypeRef, literal: &str) -> EvalResult<i64, i64> {
            literal
                .parse()
                .map_err(|_| InterpreterError::general("bad literal"))
        }

        fn eval_apply(&self, _node: &NodeRef, name: &str, args: &[i64]) -> EvalResult<i64, i64> {
            match name {
                "plus" => Ok(args[0] + args[1]),
                "mult" => Ok(args[0] * args[1]),
                other => Err(InterpreterError::general(format!("no eval for '{}'", other))),
            }
        }

        fn apply_property(&self, property: &str, value: &i64) -> EvalResult<PropValue, i64> {
            match property {
                "pos" => Ok(PropValue::Bool(*value > 0)),
                "neg" => Ok(PropValue::Bool(*value < 0)),
                other => Err(InterpreterError::general(format!(
                    "no property '{}'",
                    other
                ))),
            }
        }
    }

    #[test]
    fn accepts_a_correct_candidate() {
        let spec = sign_spec();
        let b = Builder::new(&spec);
        let prog = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();
        let decider = ExampleConstraintPruningDecider::new(
            &spec,
            SignInterp,
            vec![Example::new(vec![2, 3], 5)],
        )
        .unwrap();
        assert!(decider.analyze(&prog).unwrap().is_ok());
    }

    #[test]
    fn upfront_contradiction_yields_base_blame() {
        let spec = sign_spec();
        let b = Builder::new(&spec);
        let prog = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();
        // Expected +2 while pos(a) && neg(b) forces a negative result.
        let decider = ExampleConstraintPruningDecider::new(
            &spec,
            SignInterp,
            vec![Example::new(vec![1, -1], 2)],
        )
        .unwrap();
        let outcome = decider.analyze(&prog).unwrap();
        assert!(!outcome.is_ok());
        let blames = outcome.blames();
        assert_eq!(blames.len(), 1);
        let mult_id = spec.function_production_or_raise("mult").unwrap().id();
        assert!(blames[0]
            .iter()
            .any(|bl| Rc::ptr_eq(&bl.node, &prog) && bl.production.id() == mult_id));
    }

    #[test]
    fn satisfiable_context_falls_back_to_concrete_mismatch() {
        let spec = sign_spec();
        let b = Builder::new(&spec);
        let inner = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();
        let prog = b
            .make_apply("plus", vec![inner.clone(), b.make_param(0).unwrap()])
            .unwrap();

        // inputs 1, -1: mult evaluates to -1, which satisfies its own
        // constraint, and plus is unconstrained; only the final value is off.
        let decider = ExampleConstraintPruningDecider::new(
            &spec,
            SignInterp,
            vec![Example::new(vec![1, -1], 100)],
        )
        .unwrap();
        let outcome = decider.analyze(&prog).unwrap();
        assert!(!outcome.is_ok());
        assert!(outcome.blames().is_empty());
    }

    #[test]
    fn observed_values_can_contradict_mid_evaluation() {
        let spec = sign_spec();
        let b = Builder::new(&spec);
        // mult(mult(@param0, @param0), @param1) on [1, -1] expecting +5:
        // the outer constraint with neg(b) and a positive expected output
        // forces pos(a) to be false symbolically, but the inner square
        // evaluates to +1. The contradiction appears only once the observed
        // value is installed.
        let inner = b.from_sexp("(mult (@param 0) (@param 0))").unwrap();
        let prog = b
            .make_apply("mult", vec![inner.clone(), b.make_param(1).unwrap()])
            .unwrap();

        let decider = ExampleConstraintPruningDecider::new(
            &spec,
            SignInterp,
            vec![Example::new(vec![1, -1], 5)],
        )
        .unwrap();
        let outcome = decider.analyze(&prog).unwrap();
        assert!(!outcome.is_ok());
        let blames = outcome.blames();
        assert_eq!(blames.len(), 1);
        // The pruned node is the outer apply, so its whole subtree is blamed.
        assert!(blames[0].iter().any(|bl| Rc::ptr_eq(&bl.node, &prog)));
        assert!(blames[0].iter().any(|bl| Rc::ptr_eq(&bl.node, &inner)));
        assert_eq!(blames[0].len(), 5);
    }
}
