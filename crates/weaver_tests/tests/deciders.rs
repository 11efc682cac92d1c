//! Decider behavior over the toy arithmetic DSL, end to end from spec text.

mod common;

use std::rc::Rc;

use common::ToyInterp;
use weaver_dsl::{Builder, NodeRef};
use weaver_engine::decider::Decider;
use weaver_engine::interpreter::{Interpreter, InterpreterError};
use weaver_engine::{BlameSet, Example, ExampleConstraintDecider, ExampleDecider};
use weaver_spec::{parse, Spec};

fn signed_spec() -> Spec {
    parse(
        r#"
        value Int {
            pos: bool;
            neg: bool;
        }

        program Toy(Int, Int) -> Int;
        func plus: Int -> Int, Int;
        func mult: Int r -> Int a, Int b {
            pos(a) && neg(b) ==> neg(r);
        }
        func div: Int r -> Int a, Int b {
            pos(a) && neg(b) ==> neg(r);
        }
        "#,
    )
    .unwrap()
}

fn contains_singleton(blames: &[BlameSet], node: &NodeRef, prod_id: usize) -> bool {
    blames.iter().any(|set| {
        set.len() == 1 && Rc::ptr_eq(&set[0].node, node) && set[0].production.id() == prod_id
    })
}

#[test]
fn concrete_pass_is_accepted() {
    let spec = signed_spec();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();

    let decider =
        ExampleConstraintDecider::new(&spec, ToyInterp, vec![Example::new(vec![2, 3], 5)])
            .unwrap();
    assert!(decider.analyze(&prog).unwrap().is_ok());
}

#[test]
fn concrete_fail_without_abstract_reason_has_empty_blame() {
    let spec = signed_spec();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();

    // 1 * -1 is -1, not -2, but a negative output is abstractly consistent.
    let decider =
        ExampleConstraintDecider::new(&spec, ToyInterp, vec![Example::new(vec![1, -1], -2)])
            .unwrap();
    let outcome = decider.analyze(&prog).unwrap();
    assert!(!outcome.is_ok());
    assert!(outcome.blames().is_empty());
}

#[test]
fn abstract_fail_yields_blame_with_implied_productions() {
    let spec = signed_spec();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();

    // A positive expected output contradicts the constraint outright.
    let decider =
        ExampleConstraintDecider::new(&spec, ToyInterp, vec![Example::new(vec![1, -1], 2)])
            .unwrap();
    let outcome = decider.analyze(&prog).unwrap();
    assert!(!outcome.is_ok());
    let blames = outcome.blames();

    let mult_id = spec.function_production_or_raise("mult").unwrap().id();
    let div_id = spec.function_production_or_raise("div").unwrap().id();
    assert!(contains_singleton(blames, &prog, mult_id));
    // div shares the constraint, so it is ruled out without being tried.
    assert!(contains_singleton(blames, &prog, div_id));
    // plus is unconstrained and must not be blamed.
    let plus_id = spec.function_production_or_raise("plus").unwrap().id();
    assert!(!contains_singleton(blames, &prog, plus_id));
}

#[test]
fn custom_output_equality_tolerates_near_misses() {
    let spec = signed_spec();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(mult (@param 0) (@param 1))").unwrap();

    // 2 * 3 is 6; with |actual - expected| <= 1 the example passes.
    let decider = ExampleDecider::with_equality(
        ToyInterp,
        vec![Example::new(vec![2, 3], 5)],
        Rc::new(|a: &i64, b: &i64| (a - b).abs() <= 1),
    )
    .unwrap();
    assert!(decider.analyze(&prog).unwrap().is_ok());
}

#[test]
fn empty_example_list_is_refused() {
    assert!(ExampleDecider::<ToyInterp>::new(ToyInterp, Vec::new()).is_err());
}

#[test]
fn assertion_violation_blames_the_guard_not_the_wrapper() {
    let spec = parse(
        r#"
        enum SmallInt { "-3", "-2", "2", "3" }
        value Int {
            pos: bool;
            neg: bool;
        }

        program Toy() -> Int;
        func const: Int -> SmallInt;
        func sqrt: Int -> SmallInt;
        func id: Int -> Int;
        "#,
    )
    .unwrap();
    let b = Builder::new(&spec);
    let bad_atom = b.make_enum("SmallInt", "-3").unwrap();
    let sqrt_node = b.make_apply("sqrt", vec![bad_atom.clone()]).unwrap();
    let prog = b.make_apply("id", vec![sqrt_node.clone()]).unwrap();

    let decider = ExampleConstraintDecider::new(
        &spec,
        ToyInterp,
        vec![Example::new(Vec::new(), 2)],
    )
    .unwrap();

    let error = decider.analyze(&prog).unwrap_err();
    assert!(matches!(error, InterpreterError::Assertion(_)));

    let blames = decider.explain_error(&error).unwrap();
    // The two negative literals are doomed; the two positive ones are not.
    assert_eq!(blames.len(), 2);
    let sqrt_id = spec.function_production_or_raise("sqrt").unwrap().id();
    let id_id = spec.function_production_or_raise("id").unwrap().id();
    for set in &blames {
        assert!(set
            .iter()
            .any(|bl| Rc::ptr_eq(&bl.node, &sqrt_node) && bl.production.id() == sqrt_id));
        assert!(!set
            .iter()
            .any(|bl| Rc::ptr_eq(&bl.node, &prog) && bl.production.id() == id_id));
        assert!(set.iter().any(|bl| Rc::ptr_eq(&bl.node, &bad_atom)));
    }
}

#[test]
fn general_interpreter_errors_propagate() {
    let spec = parse(
        r#"
        value Int { pos: bool; neg: bool; }
        program Toy(Int) -> Int;
        func cube: Int -> Int;
        "#,
    )
    .unwrap();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(cube (@param 0))").unwrap();

    let decider =
        ExampleConstraintDecider::new(&spec, ToyInterp, vec![Example::new(vec![2], 8)]).unwrap();
    let error = decider.analyze(&prog).unwrap_err();
    assert!(matches!(error, InterpreterError::General(_)));
    // General errors have no blame explanation.
    assert!(decider.explain_error(&error).is_none());
}

#[test]
fn decider_soundness_holds_on_acceptance() {
    let spec = signed_spec();
    let b = Builder::new(&spec);
    let prog = b.from_sexp("(plus (plus (@param 0) (@param 1)) (@param 0))").unwrap();

    let examples = vec![
        Example::new(vec![1, 2], 4),
        Example::new(vec![-1, 5], 3),
        Example::new(vec![0, 0], 0),
    ];
    let decider =
        ExampleConstraintDecider::new(&spec, ToyInterp, examples.clone()).unwrap();
    assert!(decider.analyze(&prog).unwrap().is_ok());
    for example in &examples {
        assert_eq!(
            ToyInterp.eval(&prog, &example.inputs).unwrap(),
            example.output
        );
    }
}
