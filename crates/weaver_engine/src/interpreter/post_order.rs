//! Post-order program evaluation.

use weaver_dsl::{Ast, NodeRef};

use super::{EvalResult, Interpreter, InterpreterError};

/// Evaluates `prog` bottom-up against `inputs`.
///
/// Children are evaluated left to right before their parent; any error
/// aborts the walk and propagates unchanged, so an assertion violation
/// arrives at the caller still carrying the node it blames.
pub fn eval<I>(interp: &I, prog: &NodeRef, inputs: &[I::Value]) -> EvalResult<I::Value, I::Value>
where
    I: Interpreter + ?Sized,
{
    match prog.as_ref() {
        Ast::Atom { .. } => {
            let literal = prog
                .data()
                .ok_or_else(|| InterpreterError::general("enum atom without a literal"))?;
            interp.eval_atom(prog.ty(), literal)
        }
        Ast::Param { .. } => {
            let index = prog
                .index()
                .ok_or_else(|| InterpreterError::general("param node without an index"))?;
            inputs.get(index).cloned().ok_or_else(|| {
                InterpreterError::general(format!(
                    "input parameter access ({}) out of bound ({})",
                    index,
                    inputs.len()
                ))
            })
        }
        Ast::Apply { args, .. } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(interp, arg, inputs)?);
            }
            let name = prog
                .name()
                .ok_or_else(|| InterpreterError::general("apply node without a name"))?;
            interp.eval_apply(prog, name, &values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{assert_arg, PropValue};
    use weaver_dsl::Builder;
    use weaver_spec::{parse, Spec, TypeRef};

    fn toy() -> Spec {
        parse(
            r#"
            enum SmallInt { "0", "1", "2", "3" }
            value Int;
            program Toy(Int, Int) -> Int;
            func const: Int -> SmallInt;
            func plus: Int -> Int, Int;
            func sqrt: Int -> SmallInt;
            "#,
        )
        .unwrap()
    }

    struct Arith;

    impl Interpreter for Arith {
        type Value = i64;

        fn eval_atom(&self, _ty: &TypeRef, literal: &str) -> EvalResult<i64, i64> {
            literal
                .parse()
                .map_err(|_| InterpreterError::general(format!("bad literal '{}'", literal)))
        }

        fn eval_apply(&self, node: &NodeRef, name: &str, args: &[i64]) -> EvalResult<i64, i64> {
            match name {
                "const" => Ok(args[0]),
                "plus" => Ok(args[0] + args[1]),
                "sqrt" => {
                    assert_arg(node, args, 0, |x: &i64| *x >= 0, &[])?;
                    Ok((args[0] as f64).sqrt() as i64)
                }
                other => Err(InterpreterError::general(format!("no eval for '{}'", other))),
            }
        }

        fn apply_property(&self, property: &str, value: &i64) -> EvalResult<PropValue, i64> {
            match property {
                "pos" => Ok(PropValue::Bool(*value > 0)),
                other => Err(InterpreterError::general(format!(
                    "no property '{}'",
                    other
                ))),
            }
        }
    }

    #[test]
    fn evaluates_nested_applications() {
        let spec = toy();
        let b = Builder::new(&spec);
        let prog = b
            .from_sexp("(plus (const (SmallInt \"2\")) (plus (@param 0) (@param 1)))")
            .unwrap();
        assert_eq!(Arith.eval(&prog, &[10, 30]).unwrap(), 42);
    }

    #[test]
    fn param_out_of_bounds_is_a_general_error() {
        let spec = toy();
        let b = Builder::new(&spec);
        let prog = b.from_sexp("(plus (@param 0) (@param 1))").unwrap();
        let err = Arith.eval(&prog, &[1]).unwrap_err();
        assert!(matches!(err, InterpreterError::General(_)));
        assert!(err.to_string().contains("out of bound"));
    }

    #[test]
    fn assertion_violation_carries_the_failing_node() {
        let spec = toy();
        let b = Builder::new(&spec);
        let prog = b.from_sexp("(sqrt (SmallInt \"0\"))").unwrap();
        // "0" passes the guard
        assert_eq!(Arith.eval(&prog, &[0, 0]).unwrap(), 0);

        // A negative argument must trip the guard: extend the toy domain
        let spec = parse(
            r#"
            enum SmallInt { "-1", "4" }
            value Int;
            program Toy() -> Int;
            func sqrt: Int -> SmallInt;
            "#,
        )
        .unwrap();
        let b = Builder::new(&spec);
        let prog = b.from_sexp("(sqrt (SmallInt \"-1\"))").unwrap();
        let err = Arith.eval(&prog, &[]).unwrap_err();
        let InterpreterError::Assertion(violation) = err else {
            panic!("expected an assertion violation");
        };
        assert_eq!(violation.index(), 0);
        assert!(violation.node().deep_eq(&prog));
        assert_eq!(violation.arg().data(), Some("-1"));
        assert!(violation.holds_for(&9));
        assert!(!violation.holds_for(&-9));
    }
}
