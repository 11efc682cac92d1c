//! Shared toy-arithmetic interpreter for the integration scenarios.

use weaver_dsl::NodeRef;
use weaver_engine::interpreter::{
    assert_arg, EvalResult, Interpreter, InterpreterError, PropValue,
};
use weaver_spec::TypeRef;

/// Integer semantics for the toy grammars used across the test files.
pub struct ToyInterp;

impl Interpreter for ToyInterp {
    type Value = i64;

    fn eval_atom(&self, _ty: &TypeRef, literal: &str) -> EvalResult<i64, i64> {
        literal
            .parse()
            .map_err(|_| InterpreterError::general(format!("bad literal '{}'", literal)))
    }

    fn eval_apply(&self, node: &NodeRef, name: &str, args: &[i64]) -> EvalResult<i64, i64> {
        match name {
            "const" | "id" => Ok(args[0]),
            "plus" => Ok(args[0] + args[1]),
            "minus" => Ok(args[0] - args[1]),
            "mult" => Ok(args[0] * args[1]),
            "div" => {
                assert_arg(node, args, 1, |x: &i64| *x != 0, &[])?;
                Ok(args[0] / args[1])
            }
            "sqrt" => {
                assert_arg(node, args, 0, |x: &i64| *x >= 0, &[])?;
                Ok((args[0] as f64).sqrt() as i64)
            }
            other => Err(InterpreterError::general(format!(
                "no eval for '{}'",
                other
            ))),
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
