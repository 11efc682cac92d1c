//! Concrete evaluation of constraint expressions.
//!
//! Binds `@ret` to the candidate's observed (or expected) output and
//! `@arg_i` to the example inputs, and folds the expression down to a
//! [`PropValue`]. Property access goes through the interpreter.
//!
//! Integer division and modulo use Euclidean semantics
//! (`i64::div_euclid` / `i64::rem_euclid`), matching the SMT-LIB integer
//! theory the symbolic encoder targets.

use weaver_spec::{BinaryOp, ConstValue, Expr, UnaryOp};

use crate::interpreter::{EvalResult, Interpreter, InterpreterError, PropValue};

/// Evaluates a constraint expression over one example binding.
///
/// `output` is what `@ret` denotes; `inputs` are the `@arg` slots.
pub fn eval_expr<I: Interpreter>(
    interp: &I,
    inputs: &[I::Value],
    output: &I::Value,
    expr: &Expr,
) -> EvalResult<PropValue, I::Value> {
    match expr {
        Expr::Const(ConstValue::Bool(b)) => Ok(PropValue::Bool(*b)),
        Expr::Const(ConstValue::Int(n)) => Ok(PropValue::Int(*n)),

        Expr::Param(_) => Err(InterpreterError::general(
            "bare parameter reference outside property access",
        )),

        Expr::Property {
            name,
            sort,
            operand,
        } => {
            let Expr::Param(slot) = operand.as_ref() else {
                return Err(InterpreterError::general(format!(
                    "property '{}' applied to a non-parameter",
                    name
                )));
            };
            let value = if *slot == 0 {
                output
            } else {
                inputs.get(slot - 1).ok_or_else(|| {
                    InterpreterError::general(format!(
                        "constraint references @arg{} but only {} inputs exist",
                        slot - 1,
                        inputs.len()
                    ))
                })?
            };
            let observed = interp.apply_property(name, value)?;
            if observed.sort() != *sort {
                return Err(InterpreterError::general(format!(
                    "property '{}' returned {} but is declared {}",
                    name,
                    observed.sort(),
                    sort
                )));
            }
            Ok(observed)
        }

        Expr::Unary { op, operand } => {
            let value = eval_expr(interp, inputs, output, operand)?;
            match op {
                UnaryOp::Neg => Ok(PropValue::Int(-expect_int(&value)?)),
                UnaryOp::Not => Ok(PropValue::Bool(!expect_bool(&value)?)),
            }
        }

        Expr::Binary { op, lhs, rhs } => {
            let l = eval_expr(interp, inputs, output, lhs)?;
            let r = eval_expr(interp, inputs, output, rhs)?;
            apply_binary(*op, &l, &r)
        }

        Expr::Cond {
            cond,
            then_val,
            else_val,
        } => {
            let c = eval_expr(interp, inputs, output, cond)?;
            if expect_bool(&c)? {
                eval_expr(interp, inputs, output, then_val)
            } else {
                eval_expr(interp, inputs, output, else_val)
            }
        }
    }
}

fn apply_binary<V>(
    op: BinaryOp,
    l: &PropValue,
    r: &PropValue,
) -> Result<PropValue, InterpreterError<V>> {
    use PropValue::{Bool, Int};
    let value = match op {
        BinaryOp::Add => Int(expect_int(l)?.wrapping_add(expect_int(r)?)),
        BinaryOp::Sub => Int(expect_int(l)?.wrapping_sub(expect_int(r)?)),
        BinaryOp::Mul => Int(expect_int(l)?.wrapping_mul(expect_int(r)?)),
        BinaryOp::Div => {
            let d = expect_int(r)?;
            if d == 0 {
                return Err(InterpreterError::general("division by zero in constraint"));
            }
            Int(expect_int(l)?.div_euclid(d))
        }
        BinaryOp::Mod => {
            let d = expect_int(r)?;
            if d == 0 {
                return Err(InterpreterError::general("modulo by zero in constraint"));
            }
            Int(expect_int(l)?.rem_euclid(d))
        }
        BinaryOp::Eq => Bool(l == r),
        BinaryOp::Ne => Bool(l != r),
        BinaryOp::Lt => Bool(expect_int(l)? < expect_int(r)?),
        BinaryOp::Le => Bool(expect_int(l)? <= expect_int(r)?),
        BinaryOp::Gt => Bool(expect_int(l)? > expect_int(r)?),
        BinaryOp::Ge => Bool(expect_int(l)? >= expect_int(r)?),
        BinaryOp::And => Bool(expect_bool(l)? && expect_bool(r)?),
        BinaryOp::Or => Bool(expect_bool(l)? || expect_bool(r)?),
        BinaryOp::Imply => Bool(!expect_bool(l)? || expect_bool(r)?),
    };
    Ok(value)
}

fn expect_int<V>(value: &PropValue) -> Result<i64, InterpreterError<V>> {
    value
        .as_int()
        .ok_or_else(|| InterpreterError::general("expected an integer constraint value"))
}

fn expect_bool<V>(value: &PropValue) -> Result<bool, InterpreterError<V>> {
    value
        .as_bool()
        .ok_or_else(|| InterpreterError::general("expected a boolean constraint value"))
}
